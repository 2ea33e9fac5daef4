//! SMTP extension keywords advertised in the EHLO reply.
//!
//! These are recorded for the caller; the session only consults them when
//! [`Config::require_advertised`](crate::Config) is enabled.

/// SMTP extension discovered from an EHLO response line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Extension {
    /// STARTTLS - TLS upgrade
    StartTls,
    /// AUTH - Authentication, with the advertised mechanism names (uppercase)
    Auth(Vec<String>),
    /// SIZE - Maximum message size
    Size(Option<usize>),
    /// 8BITMIME - 8-bit MIME transport
    EightBitMime,
    /// PIPELINING - Command pipelining
    Pipelining,
    /// SMTPUTF8 - UTF-8 email addresses
    SmtpUtf8,
    /// Anything else, kept verbatim
    Unknown(String),
}

impl Extension {
    /// Parses one EHLO capability line (status text without the separator).
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let mut parts = line.split_whitespace();
        let Some(keyword) = parts.next() else {
            return Self::Unknown(line.to_string());
        };

        match keyword.to_ascii_uppercase().as_str() {
            "STARTTLS" => Self::StartTls,
            // Some older servers advertise "AUTH=LOGIN"
            "AUTH" => Self::Auth(parts.map(str::to_ascii_uppercase).collect()),
            kw if kw.starts_with("AUTH=") => Self::Auth(
                std::iter::once(&kw[5..])
                    .chain(parts)
                    .map(str::to_ascii_uppercase)
                    .collect(),
            ),
            "SIZE" => Self::Size(parts.next().and_then(|s| s.parse().ok())),
            "8BITMIME" => Self::EightBitMime,
            "PIPELINING" => Self::Pipelining,
            "SMTPUTF8" => Self::SmtpUtf8,
            _ => Self::Unknown(line.to_string()),
        }
    }

    /// Returns true if this is an AUTH line listing the given mechanism.
    #[must_use]
    pub fn offers_auth(&self, mechanism: &str) -> bool {
        match self {
            Self::Auth(mechanisms) => mechanisms
                .iter()
                .any(|m| m.eq_ignore_ascii_case(mechanism)),
            _ => false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn parse_starttls() {
        assert_eq!(Extension::parse("STARTTLS"), Extension::StartTls);
        assert_eq!(Extension::parse("starttls"), Extension::StartTls);
    }

    #[test]
    fn parse_auth_mechanisms() {
        let ext = Extension::parse("AUTH LOGIN xoauth2");
        assert_eq!(
            ext,
            Extension::Auth(vec!["LOGIN".to_string(), "XOAUTH2".to_string()])
        );
        assert!(ext.offers_auth("login"));
        assert!(!ext.offers_auth("PLAIN"));
    }

    #[test]
    fn parse_legacy_auth_equals() {
        let ext = Extension::parse("AUTH=LOGIN PLAIN");
        assert!(ext.offers_auth("LOGIN"));
        assert!(ext.offers_auth("PLAIN"));
    }

    #[test]
    fn parse_size() {
        assert_eq!(
            Extension::parse("SIZE 157286400"),
            Extension::Size(Some(157_286_400))
        );
        assert_eq!(Extension::parse("SIZE"), Extension::Size(None));
    }

    #[test]
    fn parse_flags() {
        assert_eq!(Extension::parse("8BITMIME"), Extension::EightBitMime);
        assert_eq!(Extension::parse("PIPELINING"), Extension::Pipelining);
        assert_eq!(Extension::parse("SMTPUTF8"), Extension::SmtpUtf8);
    }

    #[test]
    fn parse_unknown_and_empty() {
        assert_eq!(
            Extension::parse("CHUNKING"),
            Extension::Unknown("CHUNKING".to_string())
        );
        assert!(matches!(Extension::parse(""), Extension::Unknown(_)));
        assert!(!Extension::parse("CHUNKING").offers_auth("LOGIN"));
    }
}
