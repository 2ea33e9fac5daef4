//! SMTP command builder.

use std::fmt;

use crate::types::Address;

/// SMTP command issued by the session.
///
/// AUTH LOGIN answers are not commands: they go out as raw base64 lines
/// through [`LineChannel::write_secret_line`](crate::connection::LineChannel::write_secret_line).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// EHLO - Extended greeting
    Ehlo {
        /// Client hostname
        hostname: String,
    },
    /// STARTTLS - Upgrade to TLS
    StartTls,
    /// AUTH LOGIN - Begin the LOGIN exchange
    AuthLogin,
    /// MAIL FROM - Start mail transaction
    ///
    /// Sent as `MAIL FROM:<addr>` with no space after the colon, the RFC 5321
    /// form. `RCPT TO:<addr>` follows the same rule.
    MailFrom {
        /// Sender address
        from: Address,
    },
    /// RCPT TO - Add recipient
    RcptTo {
        /// Recipient address
        to: Address,
    },
    /// DATA - Begin message data
    Data,
    /// RSET - Reset transaction
    Rset,
    /// QUIT - Close connection
    Quit,
}

impl Command {
    /// Serializes the command to bytes, CRLF included.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        format!("{self}\r\n").into_bytes()
    }

    /// Returns the command verb; recorded on the transcript log events.
    #[must_use]
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Ehlo { .. } => "EHLO",
            Self::StartTls => "STARTTLS",
            Self::AuthLogin => "AUTH",
            Self::MailFrom { .. } => "MAIL",
            Self::RcptTo { .. } => "RCPT",
            Self::Data => "DATA",
            Self::Rset => "RSET",
            Self::Quit => "QUIT",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ehlo { hostname } => write!(f, "EHLO {hostname}"),
            Self::StartTls => f.write_str("STARTTLS"),
            Self::AuthLogin => f.write_str("AUTH LOGIN"),
            Self::MailFrom { from } => write!(f, "MAIL FROM:<{from}>"),
            Self::RcptTo { to } => write!(f, "RCPT TO:<{to}>"),
            Self::Data => f.write_str("DATA"),
            Self::Rset => f.write_str("RSET"),
            Self::Quit => f.write_str("QUIT"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ehlo_command() {
        let cmd = Command::Ehlo {
            hostname: "client.example.com".to_string(),
        };
        assert_eq!(cmd.serialize(), b"EHLO client.example.com\r\n");
    }

    #[test]
    fn test_starttls_command() {
        assert_eq!(Command::StartTls.serialize(), b"STARTTLS\r\n");
    }

    #[test]
    fn test_auth_login_command() {
        assert_eq!(Command::AuthLogin.serialize(), b"AUTH LOGIN\r\n");
        assert_eq!(Command::AuthLogin.verb(), "AUTH");
    }

    #[test]
    fn test_mail_from_command() {
        let cmd = Command::MailFrom {
            from: Address::new("sender@example.com").unwrap(),
        };
        assert_eq!(cmd.serialize(), b"MAIL FROM:<sender@example.com>\r\n");
    }

    #[test]
    fn test_rcpt_to_command() {
        let cmd = Command::RcptTo {
            to: Address::new("recipient@example.com").unwrap(),
        };
        assert_eq!(cmd.serialize(), b"RCPT TO:<recipient@example.com>\r\n");
    }

    #[test]
    fn test_transaction_verbs() {
        assert_eq!(Command::Data.serialize(), b"DATA\r\n");
        assert_eq!(Command::Rset.serialize(), b"RSET\r\n");
        assert_eq!(Command::Quit.serialize(), b"QUIT\r\n");
    }
}
