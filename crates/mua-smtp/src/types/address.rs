//! Email address types.

use crate::error::{Error, Result};

/// Email address for the SMTP envelope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Validates and wraps an address such as `bob@bob.com`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if it is empty, has other than one
    /// `@`, or contains whitespace, control characters or angle brackets.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        Self::validate(&addr)?;
        Ok(Self(addr))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the domain part (after the `@`).
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0.rsplit_once('@').map_or("", |(_, domain)| domain)
    }

    /// Basic syntax check; the server has the final word on deliverability.
    fn validate(addr: &str) -> Result<()> {
        if addr.is_empty() {
            return Err(Error::InvalidAddress("Address cannot be empty".into()));
        }

        // Characters that would let an address smuggle extra commands or
        // break the <...> framing of MAIL FROM / RCPT TO
        if addr
            .chars()
            .any(|c| c.is_control() || c.is_whitespace() || c == '<' || c == '>')
        {
            return Err(Error::InvalidAddress(format!(
                "Address contains forbidden characters: {addr:?}"
            )));
        }

        let Some((local, domain)) = addr.split_once('@') else {
            return Err(Error::InvalidAddress("Address must contain @".into()));
        };

        if domain.contains('@') {
            return Err(Error::InvalidAddress(
                "Address must have exactly one @".into(),
            ));
        }

        if local.is_empty() || domain.is_empty() {
            return Err(Error::InvalidAddress(
                "Local and domain parts cannot be empty".into(),
            ));
        }

        Ok(())
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// Mailbox (optional display name + address), as used in message headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    /// Name shown before the address, if any.
    pub name: Option<String>,
    /// The address itself.
    pub address: Address,
}

impl Mailbox {
    /// Parses a bare address with no display name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address fails validation.
    pub fn new(address: impl Into<String>) -> Result<Self> {
        Ok(Self {
            name: None,
            address: Address::new(address)?,
        })
    }

    /// Parses an address and attaches the name shown in the From header.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address fails validation.
    pub fn with_name(name: impl Into<String>, address: impl Into<String>) -> Result<Self> {
        Ok(Self {
            name: Some(name.into()),
            address: Address::new(address)?,
        })
    }
}

impl From<Address> for Mailbox {
    fn from(address: Address) -> Self {
        Self {
            name: None,
            address,
        }
    }
}

impl std::fmt::Display for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => write!(f, "{name} <{}>", self.address),
            _ => write!(f, "<{}>", self.address),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_address() {
        let addr = Address::new("user@example.com").unwrap();
        assert_eq!(addr.as_str(), "user@example.com");
        assert_eq!(addr.domain(), "example.com");
    }

    #[test]
    fn test_invalid_address_no_at() {
        assert!(Address::new("userexample.com").is_err());
    }

    #[test]
    fn test_invalid_address_empty() {
        assert!(Address::new("").is_err());
    }

    #[test]
    fn test_invalid_address_two_ats() {
        assert!(Address::new("a@b@example.com").is_err());
    }

    #[test]
    fn test_invalid_address_empty_parts() {
        assert!(Address::new("@example.com").is_err());
        assert!(Address::new("user@").is_err());
    }

    #[test]
    fn test_invalid_address_command_injection() {
        assert!(Address::new("user@example.com\r\nRCPT TO:<x@y.z>").is_err());
        assert!(Address::new("user@example.com> SIZE=1").is_err());
    }

    #[test]
    fn test_parse() {
        let addr: Address = "bob@bob.com".parse().unwrap();
        assert_eq!(addr.to_string(), "bob@bob.com");
    }

    #[test]
    fn test_mailbox_display() {
        let mailbox = Mailbox::with_name("digletti", "bob@bob.com").unwrap();
        assert_eq!(mailbox.to_string(), "digletti <bob@bob.com>");

        let bare = Mailbox::new("bob@bob.com").unwrap();
        assert!(bare.name.is_none());
        assert_eq!(bare.to_string(), "<bob@bob.com>");
    }
}
