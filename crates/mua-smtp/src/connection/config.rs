//! Session configuration.

use std::time::Duration;

use crate::error::{Error, Result};

/// Default submission port.
pub const SUBMISSION_PORT: u16 = 587;

/// SMTP session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Server hostname, also used to validate the TLS certificate.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Name announced in EHLO.
    pub client_hostname: String,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Deadline for each read or write, and for the TLS handshake.
    pub io_timeout: Duration,
    /// Send RSET after every accepted message.
    pub reset_after_send: bool,
    /// Refuse STARTTLS / AUTH LOGIN unless the EHLO reply advertised them.
    pub require_advertised: bool,
}

impl Config {
    /// Creates a configuration for `host` on the submission port.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self::builder(host).build()
    }

    /// Parses a `host[:port]` server address; the port defaults to 587.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidServerAddress`] if the host is empty or the port
    /// is not a number in 1-65535.
    pub fn from_address(address: &str) -> Result<Self> {
        let address = address.trim();
        let (host, port) = match address.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .ok()
                    .filter(|p| *p != 0)
                    .ok_or_else(|| Error::InvalidServerAddress(address.to_string()))?;
                (host, port)
            }
            None => (address, SUBMISSION_PORT),
        };

        if host.is_empty() || host.contains(':') {
            return Err(Error::InvalidServerAddress(address.to_string()));
        }

        Ok(Self::builder(host).port(port).build())
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(host)
    }

    /// Returns `host:port`.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Builder for [`Config`].
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    host: String,
    port: u16,
    client_hostname: String,
    connect_timeout: Duration,
    io_timeout: Duration,
    reset_after_send: bool,
    require_advertised: bool,
}

impl ConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: SUBMISSION_PORT,
            client_hostname: "localhost".to_string(),
            connect_timeout: Duration::from_secs(30),
            io_timeout: Duration::from_secs(60),
            reset_after_send: true,
            require_advertised: false,
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the name announced in EHLO.
    #[must_use]
    pub fn client_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.client_hostname = hostname.into();
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the I/O timeout.
    #[must_use]
    pub const fn io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Enables or disables RSET after each accepted message.
    #[must_use]
    pub const fn reset_after_send(mut self, enabled: bool) -> Self {
        self.reset_after_send = enabled;
        self
    }

    /// Enables or disables capability gating for STARTTLS and AUTH LOGIN.
    #[must_use]
    pub const fn require_advertised(mut self, enabled: bool) -> Self {
        self.require_advertised = enabled;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        Config {
            host: self.host,
            port: self.port,
            client_hostname: self.client_hostname,
            connect_timeout: self.connect_timeout,
            io_timeout: self.io_timeout,
            reset_after_send: self.reset_after_send,
            require_advertised: self.require_advertised,
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_config_new() {
        let config = Config::new("smtp.example.com");
        assert_eq!(config.host, "smtp.example.com");
        assert_eq!(config.port, 587);
        assert_eq!(config.client_hostname, "localhost");
        assert!(config.reset_after_send);
        assert!(!config.require_advertised);
    }

    #[test]
    fn test_from_address_with_port() {
        let config = Config::from_address("smtp-mail.outlook.com:587").unwrap();
        assert_eq!(config.host, "smtp-mail.outlook.com");
        assert_eq!(config.port, 587);
        assert_eq!(config.address(), "smtp-mail.outlook.com:587");
    }

    #[test]
    fn test_from_address_default_port() {
        let config = Config::from_address("mail.example.org").unwrap();
        assert_eq!(config.port, SUBMISSION_PORT);
    }

    #[test]
    fn test_from_address_invalid() {
        for bad in ["", ":587", "host:", "host:0", "host:70000", "host:smtp", "a:b:25"] {
            assert!(
                matches!(Config::from_address(bad), Err(Error::InvalidServerAddress(_))),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn test_builder() {
        let config = Config::builder("smtp.example.com")
            .port(2525)
            .client_hostname("client.example.com")
            .connect_timeout(Duration::from_secs(5))
            .io_timeout(Duration::from_secs(10))
            .reset_after_send(false)
            .require_advertised(true)
            .build();

        assert_eq!(config.port, 2525);
        assert_eq!(config.client_hostname, "client.example.com");
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.io_timeout, Duration::from_secs(10));
        assert!(!config.reset_after_send);
        assert!(config.require_advertised);
    }
}
