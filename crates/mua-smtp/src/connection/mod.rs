//! SMTP connection management: transport, line channel and session.

mod config;
mod connector;
mod session;
mod stream;

pub use config::{Config, ConfigBuilder, SUBMISSION_PORT};
pub use connector::{Connector, TcpConnector};
pub use session::{Session, SessionState};
pub use stream::{LineChannel, SmtpStream};

use crate::types::{Extension, ServerResponse};
use std::collections::HashSet;

/// Server capabilities from the greeting and the latest EHLO reply.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    /// Server hostname from greeting.
    pub hostname: String,
    /// Advertised extensions.
    pub extensions: HashSet<Extension>,
}

impl ServerInfo {
    /// Replaces the extension set with the keywords of an EHLO reply.
    ///
    /// The first line is the server's greeting, not a capability.
    pub fn update_from_ehlo(&mut self, reply: &[ServerResponse]) {
        self.extensions = reply
            .iter()
            .skip(1)
            .map(|line| Extension::parse(line.message()))
            .collect();
    }

    /// Checks if the server supports an extension.
    #[must_use]
    pub fn supports(&self, ext: &Extension) -> bool {
        self.extensions.contains(ext)
    }

    /// Checks if STARTTLS is supported.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.supports(&Extension::StartTls)
    }

    /// Checks if an AUTH line lists `mechanism`.
    #[must_use]
    pub fn supports_auth(&self, mechanism: &str) -> bool {
        self.extensions.iter().any(|ext| ext.offers_auth(mechanism))
    }

    /// Returns the maximum message size, if advertised.
    #[must_use]
    pub fn max_message_size(&self) -> Option<usize> {
        self.extensions.iter().find_map(|ext| match ext {
            Extension::Size(size) => *size,
            _ => None,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::parser::parse_line;

    #[test]
    fn test_update_from_ehlo() {
        let reply: Vec<ServerResponse> = [
            "250-smtp.example.com Hello",
            "250-SIZE 35882577",
            "250-STARTTLS",
            "250 AUTH LOGIN XOAUTH2",
        ]
        .iter()
        .map(|l| parse_line(l).unwrap())
        .collect();

        let mut info = ServerInfo::default();
        info.update_from_ehlo(&reply);

        assert_eq!(info.extensions.len(), 3);
        assert!(info.supports_starttls());
        assert!(info.supports_auth("LOGIN"));
        assert!(!info.supports_auth("PLAIN"));
        assert_eq!(info.max_message_size(), Some(35_882_577));
    }

    #[test]
    fn test_update_replaces_previous_extensions() {
        let mut info = ServerInfo::default();
        info.update_from_ehlo(&[
            parse_line("250-host").unwrap(),
            parse_line("250 STARTTLS").unwrap(),
        ]);
        info.update_from_ehlo(&[parse_line("250 host").unwrap()]);

        assert!(info.extensions.is_empty());
        assert!(!info.supports_starttls());
    }
}
