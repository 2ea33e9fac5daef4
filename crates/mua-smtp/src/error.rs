//! Error types for SMTP operations.

use std::io;

use crate::types::ReplyCode;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
///
/// Protocol rejections carry the status code and text the server sent so
/// callers can tell a permanent (5xx) failure from a transient (4xx) one.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport failure (connect, read, write or deadline expiry).
    ///
    /// Fatal to the session: the connection is presumed broken.
    #[error("Connection error: {0}")]
    Connection(#[from] io::Error),

    /// The server sent a line that is not a valid SMTP reply. Fatal to the
    /// session, since the reply boundary is lost.
    #[error("Malformed response: {0:?}")]
    MalformedResponse(String),

    /// The server greeting was not 220.
    #[error("Greeting rejected ({code}):{text}")]
    Greeting {
        /// Observed reply code.
        code: ReplyCode,
        /// Observed status text.
        text: String,
    },

    /// A line of the EHLO reply was not 250.
    #[error("EHLO rejected ({code}):{text}")]
    Hello {
        /// Observed reply code.
        code: ReplyCode,
        /// Observed status text.
        text: String,
    },

    /// STARTTLS was refused or the TLS handshake failed.
    #[error("TLS upgrade failed: {message}")]
    TlsUpgrade {
        /// Reply code, when the server refused the STARTTLS command.
        code: Option<ReplyCode>,
        /// Status text or handshake failure description.
        message: String,
    },

    /// AUTH LOGIN broke off before the password step.
    #[error("AUTH LOGIN protocol error ({code}):{text}")]
    Auth {
        /// Observed reply code.
        code: ReplyCode,
        /// Observed status text.
        text: String,
    },

    /// The server rejected the credentials.
    #[error("Authentication failed ({code}):{text}")]
    AuthFailed {
        /// Observed reply code.
        code: ReplyCode,
        /// Observed status text.
        text: String,
    },

    /// MAIL FROM was not accepted.
    #[error("MAIL FROM rejected ({code}):{text}")]
    MailFromRejected {
        /// Observed reply code.
        code: ReplyCode,
        /// Observed status text.
        text: String,
    },

    /// RCPT TO was not accepted.
    #[error("RCPT TO rejected ({code}):{text}")]
    RecipientRejected {
        /// Observed reply code.
        code: ReplyCode,
        /// Observed status text.
        text: String,
    },

    /// DATA was not answered with 354.
    #[error("DATA not accepted ({code}):{text}")]
    DataNotAccepted {
        /// Observed reply code.
        code: ReplyCode,
        /// Observed status text.
        text: String,
    },

    /// The message body was not accepted after the terminator.
    #[error("Message rejected ({code}):{text}")]
    MessageRejected {
        /// Observed reply code.
        code: ReplyCode,
        /// Observed status text.
        text: String,
    },

    /// RSET was not answered with 250.
    #[error("RSET rejected ({code}):{text}")]
    ResetRejected {
        /// Observed reply code.
        code: ReplyCode,
        /// Observed status text.
        text: String,
    },

    /// Credentials or mail data would be sent over an unencrypted channel.
    #[error("Refusing to send credentials or mail data without TLS")]
    NotSecured,

    /// Connection already authenticated.
    #[error("Connection already authenticated")]
    AlreadyAuthenticated,

    /// Invalid state for operation.
    #[error("Invalid state for operation: {0}")]
    InvalidState(String),

    /// Feature not advertised by the server.
    #[error("Server does not advertise {0}")]
    NotSupported(String),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Invalid `host[:port]` server address.
    #[error("Invalid server address: {0}")]
    InvalidServerAddress(String),

    /// The message body does not end with `CRLF.CRLF`.
    #[error("Message body is not terminated by <CRLF>.<CRLF>")]
    UnterminatedMessage,
}

impl Error {
    /// Returns the reply code the server sent, if this error carries one.
    #[must_use]
    pub const fn reply_code(&self) -> Option<ReplyCode> {
        match self {
            Self::Greeting { code, .. }
            | Self::Hello { code, .. }
            | Self::Auth { code, .. }
            | Self::AuthFailed { code, .. }
            | Self::MailFromRejected { code, .. }
            | Self::RecipientRejected { code, .. }
            | Self::DataNotAccepted { code, .. }
            | Self::MessageRejected { code, .. }
            | Self::ResetRejected { code, .. } => Some(*code),
            Self::TlsUpgrade { code, .. } => *code,
            _ => None,
        }
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        match self.reply_code() {
            Some(code) => code.is_permanent(),
            None => false,
        }
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self.reply_code() {
            Some(code) => code.is_transient(),
            None => false,
        }
    }

    /// Returns true if the connection can no longer be used.
    ///
    /// A reply that cannot be framed counts: the rest of it would otherwise be
    /// read as the answer to the next command.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::MalformedResponse(_))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn rejection_classes() {
        let err = Error::MailFromRejected {
            code: ReplyCode::USER_NOT_LOCAL,
            text: " User not local".into(),
        };
        assert_eq!(err.reply_code(), Some(ReplyCode::USER_NOT_LOCAL));
        assert!(err.is_permanent());
        assert!(!err.is_transient());
        assert!(!err.is_fatal());

        let err = Error::RecipientRejected {
            code: ReplyCode::MAILBOX_BUSY,
            text: " try later".into(),
        };
        assert!(err.is_transient());
        assert!(!err.is_permanent());
    }

    #[test]
    fn transport_errors_are_fatal() {
        let err = Error::from(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        assert!(err.is_fatal());
        assert_eq!(err.reply_code(), None);
    }

    #[test]
    fn malformed_replies_are_fatal() {
        let err = Error::MalformedResponse("XYZ garbage".into());
        assert!(err.is_fatal());
        assert!(!err.is_permanent());
    }

    #[test]
    fn tls_upgrade_code_is_optional() {
        let refused = Error::TlsUpgrade {
            code: Some(ReplyCode::new(454)),
            message: " TLS not available".into(),
        };
        assert!(refused.is_transient());

        let handshake = Error::TlsUpgrade {
            code: None,
            message: "invalid peer certificate".into(),
        };
        assert_eq!(handshake.reply_code(), None);
    }

    #[test]
    fn display_keeps_server_text() {
        let err = Error::AuthFailed {
            code: ReplyCode::AUTH_FAILED,
            text: " 5.7.8 Authentication failed".into(),
        };
        assert_eq!(
            err.to_string(),
            "Authentication failed (535): 5.7.8 Authentication failed"
        );
    }
}
