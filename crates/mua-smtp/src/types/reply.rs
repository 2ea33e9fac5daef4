//! SMTP reply types.

/// One parsed server response line.
///
/// Multi-line replies (EHLO) are read as a sequence of these, one per line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerResponse {
    /// Reply code (e.g., 250).
    pub code: ReplyCode,
    /// Everything after the code, separator included (e.g., `" OK"` or `"-SIZE"`).
    pub text: String,
}

impl ServerResponse {
    /// Creates a new response.
    #[must_use]
    pub fn new(code: ReplyCode, text: impl Into<String>) -> Self {
        Self {
            code,
            text: text.into(),
        }
    }

    /// Returns true if more lines of the same reply follow this one.
    #[must_use]
    pub fn is_continuation(&self) -> bool {
        self.text.starts_with('-')
    }

    /// Returns true if this line terminates its reply.
    #[must_use]
    pub fn is_last(&self) -> bool {
        !self.is_continuation()
    }

    /// Returns the status text without the separator character.
    #[must_use]
    pub fn message(&self) -> &str {
        self.text
            .strip_prefix(['-', ' '])
            .unwrap_or(self.text.as_str())
    }

    /// Returns true if this is a success reply (2xx).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient_error(&self) -> bool {
        self.code.is_transient()
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent_error(&self) -> bool {
        self.code.is_permanent()
    }
}

impl std::fmt::Display for ServerResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.code, self.text)
    }
}

/// SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// Wraps a numeric code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// First digit of the code: 2 success, 3 intermediate, 4 transient, 5 permanent.
    const fn class(self) -> u16 {
        self.0 / 100
    }

    /// 2xx: the command completed.
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.class() == 2
    }

    /// 3xx: the server waits for more input (AUTH challenge, DATA).
    #[must_use]
    pub const fn is_intermediate(self) -> bool {
        self.class() == 3
    }

    /// 4xx: retrying later may succeed.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        self.class() == 4
    }

    /// 5xx: retrying the same command will fail again.
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        self.class() == 5
    }
}

impl std::fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

impl From<ReplyCode> for u16 {
    fn from(code: ReplyCode) -> Self {
        code.0
    }
}

// Codes the session expects or tests against
impl ReplyCode {
    /// 220, greeting and STARTTLS go-ahead.
    pub const SERVICE_READY: Self = Self(220);
    /// 221, reply to QUIT.
    pub const CLOSING: Self = Self(221);
    /// 235, AUTH accepted.
    pub const AUTH_SUCCESS: Self = Self(235);
    /// 250, EHLO, MAIL, RCPT, end of data and RSET accepted.
    pub const OK: Self = Self(250);
    /// 251, recipient will be forwarded.
    pub const FORWARD: Self = Self(251);
    /// 334, AUTH challenge.
    pub const AUTH_CONTINUE: Self = Self(334);
    /// 354, send the message body.
    pub const START_DATA: Self = Self(354);
    /// 421, the server is shutting the channel.
    pub const SERVICE_UNAVAILABLE: Self = Self(421);
    /// 450, mailbox temporarily unavailable.
    pub const MAILBOX_BUSY: Self = Self(450);
    /// 455, parameters cannot be accommodated right now.
    pub const UNABLE_TO_ACCOMMODATE: Self = Self(455);
    /// 501, bad command arguments.
    pub const PARAMETER_ERROR: Self = Self(501);
    /// 535, credentials rejected.
    pub const AUTH_FAILED: Self = Self(535);
    /// 541, refused by policy.
    pub const REJECTED_BY_POLICY: Self = Self(541);
    /// 551, the relay does not serve this sender or recipient.
    pub const USER_NOT_LOCAL: Self = Self(551);
    /// 554, transaction failed or no service.
    pub const TRANSACTION_FAILED: Self = Self(554);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    mod reply_code_tests {
        use super::*;

        #[test]
        fn success_codes() {
            assert!(ReplyCode::OK.is_success());
            assert!(ReplyCode::SERVICE_READY.is_success());
            assert!(ReplyCode::AUTH_SUCCESS.is_success());
            assert!(ReplyCode::FORWARD.is_success());
        }

        #[test]
        fn intermediate_codes() {
            assert!(ReplyCode::AUTH_CONTINUE.is_intermediate());
            assert!(ReplyCode::START_DATA.is_intermediate());
            assert!(!ReplyCode::START_DATA.is_success());
        }

        #[test]
        fn transient_errors() {
            assert!(ReplyCode::SERVICE_UNAVAILABLE.is_transient());
            assert!(ReplyCode::UNABLE_TO_ACCOMMODATE.is_transient());
            assert!(!ReplyCode::SERVICE_UNAVAILABLE.is_permanent());
        }

        #[test]
        fn permanent_errors() {
            assert!(ReplyCode::AUTH_FAILED.is_permanent());
            assert!(ReplyCode::REJECTED_BY_POLICY.is_permanent());
            assert!(ReplyCode::USER_NOT_LOCAL.is_permanent());
        }

        #[test]
        fn display_and_conversion() {
            assert_eq!(ReplyCode::OK.to_string(), "250");
            assert_eq!(u16::from(ReplyCode::AUTH_FAILED), 535);
        }
    }

    mod server_response_tests {
        use super::*;

        #[test]
        fn continuation_follows_separator() {
            let more = ServerResponse::new(ReplyCode::OK, "-SIZE 35882577");
            assert!(more.is_continuation());
            assert!(!more.is_last());

            let last = ServerResponse::new(ReplyCode::OK, " AUTH LOGIN");
            assert!(last.is_last());
        }

        #[test]
        fn message_drops_separator() {
            let resp = ServerResponse::new(ReplyCode::USER_NOT_LOCAL, " User not local");
            assert_eq!(resp.message(), "User not local");
            assert_eq!(resp.text, " User not local");
        }

        #[test]
        fn display_rebuilds_line() {
            let resp = ServerResponse::new(ReplyCode::SERVICE_READY, " ready.");
            assert_eq!(resp.to_string(), "220 ready.");
        }

        #[test]
        fn classes() {
            let resp = ServerResponse::new(ReplyCode::MAILBOX_BUSY, " busy");
            assert!(resp.is_transient_error());
            assert!(!resp.is_success());
            assert!(!resp.is_permanent_error());
        }
    }
}
