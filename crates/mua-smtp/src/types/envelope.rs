//! Mail transaction input.

use super::Address;

/// Terminator that ends the DATA phase.
pub(crate) const DATA_TERMINATOR: &[u8] = b"\r\n.\r\n";

/// One message to submit: envelope sender, recipient and the finished body.
///
/// The body is sent verbatim after DATA and must already be dot-stuffed and
/// end with `<CRLF>.<CRLF>`; [`MessageBuilder`](crate::MessageBuilder)
/// produces bodies in that form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailEnvelope {
    /// Envelope sender (MAIL FROM).
    pub from: Address,
    /// Envelope recipient (RCPT TO).
    pub to: Address,
    /// Finished message bytes.
    pub body: Vec<u8>,
}

impl MailEnvelope {
    /// Creates a new envelope.
    #[must_use]
    pub fn new(from: Address, to: Address, body: impl Into<Vec<u8>>) -> Self {
        Self {
            from,
            to,
            body: body.into(),
        }
    }

    /// Returns true if the body ends with the DATA terminator.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.body.ends_with(DATA_TERMINATOR) || self.body == b".\r\n"
    }
}
