//! Message assembly.
//!
//! Produces the finished DATA payload a [`Session`](crate::Session) expects:
//! CRLF line endings, dot-stuffed lines and a trailing `<CRLF>.<CRLF>`.

use crate::types::{Address, DATA_TERMINATOR, MailEnvelope, Mailbox};

/// Accumulates a plain-text message body line by line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyBuilder {
    text: String,
}

impl BodyBuilder {
    /// Creates an empty body.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `text` and ends the line.
    #[must_use]
    pub fn line(mut self, text: &str) -> Self {
        self.text.push_str(text);
        self.text.push_str("\r\n");
        self
    }

    /// Appends `text` to the current line.
    #[must_use]
    pub fn append(mut self, text: &str) -> Self {
        self.text.push_str(text);
        self
    }

    /// Ends the current line.
    #[must_use]
    pub fn break_line(mut self) -> Self {
        self.text.push_str("\r\n");
        self
    }

    /// Returns the body text so far.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

/// Builds a plain-text RFC 5322 message for one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBuilder {
    from: Mailbox,
    to: Address,
    subject: String,
    body: String,
}

impl MessageBuilder {
    /// Starts a message from `from` to `to` with an empty subject and body.
    #[must_use]
    pub fn new(from: impl Into<Mailbox>, to: Address) -> Self {
        Self {
            from: from.into(),
            to,
            subject: String::new(),
            body: String::new(),
        }
    }

    /// Sets the subject.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Sets the body text.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets the body from a [`BodyBuilder`].
    #[must_use]
    pub fn body_from(self, body: &BodyBuilder) -> Self {
        self.body(body.as_str())
    }

    /// Assembles the DATA payload.
    #[must_use]
    pub fn build(&self) -> Vec<u8> {
        let mut out = String::new();

        out.push_str(&header("From", &self.from.to_string()));
        out.push_str(&header("To", self.to.as_str()));
        out.push_str(&header("Subject", &self.subject));
        out.push_str("MIME-Version: 1.0\r\n");
        out.push_str("Content-Type: text/plain; charset=utf-8\r\n");
        out.push_str("Content-Transfer-Encoding: 8bit\r\n");
        out.push_str("\r\n");

        let body = self
            .body
            .strip_suffix('\n')
            .map_or(self.body.as_str(), |b| b.strip_suffix('\r').unwrap_or(b));

        if !body.is_empty() {
            for line in body.split('\n') {
                let line = line.strip_suffix('\r').unwrap_or(line);
                // Byte-stuff lines starting with '.'
                if line.starts_with('.') {
                    out.push('.');
                }
                out.push_str(line);
                out.push_str("\r\n");
            }
        }

        let mut data = out.into_bytes();
        // Headers always end in CRLF, so only the ".\r\n" half is missing
        data.extend_from_slice(&DATA_TERMINATOR[2..]);
        data
    }

    /// Builds the message and wraps it in an envelope for the same parties.
    #[must_use]
    pub fn envelope(&self) -> MailEnvelope {
        MailEnvelope::new(self.from.address.clone(), self.to.clone(), self.build())
    }
}

/// Formats one header line, folding stray CR/LF into spaces.
fn header(name: &str, value: &str) -> String {
    let value: String = value
        .chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect();
    format!("{name}: {value}\r\n")
}
