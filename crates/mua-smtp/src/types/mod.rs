//! Core SMTP types.

mod address;
mod envelope;
mod extension;
mod reply;

pub use address::{Address, Mailbox};
pub(crate) use envelope::DATA_TERMINATOR;
pub use envelope::MailEnvelope;
pub use extension::Extension;
pub use reply::{ReplyCode, ServerResponse};
