//! # mua-smtp
//!
//! An SMTP submission client (RFC 5321) for sending a message through an
//! authenticated relay.
//!
//! ## Features
//!
//! - **Reply classification**: one-line parsing, expected-code checks and
//!   multi-line reply detection
//! - **Session state machine**: connect, greeting, EHLO, STARTTLS, AUTH LOGIN,
//!   MAIL FROM, RCPT TO, DATA, RSET and close, each checked against the state
//!   it is allowed in
//! - **TLS**: STARTTLS over the same connection with rustls and webpki roots
//! - **Typed errors**: every rejection carries the server's code and text
//!
//! ## Quick Start
//!
//! ```ignore
//! use mua_smtp::{Address, Config, Mailbox, MessageBuilder, Session};
//! use secrecy::SecretString;
//!
//! #[tokio::main]
//! async fn main() -> mua_smtp::Result<()> {
//!     let sender = Address::new("bob@bob.com")?;
//!     let password = SecretString::new("app-password".into());
//!     let config = Config::from_address("smtp.gmail.com:587")?;
//!
//!     let mut session = Session::new(sender.clone(), password, config);
//!     if !session.establish().await? {
//!         eprintln!("credentials rejected");
//!         return session.quit().await;
//!     }
//!
//!     let message = MessageBuilder::new(sender, Address::new("alice@example.com")?)
//!         .subject("Hello")
//!         .body("Sent over STARTTLS.");
//!     session.send_mail(&message.envelope()).await?;
//!
//!     session.quit().await
//! }
//! ```
//!
//! ## Session States
//!
//! ```text
//! Unconnected → Connected → Greeted → Secured → Authenticated → TransactionReady
//!                                        └──────── send_mail ──────────┘
//! ```
//!
//! Mail can only be sent once the channel is encrypted; authentication is
//! optional for relays that accept unauthenticated submission over TLS.
//!
//! ## Modules
//!
//! - [`command`]: SMTP commands and their wire form
//! - [`connection`]: Configuration, transport and the session
//! - [`message`]: Message assembly into a DATA payload
//! - [`parser`]: Reply line classifier
//! - [`types`]: Core SMTP types (addresses, envelopes, extensions, replies)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod message;
pub mod parser;
pub mod types;

pub use connection::{
    Config, ConfigBuilder, Connector, LineChannel, SUBMISSION_PORT, ServerInfo, Session,
    SessionState, SmtpStream, TcpConnector,
};
pub use error::{Error, Result};
pub use message::{BodyBuilder, MessageBuilder};
pub use parser::{ReplyCheck, check_reply, is_last_reply_line, parse_line};
pub use types::{Address, Extension, MailEnvelope, Mailbox, ReplyCode, ServerResponse};
