//! SMTP session state machine.
//!
//! ```text
//! Unconnected ─connect→ Connected ─greet→ Greeted ─starttls→ Secured
//!                                                              │
//!                                   authenticate ┌─────────────┤
//!                                                ▼             ▼
//!                                         Authenticated ─send_mail→ TransactionReady ⟲
//! ```
//!
//! `close` moves any state to `Closed`. Every operation takes `&mut self`,
//! issues its commands, and reads exactly the replies it expects before
//! returning. Rejections leave the state untouched; transport failures and
//! replies that cannot be framed drop the connection and close the session.

use std::fmt;
use std::io;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secrecy::{ExposeSecret, SecretString};

use super::connector::{Connector, TcpConnector};
use super::stream::LineChannel;
use super::{Config, ServerInfo};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::parser::{check_reply, is_last_reply_line, parse_line};
use crate::types::{Address, MailEnvelope, ReplyCode, ServerResponse};

/// Guard against servers that never terminate a multi-line reply.
const MAX_REPLY_LINES: usize = 512;

/// Where a [`Session`] is in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection yet.
    Unconnected,
    /// Transport open, greeting not read.
    Connected,
    /// Greeting accepted.
    Greeted,
    /// STARTTLS completed; the channel is encrypted.
    Secured,
    /// AUTH LOGIN accepted.
    Authenticated,
    /// At least one message accepted; ready for the next one.
    TransactionReady,
    /// Connection released.
    Closed,
}

/// A single SMTP submission session.
///
/// The connection handle lives inside the [`LineChannel`], so the two are
/// always replaced together.
pub struct Session<C: Connector = TcpConnector> {
    sender: Address,
    credential: SecretString,
    config: Config,
    connector: C,
    channel: Option<LineChannel<C::Stream>>,
    state: SessionState,
    secured: bool,
    authenticated: bool,
    server_info: ServerInfo,
}

impl Session<TcpConnector> {
    /// Creates a session that connects over TCP and upgrades with rustls.
    #[must_use]
    pub fn new(sender: Address, credential: SecretString, config: Config) -> Self {
        Self::with_connector(sender, credential, config, TcpConnector::new())
    }
}

impl<C: Connector> Session<C> {
    /// Creates a session over a custom transport.
    #[must_use]
    pub fn with_connector(
        sender: Address,
        credential: SecretString,
        config: Config,
        connector: C,
    ) -> Self {
        Self {
            sender,
            credential,
            config,
            connector,
            channel: None,
            state: SessionState::Unconnected,
            secured: false,
            authenticated: false,
            server_info: ServerInfo::default(),
        }
    }

    /// Returns the current protocol state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Returns true once STARTTLS has succeeded on the live connection.
    #[must_use]
    pub const fn is_secured(&self) -> bool {
        self.secured
    }

    /// Returns true once AUTH LOGIN has succeeded on the live connection.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Returns what the server advertised in its latest EHLO reply.
    #[must_use]
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Returns the sender address used for AUTH LOGIN.
    #[must_use]
    pub const fn sender(&self) -> &Address {
        &self.sender
    }

    /// Returns the session configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Opens the transport connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the server cannot be reached; the
    /// session stays `Unconnected`.
    pub async fn connect(&mut self) -> Result<()> {
        self.expect_state(&[SessionState::Unconnected], "connect")?;

        let host = self.config.host.as_str();
        let port = self.config.port;
        let stream = match tokio::time::timeout(
            self.config.connect_timeout,
            self.connector.connect(host, port),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                tracing::warn!(host, port, error = %e, "Connection failed");
                return Err(e);
            }
            Err(_) => {
                tracing::warn!(host, port, "Connection timed out");
                return Err(Error::Connection(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connecting to {host}:{port} timed out"),
                )));
            }
        };

        tracing::info!(host, port, "Connected");
        self.channel = Some(LineChannel::new(stream, self.config.io_timeout));
        self.state = SessionState::Connected;
        Ok(())
    }

    /// Reads the server greeting; expects 220.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Greeting`] with the observed code and text if the
    /// server is not ready. The session should then be closed.
    pub async fn greet(&mut self) -> Result<ServerResponse> {
        self.expect_state(&[SessionState::Connected], "read greeting")?;

        let mut reply = self
            .expect_reply(ReplyCode::SERVICE_READY, |code, text| Error::Greeting {
                code,
                text,
            })
            .await?;

        let greeting = reply.swap_remove(0);
        self.server_info.hostname = greeting
            .message()
            .split_whitespace()
            .next()
            .unwrap_or("unknown")
            .to_string();
        self.state = SessionState::Greeted;
        Ok(greeting)
    }

    /// Sends EHLO and reads the full multi-line reply; every line must be 250.
    ///
    /// The advertised extensions replace [`Session::server_info`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Hello`] with the first line that was not 250.
    pub async fn hello(&mut self) -> Result<Vec<ServerResponse>> {
        self.expect_state(&[SessionState::Greeted, SessionState::Secured], "send EHLO")?;

        let cmd = Command::Ehlo {
            hostname: self.config.client_hostname.clone(),
        };
        self.write_command(&cmd).await?;
        let reply = self
            .expect_reply(ReplyCode::OK, |code, text| Error::Hello { code, text })
            .await?;

        self.server_info.update_from_ehlo(&reply);
        Ok(reply)
    }

    /// Upgrades the connection with STARTTLS and repeats EHLO over TLS.
    ///
    /// The handshake runs over the existing connection. Once the server has
    /// answered 220 the plaintext channel is gone: a failed handshake closes
    /// the session rather than continuing in the clear.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TlsUpgrade`] if the server refuses or the handshake or
    /// certificate validation fails, and [`Error::Hello`] if the post-TLS EHLO
    /// is rejected.
    pub async fn starttls(&mut self) -> Result<()> {
        self.expect_state(&[SessionState::Greeted], "start TLS")?;

        if self.config.require_advertised && !self.server_info.supports_starttls() {
            return Err(Error::NotSupported("STARTTLS".into()));
        }

        self.write_command(&Command::StartTls).await?;
        self.expect_reply(ReplyCode::SERVICE_READY, |code, text| Error::TlsUpgrade {
            code: Some(code),
            message: text,
        })
        .await?;

        let Some(channel) = self.channel.take() else {
            return Err(Self::no_connection());
        };

        match self.handshake(channel).await {
            Ok(stream) => {
                self.channel = Some(LineChannel::new(stream, self.config.io_timeout));
                self.secured = true;
                self.state = SessionState::Secured;
                self.server_info.extensions.clear();
                tracing::info!(host = %self.config.host, "TLS established");
            }
            Err(e) => {
                tracing::warn!(error = %e, "TLS upgrade failed");
                self.abandon();
                return Err(e);
            }
        }

        self.hello().await?;
        Ok(())
    }

    /// Authenticates with AUTH LOGIN using the sender address and credential.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSecured`] before writing anything if STARTTLS has not
    /// succeeded, [`Error::Auth`] if a 334 challenge is missing, and
    /// [`Error::AuthFailed`] if the server does not answer 235 to the password.
    pub async fn authenticate(&mut self) -> Result<()> {
        self.require_secured()?;
        if self.authenticated {
            return Err(Error::AlreadyAuthenticated);
        }
        self.expect_state(
            &[SessionState::Secured, SessionState::TransactionReady],
            "authenticate",
        )?;

        if self.config.require_advertised && !self.server_info.supports_auth("LOGIN") {
            return Err(Error::NotSupported("AUTH LOGIN".into()));
        }

        self.write_command(&Command::AuthLogin).await?;
        self.expect_reply(ReplyCode::AUTH_CONTINUE, |code, text| Error::Auth { code, text })
            .await?;

        let username = STANDARD.encode(self.sender.as_str());
        self.write_secret_line(&username).await?;
        self.expect_reply(ReplyCode::AUTH_CONTINUE, |code, text| Error::Auth { code, text })
            .await?;

        let password = STANDARD.encode(self.credential.expose_secret());
        self.write_secret_line(&password).await?;
        self.expect_reply(ReplyCode::AUTH_SUCCESS, |code, text| Error::AuthFailed {
            code,
            text,
        })
        .await?;

        self.authenticated = true;
        self.state = SessionState::Authenticated;
        tracing::info!(user = %self.sender, "Authenticated");
        Ok(())
    }

    /// Like [`Session::authenticate`], but reports rejected credentials as
    /// `Ok(false)` instead of an error.
    ///
    /// # Errors
    ///
    /// Returns every error of [`Session::authenticate`] except
    /// [`Error::AuthFailed`].
    pub async fn try_authenticate(&mut self) -> Result<bool> {
        match self.authenticate().await {
            Ok(()) => Ok(true),
            Err(Error::AuthFailed { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Runs one mail transaction: MAIL FROM, RCPT TO, DATA, body.
    ///
    /// Returns the server's acceptance line for the message. With
    /// [`Config::reset_after_send`] an RSET follows; its failure is logged but
    /// does not turn an accepted message into an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSecured`] before writing anything on an unencrypted
    /// channel, [`Error::UnterminatedMessage`] if the body lacks `CRLF.CRLF`,
    /// and the step's rejection error ([`Error::MailFromRejected`],
    /// [`Error::RecipientRejected`], [`Error::DataNotAccepted`],
    /// [`Error::MessageRejected`]) otherwise. After a rejection the session
    /// remains usable for another transaction.
    pub async fn send_mail(&mut self, envelope: &MailEnvelope) -> Result<ServerResponse> {
        self.require_secured()?;
        self.expect_state(
            &[
                SessionState::Secured,
                SessionState::Authenticated,
                SessionState::TransactionReady,
            ],
            "send mail",
        )?;

        if !envelope.is_terminated() {
            return Err(Error::UnterminatedMessage);
        }

        let cmd = Command::MailFrom {
            from: envelope.from.clone(),
        };
        self.write_command(&cmd).await?;
        self.expect_reply(ReplyCode::OK, |code, text| Error::MailFromRejected {
            code,
            text,
        })
        .await?;

        let cmd = Command::RcptTo {
            to: envelope.to.clone(),
        };
        self.write_command(&cmd).await?;
        if let Err(e) = self
            .expect_reply(ReplyCode::OK, |code, text| Error::RecipientRejected {
                code,
                text,
            })
            .await
        {
            return Err(self.abort_transaction(e).await);
        }

        self.write_command(&Command::Data).await?;
        if let Err(e) = self
            .expect_reply(ReplyCode::START_DATA, |code, text| Error::DataNotAccepted {
                code,
                text,
            })
            .await
        {
            return Err(self.abort_transaction(e).await);
        }

        self.write_raw(&envelope.body).await?;
        let mut reply = self
            .expect_reply(ReplyCode::OK, |code, text| Error::MessageRejected {
                code,
                text,
            })
            .await?;
        let accepted = reply.swap_remove(reply.len() - 1);

        self.state = SessionState::TransactionReady;
        tracing::info!(to = %envelope.to, response = %accepted, "Message accepted");

        if self.config.reset_after_send {
            if let Err(e) = self.reset().await {
                tracing::warn!(error = %e, "RSET after accepted message failed");
            }
        }

        Ok(accepted)
    }

    /// Sends RSET, clearing any envelope state on the server.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResetRejected`] if the server does not answer 250.
    pub async fn reset(&mut self) -> Result<()> {
        self.expect_state(
            &[
                SessionState::Greeted,
                SessionState::Secured,
                SessionState::Authenticated,
                SessionState::TransactionReady,
            ],
            "reset",
        )?;

        self.write_command(&Command::Rset).await?;
        self.expect_reply(ReplyCode::OK, |code, text| Error::ResetRejected { code, text })
            .await?;
        Ok(())
    }

    /// Connects, reads the greeting, says EHLO, upgrades to TLS and logs in.
    ///
    /// Returns `Ok(false)` if the server rejected the credentials; the session
    /// is then `Secured` and still open. Any other failure closes the session,
    /// except calling this on a session that is not `Unconnected`, which fails
    /// with [`Error::InvalidState`] and leaves it untouched.
    ///
    /// # Errors
    ///
    /// Returns the first error of the underlying phases.
    pub async fn establish(&mut self) -> Result<bool> {
        self.expect_state(&[SessionState::Unconnected], "establish a session")?;

        let outcome = async {
            self.connect().await?;
            self.greet().await?;
            self.hello().await?;
            self.starttls().await?;
            self.try_authenticate().await
        }
        .await;

        if outcome.is_err() {
            if let Err(e) = self.close().await {
                tracing::debug!(error = %e, "Close after failed setup");
            }
        }
        outcome
    }

    /// Sends QUIT, then closes the connection whatever the answer.
    ///
    /// # Errors
    ///
    /// Returns the error of the QUIT exchange or of the close.
    pub async fn quit(&mut self) -> Result<()> {
        let exchange = if self.channel.is_some() {
            self.quit_exchange().await
        } else {
            Ok(())
        };
        let closed = self.close().await;
        exchange.and(closed)
    }

    /// Closes the connection. Closing a closed session is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if shutting down the stream fails; the
    /// session is `Closed` either way.
    pub async fn close(&mut self) -> Result<()> {
        self.state = SessionState::Closed;
        self.secured = false;
        self.authenticated = false;

        match self.channel.take() {
            Some(mut channel) => {
                tracing::info!(host = %self.config.host, "Closing connection");
                channel.shutdown().await
            }
            None => Ok(()),
        }
    }

    async fn quit_exchange(&mut self) -> Result<()> {
        self.write_command(&Command::Quit).await?;
        let reply = self.read_reply().await?;
        if let Some(last) = reply.last() {
            if !last.is_success() {
                tracing::warn!(response = %last, "Unexpected reply to QUIT");
            }
        }
        Ok(())
    }

    async fn handshake(&self, channel: LineChannel<C::Stream>) -> Result<C::Stream> {
        let stream = channel.into_inner()?;
        let host = self.config.host.as_str();

        match tokio::time::timeout(self.config.io_timeout, self.connector.upgrade(stream, host))
            .await
        {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e @ Error::TlsUpgrade { .. })) => Err(e),
            Ok(Err(e)) => Err(Error::TlsUpgrade {
                code: None,
                message: e.to_string(),
            }),
            Err(_) => Err(Error::TlsUpgrade {
                code: None,
                message: format!("TLS handshake with {host} timed out"),
            }),
        }
    }

    /// Clears a half-finished envelope after a rejection, keeping `err`.
    async fn abort_transaction(&mut self, err: Error) -> Error {
        if !err.is_fatal() {
            if let Err(reset_err) = self.reset().await {
                tracing::warn!(error = %reset_err, "RSET after rejected transaction failed");
            }
        }
        err
    }

    /// Reads one complete reply and checks every line against `expected`.
    ///
    /// The whole reply is consumed even when an early line mismatches, so the
    /// channel stays aligned with the server.
    async fn expect_reply(
        &mut self,
        expected: ReplyCode,
        reject: fn(ReplyCode, String) -> Error,
    ) -> Result<Vec<ServerResponse>> {
        let mut lines = Vec::new();
        let mut mismatch = None;

        loop {
            let line = self.read_line().await?;
            let check = self.guard(check_reply(&line, expected))?;
            if !check.matched && mismatch.is_none() {
                mismatch = Some(check.response.clone());
            }
            lines.push(check.response);

            if is_last_reply_line(&line) {
                break;
            }
            if lines.len() >= MAX_REPLY_LINES {
                return self.guard(Err(Self::overlong_reply()));
            }
        }

        match mismatch {
            Some(response) => {
                tracing::warn!(expected = %expected, response = %response, "Unexpected reply");
                Err(reject(response.code, response.text))
            }
            None => Ok(lines),
        }
    }

    /// Reads one complete reply without judging its code.
    async fn read_reply(&mut self) -> Result<Vec<ServerResponse>> {
        let mut lines = Vec::new();
        loop {
            let line = self.read_line().await?;
            let response = self.guard(parse_line(&line))?;
            let last = response.is_last();
            lines.push(response);
            if last {
                return Ok(lines);
            }
            if lines.len() >= MAX_REPLY_LINES {
                return self.guard(Err(Self::overlong_reply()));
            }
        }
    }

    async fn read_line(&mut self) -> Result<String> {
        let result = match self.channel.as_mut() {
            Some(channel) => channel.read_line().await,
            None => return Err(Self::no_connection()),
        };
        self.guard(result)
    }

    async fn write_command(&mut self, cmd: &Command) -> Result<()> {
        let result = match self.channel.as_mut() {
            Some(channel) => channel.write_command(cmd).await,
            None => return Err(Self::no_connection()),
        };
        self.guard(result)
    }

    async fn write_secret_line(&mut self, line: &str) -> Result<()> {
        let result = match self.channel.as_mut() {
            Some(channel) => channel.write_secret_line(line).await,
            None => return Err(Self::no_connection()),
        };
        self.guard(result)
    }

    async fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        let result = match self.channel.as_mut() {
            Some(channel) => channel.write_raw(data).await,
            None => return Err(Self::no_connection()),
        };
        self.guard(result)
    }

    /// Closes the session if `result` is a transport failure or a reply that
    /// lost its framing.
    fn guard<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_fatal() {
                tracing::warn!(error = %e, "Dropping connection");
                self.abandon();
            }
        }
        result
    }

    /// Drops the connection without a shutdown exchange.
    fn abandon(&mut self) {
        self.channel = None;
        self.state = SessionState::Closed;
        self.secured = false;
        self.authenticated = false;
    }

    fn expect_state(&self, allowed: &[SessionState], operation: &str) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::InvalidState(format!(
                "cannot {operation} while {:?}",
                self.state
            )))
        }
    }

    fn require_secured(&self) -> Result<()> {
        if self.secured {
            Ok(())
        } else {
            Err(Error::NotSecured)
        }
    }

    fn overlong_reply() -> Error {
        Error::MalformedResponse(format!("reply exceeds {MAX_REPLY_LINES} lines"))
    }

    fn no_connection() -> Error {
        Error::InvalidState("no open connection".into())
    }
}

impl<C: Connector> fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("sender", &self.sender)
            .field("server", &self.config.address())
            .field("state", &self.state)
            .field("secured", &self.secured)
            .field("authenticated", &self.authenticated)
            .finish_non_exhaustive()
    }
}
