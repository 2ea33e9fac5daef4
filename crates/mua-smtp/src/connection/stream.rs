//! Transport streams and the line-oriented channel over them.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

use crate::command::Command;
use crate::error::{Error, Result};

/// Upper bound on a single server line, terminator included.
const MAX_LINE_LENGTH: u64 = 64 * 1024;

/// SMTP transport stream (TCP or TLS).
#[derive(Debug)]
pub enum SmtpStream {
    /// Plain TCP connection.
    Tcp(TcpStream),
    /// TLS-encrypted connection (boxed to reduce enum size).
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for SmtpStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for SmtpStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Buffered, line-oriented channel bound to exactly one stream.
///
/// Reads yield one line with its terminator stripped; writes append CRLF and
/// flush. Every operation runs under the configured I/O deadline.
#[derive(Debug)]
pub struct LineChannel<S> {
    reader: BufReader<S>,
    io_timeout: Duration,
}

impl<S> LineChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a stream.
    pub fn new(stream: S, io_timeout: Duration) -> Self {
        Self {
            reader: BufReader::new(stream),
            io_timeout,
        }
    }

    /// Reads one server line, without its terminator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] on I/O failure, timeout, or end of stream,
    /// and [`Error::MalformedResponse`] if the line exceeds 64 KiB.
    pub async fn read_line(&mut self) -> Result<String> {
        let mut buf = Vec::new();
        let mut limited = (&mut self.reader).take(MAX_LINE_LENGTH);
        let n = deadline(self.io_timeout, limited.read_until(b'\n', &mut buf)).await?;

        if n == 0 {
            return Err(Error::Connection(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "server closed the connection",
            )));
        }

        if !buf.ends_with(b"\n") {
            if n as u64 >= MAX_LINE_LENGTH {
                return Err(Error::MalformedResponse(format!(
                    "line exceeds {MAX_LINE_LENGTH} bytes"
                )));
            }
            return Err(Error::Connection(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "server closed the connection mid-line",
            )));
        }

        buf.pop();
        if buf.ends_with(b"\r") {
            buf.pop();
        }

        let line = String::from_utf8_lossy(&buf).into_owned();
        tracing::debug!("S: {line}");
        Ok(line)
    }

    /// Writes a command and flushes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the write fails or times out.
    pub async fn write_command(&mut self, cmd: &Command) -> Result<()> {
        tracing::debug!(verb = cmd.verb(), "C: {cmd}");
        self.send(&cmd.serialize()).await
    }

    /// Writes a line followed by CRLF; the log shows `<redacted>` instead.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the write fails or times out.
    pub async fn write_secret_line(&mut self, line: &str) -> Result<()> {
        tracing::debug!("C: <redacted>");
        self.send(format!("{line}\r\n").as_bytes()).await
    }

    /// Writes raw bytes (a message body) and flushes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the write fails or times out.
    pub async fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        tracing::debug!("C: <{} bytes of message data>", data.len());
        self.send(data).await
    }

    /// Shuts down the write side of the stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the shutdown fails or times out.
    pub async fn shutdown(&mut self) -> Result<()> {
        deadline(self.io_timeout, self.reader.get_mut().shutdown()).await
    }

    /// Returns the underlying stream, consuming the channel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TlsUpgrade`] if the server sent bytes that have not been
    /// read yet; they would otherwise be trusted across a TLS upgrade.
    pub fn into_inner(self) -> Result<S> {
        let pending = self.reader.buffer().len();
        if pending > 0 {
            return Err(Error::TlsUpgrade {
                code: None,
                message: format!("{pending} unexpected bytes buffered before TLS handshake"),
            });
        }
        Ok(self.reader.into_inner())
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.reader.get_mut();
        deadline(self.io_timeout, async {
            stream.write_all(data).await?;
            stream.flush().await
        })
        .await
    }
}

/// Runs an I/O future under a deadline; expiry becomes `TimedOut`.
pub(crate) async fn deadline<T>(
    limit: Duration,
    fut: impl Future<Output = io::Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(Error::Connection),
        Err(_) => Err(Error::Connection(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("no progress within {limit:?}"),
        ))),
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
    use tokio_test::io::Builder;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_read_line_strips_terminator() {
        let mock = Builder::new().read(b"220 ready.\r\n250 OK\n").build();
        let mut channel = LineChannel::new(mock, TIMEOUT);

        assert_eq!(channel.read_line().await.unwrap(), "220 ready.");
        assert_eq!(channel.read_line().await.unwrap(), "250 OK");
    }

    #[tokio::test]
    async fn test_read_line_across_chunks() {
        let mock = Builder::new().read(b"250-SI").read(b"ZE\r\n").build();
        let mut channel = LineChannel::new(mock, TIMEOUT);

        assert_eq!(channel.read_line().await.unwrap(), "250-SIZE");
    }

    #[tokio::test]
    async fn test_read_line_eof_is_connection_error() {
        let mock = Builder::new().build();
        let mut channel = LineChannel::new(mock, TIMEOUT);

        let err = channel.read_line().await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_read_line_truncated_is_connection_error() {
        let mock = Builder::new().read(b"220 rea").build();
        let mut channel = LineChannel::new(mock, TIMEOUT);

        assert!(matches!(
            channel.read_line().await,
            Err(Error::Connection(e)) if e.kind() == io::ErrorKind::UnexpectedEof
        ));
    }

    #[tokio::test]
    async fn test_read_line_too_long() {
        let long = vec![b'a'; 64 * 1024];
        let mock = Builder::new().read(&long).build();
        let mut channel = LineChannel::new(mock, TIMEOUT);

        assert!(matches!(
            channel.read_line().await,
            Err(Error::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_read_error_is_connection_error() {
        let mock = Builder::new()
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();
        let mut channel = LineChannel::new(mock, TIMEOUT);

        assert!(channel.read_line().await.unwrap_err().is_fatal());
    }

    #[tokio::test]
    async fn test_write_secret_line_appends_crlf() {
        let mock = Builder::new().write(b"aHVudGVyMg==\r\n").build();
        let mut channel = LineChannel::new(mock, TIMEOUT);

        channel.write_secret_line("aHVudGVyMg==").await.unwrap();
    }

    #[tokio::test]
    async fn test_write_command_and_raw() {
        let mock = Builder::new()
            .write(b"DATA\r\n")
            .write(b"hi\r\n.\r\n")
            .build();
        let mut channel = LineChannel::new(mock, TIMEOUT);

        channel.write_command(&Command::Data).await.unwrap();
        channel.write_raw(b"hi\r\n.\r\n").await.unwrap();
    }

    #[tokio::test]
    async fn test_into_inner_refuses_buffered_bytes() {
        let mock = Builder::new()
            .read(b"220 Go ahead\r\n250 injected\r\n")
            .build();
        let mut channel = LineChannel::new(mock, TIMEOUT);

        assert_eq!(channel.read_line().await.unwrap(), "220 Go ahead");
        assert!(matches!(
            channel.into_inner(),
            Err(Error::TlsUpgrade { code: None, .. })
        ));
    }

    #[tokio::test]
    async fn test_into_inner_when_drained() {
        let mock = Builder::new().read(b"220 Go ahead\r\n").build();
        let mut channel = LineChannel::new(mock, TIMEOUT);

        channel.read_line().await.unwrap();
        assert!(channel.into_inner().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_deadline() {
        let mock = Builder::new().wait(Duration::from_secs(120)).build();
        let mut channel = LineChannel::new(mock, Duration::from_secs(1));

        assert!(matches!(
            channel.read_line().await,
            Err(Error::Connection(e)) if e.kind() == io::ErrorKind::TimedOut
        ));
    }
}
