//! Transport collaborators: opening connections and upgrading them to TLS.

use std::future::Future;
use std::sync::Arc;

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};

use super::SmtpStream;
use crate::error::{Error, Result};

/// Opens transport connections and performs in-place TLS upgrades.
///
/// [`Session`](crate::Session) is generic over this trait so the transport can
/// be replaced, for example by scripted streams in tests.
pub trait Connector {
    /// Stream type produced by this connector, before and after the upgrade.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    /// Opens a connection to `host:port`.
    fn connect(&self, host: &str, port: u16) -> impl Future<Output = Result<Self::Stream>> + Send;

    /// Performs a TLS handshake over an existing stream, validating the
    /// certificate against `server_name`.
    fn upgrade(
        &self,
        stream: Self::Stream,
        server_name: &str,
    ) -> impl Future<Output = Result<Self::Stream>> + Send;
}

/// TCP transport with rustls for STARTTLS.
#[derive(Clone)]
pub struct TcpConnector {
    tls: TlsConnector,
}

impl TcpConnector {
    /// Creates a connector trusting the webpki root certificates.
    #[must_use]
    pub fn new() -> Self {
        let root_store = RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };

        let config = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        Self::with_tls_config(Arc::new(config))
    }

    /// Creates a connector with a custom rustls configuration.
    #[must_use]
    pub fn with_tls_config(config: Arc<ClientConfig>) -> Self {
        Self {
            tls: TlsConnector::from(config),
        }
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TcpConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpConnector").finish_non_exhaustive()
    }
}

impl Connector for TcpConnector {
    type Stream = SmtpStream;

    async fn connect(&self, host: &str, port: u16) -> Result<SmtpStream> {
        let stream = TcpStream::connect((host, port)).await?;
        Ok(SmtpStream::Tcp(stream))
    }

    async fn upgrade(&self, stream: SmtpStream, server_name: &str) -> Result<SmtpStream> {
        let tcp_stream = match stream {
            SmtpStream::Tcp(tcp) => tcp,
            SmtpStream::Tls(_) => {
                return Err(Error::TlsUpgrade {
                    code: None,
                    message: "stream is already using TLS".into(),
                });
            }
        };

        let name = ServerName::try_from(server_name.to_string()).map_err(|_| Error::TlsUpgrade {
            code: None,
            message: format!("invalid server name: {server_name}"),
        })?;

        let tls_stream = self
            .tls
            .connect(name, tcp_stream)
            .await
            .map_err(|e| Error::TlsUpgrade {
                code: None,
                message: e.to_string(),
            })?;

        Ok(SmtpStream::Tls(Box::new(tls_stream)))
    }
}
