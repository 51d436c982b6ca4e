//! Gateway - WebSocket listener that accepts client sessions.
//!
//! The Gateway binds one socket, optionally wraps accepted streams in TLS,
//! performs the WebSocket upgrade (path and CORS origin checked on the
//! handshake) and spawns a [`Connection`] task per client.

use crate::config::{ListenConfig, TlsConfig};
use crate::handlers::Registry;
use crate::network::{Connection, WsTransport};
use crate::state::Matrix;
use rustls_pemfile::{certs, pkcs8_private_keys};
use std::io::{BufReader, Cursor};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tracing::{error, info, instrument, warn};

/// The Gateway accepts incoming connections and spawns session tasks.
pub struct Gateway {
    listener: TcpListener,
    tls: Option<TlsAcceptor>,
    path: Arc<str>,
    allow_origins: Arc<[String]>,
    matrix: Arc<Matrix>,
    registry: Arc<Registry>,
}

impl Gateway {
    /// Bind the gateway to the configured address.
    pub async fn bind(
        listen: &ListenConfig,
        tls: Option<&TlsConfig>,
        matrix: Arc<Matrix>,
    ) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(listen.address).await?;
        let tls = tls.map(Self::load_tls).transpose()?;
        info!(address = %listen.address, path = %listen.path, tls = tls.is_some(), "Gateway bound");

        Ok(Self {
            listener,
            tls,
            path: Arc::from(listen.path.as_str()),
            allow_origins: Arc::from(listen.allow_origins.clone()),
            matrix,
            registry: Arc::new(Registry::new()),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Load TLS certificates and create TlsAcceptor.
    fn load_tls(config: &TlsConfig) -> anyhow::Result<TlsAcceptor> {
        let cert_file = std::fs::read(&config.cert_path)?;
        let cert_reader = &mut BufReader::new(Cursor::new(cert_file));
        let certs: Vec<CertificateDer> = certs(cert_reader).collect::<Result<Vec<_>, _>>()?;

        if certs.is_empty() {
            anyhow::bail!("No certificates found in {}", config.cert_path);
        }

        let key_file = std::fs::read(&config.key_path)?;
        let key_reader = &mut BufReader::new(Cursor::new(key_file));
        let mut keys: Vec<PrivateKeyDer> = pkcs8_private_keys(key_reader)
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(PrivateKeyDer::from)
            .collect();

        if keys.is_empty() {
            anyhow::bail!("No private keys found in {}", config.key_path);
        }

        let key = keys.remove(0);

        let tls_config = ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(certs, key)?;

        Ok(TlsAcceptor::from(Arc::new(tls_config)))
    }

    /// Run the gateway, accepting connections forever.
    #[instrument(skip(self), name = "gateway")]
    pub async fn run(self) -> anyhow::Result<()> {
        loop {
            let (stream, addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                    continue;
                }
            };
            info!(%addr, "Connection accepted");

            let path = Arc::clone(&self.path);
            let origins = Arc::clone(&self.allow_origins);
            let matrix = Arc::clone(&self.matrix);
            let registry = Arc::clone(&self.registry);

            match self.tls.clone() {
                Some(acceptor) => {
                    tokio::spawn(async move {
                        match acceptor.accept(stream).await {
                            Ok(tls_stream) => {
                                upgrade(tls_stream, addr, path, origins, matrix, registry).await
                            }
                            Err(e) => warn!(%addr, error = %e, "TLS handshake failed"),
                        }
                    });
                }
                None => {
                    tokio::spawn(upgrade(stream, addr, path, origins, matrix, registry));
                }
            }
        }
    }
}

/// Whether a handshake may proceed: right path, allowed origin.
fn check_handshake(
    req: &Request,
    path: &str,
    allow_origins: &[String],
) -> Result<(), (http::StatusCode, &'static str)> {
    if req.uri().path() != path {
        return Err((http::StatusCode::NOT_FOUND, "unknown path"));
    }
    if allow_origins.is_empty() {
        return Ok(());
    }
    let origin = req.headers().get("Origin").and_then(|o| o.to_str().ok());
    match origin {
        Some(origin) if allow_origins.iter().any(|a| a == origin || a == "*") => Ok(()),
        _ => Err((http::StatusCode::FORBIDDEN, "CORS origin not allowed")),
    }
}

fn reject(status: http::StatusCode, reason: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(reason.to_string()));
    *response.status_mut() = status;
    response
}

async fn upgrade<S>(
    stream: S,
    addr: SocketAddr,
    path: Arc<str>,
    allow_origins: Arc<[String]>,
    matrix: Arc<Matrix>,
    registry: Arc<Registry>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let callback = |req: &Request, response: Response| match check_handshake(req, &path, &allow_origins) {
        Ok(()) => Ok(response),
        Err((status, reason)) => {
            warn!(%addr, uri = %req.uri(), reason, "WebSocket handshake rejected");
            Err(reject(status, reason))
        }
    };

    let ws_stream = match accept_hdr_async(stream, callback).await {
        Ok(ws_stream) => ws_stream,
        Err(e) => {
            warn!(%addr, error = %e, "WebSocket handshake failed");
            return;
        }
    };

    let connection = Connection::new(WsTransport::new(ws_stream), addr, matrix, registry);
    if let Err(e) = connection.run().await {
        info!(%addr, error = %e, "Connection ended with error");
    }
    info!(%addr, "Connection closed");
}
