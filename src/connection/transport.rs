//! Transport establishment: plain TCP or TLS over TCP.
//!
//! The connection only ever sees a [`BoxedStream`]. [`Connector`] is the seam
//! that produces one; [`TcpConnector`] is the production implementation.

use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha512};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::client::WebPkiServerVerifier;
use tokio_rustls::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use tokio_rustls::rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tracing::{debug, info, warn};

use crate::error::{IrcResult, IrcStatus};

/// Any duplex byte stream a connection can run over.
pub trait IrcStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> IrcStream for T {}

pub type BoxedStream = Box<dyn IrcStream>;

/// Where and how to connect, as prepared by `IrcConnection::setup`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endpoint {
    /// Name used for TLS server name indication and logging.
    pub host: String,
    /// Resolved `ip:port` connection string.
    pub address: String,
    pub port: u16,
    pub tls: bool,
    pub allow_invalid_cert: bool,
}

/// An opened transport.
pub struct Transport {
    pub stream: BoxedStream,
    /// Peer certificate fingerprint, TLS only.
    pub fingerprint: Option<String>,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

/// Opens transports for connections.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &Endpoint) -> IrcResult<Transport>;
}

/// TCP, optionally wrapped in TLS.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, endpoint: &Endpoint) -> IrcResult<Transport> {
        let tcp = TcpStream::connect(&endpoint.address).await?;
        tcp.set_nodelay(true)?;

        if !endpoint.tls {
            return Ok(Transport {
                stream: Box::new(tcp),
                fingerprint: None,
            });
        }

        let tls = upgrade_to_tls(tcp, &endpoint.host, endpoint.allow_invalid_cert).await?;
        let fingerprint = {
            let (_, conn) = tls.get_ref();
            conn.peer_certificates()
                .and_then(|certs| certs.first())
                .map(|cert| certificate_fingerprint(cert.as_ref()))
        };
        if let Some(fp) = &fingerprint {
            info!(host = %endpoint.host, fingerprint = %fp, "TLS session established");
        }

        Ok(Transport {
            stream: Box::new(tls),
            fingerprint,
        })
    }
}

/// Colon-separated upper-case SHA-512 digest of a DER certificate.
pub fn certificate_fingerprint(der: &[u8]) -> String {
    Sha512::digest(der)
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

fn native_roots() -> RootCertStore {
    let mut roots = RootCertStore::empty();
    let certs = rustls_native_certs::load_native_certs();
    for cert in certs.certs {
        if let Err(e) = roots.add(cert) {
            debug!("Failed to add root cert: {}", e);
        }
    }
    for e in &certs.errors {
        warn!("Error loading native certs: {}", e);
    }
    roots
}

async fn upgrade_to_tls(
    tcp: TcpStream,
    host: &str,
    allow_invalid_cert: bool,
) -> IrcResult<tokio_rustls::client::TlsStream<TcpStream>> {
    let roots = native_roots();

    let config = if allow_invalid_cert {
        let builder = ClientConfig::builder();
        let provider = Arc::clone(builder.crypto_provider());
        let strict = WebPkiServerVerifier::builder_with_provider(Arc::new(roots), Arc::clone(&provider))
            .build()
            .ok();
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(LenientVerifier { strict, provider }))
            .with_no_client_auth()
    } else {
        ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth()
    };

    let connector = TlsConnector::from(Arc::new(config));
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|e| IrcStatus::Tls(format!("invalid server name {host}: {e}")))?;

    connector
        .connect(server_name, tcp)
        .await
        .map_err(|e| IrcStatus::Tls(e.to_string()))
}

/// Runs full chain and validity checks, but only warns when they fail.
#[derive(Debug)]
struct LenientVerifier {
    strict: Option<Arc<WebPkiServerVerifier>>,
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for LenientVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, tokio_rustls::rustls::Error> {
        let outcome = match &self.strict {
            Some(strict) => strict
                .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
                .map_err(|e| e.to_string()),
            None => Err("no trust anchors available".to_string()),
        };
        if let Err(reason) = outcome {
            warn!(
                server = ?server_name,
                fingerprint = %certificate_fingerprint(end_entity.as_ref()),
                reason = %reason,
                "accepting invalid certificate"
            );
        }
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
