//! One-shot WebSocket probe: handshake, optionally send the body, read a
//! single message.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use futures::{SinkExt, StreamExt};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, aws_lc_rs};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HOST, HeaderName, HeaderValue};
use tokio_tungstenite::{Connector, client_async_tls_with_config};
use tracing::{debug, warn};
use url::Url;

use super::extract::{extract_headers, trim_body};
use super::{BODY_READ_TIMEOUT, HANDSHAKE_TIMEOUT, HttpRequest};
use crate::error::CheckerError;
use crate::types::{HttpResponse, Metric};

/// Headers the handshake sets itself.
fn is_handshake_header(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    name == "upgrade" || name == "connection" || name.starts_with("sec-websocket-")
}

fn invalid_header(name: &str, err: impl ToString) -> CheckerError {
    CheckerError::InvalidHeader {
        name: name.to_string(),
        reason: err.to_string(),
    }
}

/// Map an http(s) URL onto its ws(s) equivalent. ws(s) URLs pass through.
fn websocket_url(raw: &str) -> Result<Url, CheckerError> {
    let mut url = Url::parse(raw)?;
    let scheme = match url.scheme() {
        "http" => Some("ws"),
        "https" => Some("wss"),
        _ => None,
    };
    if let Some(scheme) = scheme {
        url.set_scheme(scheme)
            .map_err(|()| CheckerError::InvalidTarget(format!("cannot use {raw} as a websocket url")))?;
    }
    Ok(url)
}

/// Where to open the TCP connection, and the URL the handshake (and TLS
/// server name) should present. With a host override the socket still
/// goes to the address in the URL.
fn dial_target(request: &HttpRequest) -> Result<(String, u16, Url), CheckerError> {
    let mut url = websocket_url(&request.url)?;
    let host = url
        .host_str()
        .map(|h| h.trim_matches(['[', ']']).to_string())
        .ok_or(CheckerError::Url(url::ParseError::EmptyHost))?;
    let port = url
        .port_or_known_default()
        .ok_or(CheckerError::Url(url::ParseError::InvalidPort))?;

    if !request.host.is_empty() && host.parse::<IpAddr>().is_ok() {
        url.set_host(Some(request.host.as_str()))?;
    }
    Ok((host, port, url))
}

fn provider() -> Arc<CryptoProvider> {
    Arc::new(aws_lc_rs::default_provider())
}

/// rustls configuration for wss handshakes. Skipping verification accepts
/// any certificate, otherwise the platform roots are trusted.
fn tls_config(insecure_skip_verify: bool) -> Result<ClientConfig, CheckerError> {
    let provider = provider();
    let builder = ClientConfig::builder_with_provider(provider.clone()).with_safe_default_protocol_versions()?;

    let config = if insecure_skip_verify {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate(provider)))
            .with_no_client_auth()
    } else {
        let native = rustls_native_certs::load_native_certs();
        for err in &native.errors {
            warn!(error = %err, "could not load a platform root certificate");
        }
        let mut roots = RootCertStore::empty();
        roots.add_parsable_certificates(native.certs);
        builder.with_root_certificates(roots).with_no_client_auth()
    };
    Ok(config)
}

#[derive(Debug)]
struct AcceptAnyCertificate(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _: &CertificateDer<'_>,
        _: &[CertificateDer<'_>],
        _: &ServerName<'_>,
        _: &[u8],
        _: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

pub(super) async fn exchange(request: &HttpRequest) -> Result<HttpResponse, CheckerError> {
    let (address, port, url) = dial_target(request)?;
    let connector = if url.scheme() == "wss" {
        Some(Connector::Rustls(Arc::new(tls_config(request.insecure_skip_verify)?)))
    } else {
        None
    };

    let mut handshake = url.as_str().into_client_request()?;
    for header in request.headers.iter().filter(|h| !is_handshake_header(&h.name)) {
        let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(|e| invalid_header(&header.name, e))?;
        for value in &header.values {
            let value = HeaderValue::from_str(value).map_err(|e| invalid_header(&header.name, e))?;
            handshake.headers_mut().append(name.clone(), value);
        }
    }
    if !request.host.is_empty() {
        let host = HeaderValue::from_str(&request.host).map_err(|e| invalid_header("host", e))?;
        handshake.headers_mut().insert(HOST, host);
    }

    debug!(url = %url, address = %address, "opening websocket");
    let started = Instant::now();
    let connect = async {
        let socket = TcpStream::connect((address.as_str(), port)).await?;
        Ok::<_, CheckerError>(client_async_tls_with_config(handshake, socket, None, connector).await?)
    };
    let (mut stream, handshake_response) = timeout(HANDSHAKE_TIMEOUT, connect)
        .await
        .map_err(|_| CheckerError::Timeout("websocket handshake"))??;

    if !request.body.is_empty() {
        stream.send(Message::text(request.body.clone())).await?;
    }

    let body = match timeout(BODY_READ_TIMEOUT, stream.next()).await {
        Ok(Some(Ok(message))) => trim_body(&message.into_data()),
        Ok(Some(Err(err))) => return Err(err.into()),
        Ok(None) => String::new(),
        Err(_) => return Err(CheckerError::Timeout("websocket message")),
    };
    let elapsed = started.elapsed();

    if let Err(err) = stream.close(None).await {
        debug!(error = %err, "error closing websocket");
    }

    Ok(HttpResponse {
        code: handshake_response.status().as_u16(),
        body,
        headers: extract_headers(
            handshake_response
                .headers()
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_bytes())),
        ),
        metrics: vec![Metric::latency(elapsed)],
    })
}
