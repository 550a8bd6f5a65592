//! # Docker Engine Transport
//!
//! Moves raw HTTP requests to the Docker daemon.
//!
//! - TCP hosts use reqwest with rustls (optionally with a client certificate)
//! - the local unix socket uses a one-shot hyper HTTP/1 connection per request

use crate::config::{DockerEndpoint, TlsSettings};
use crate::provider::ProviderError;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// HTTP methods used by the Docker Engine API calls we make
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verb {
    Get,
    Post,
    Delete,
}

/// Raw response: status code and body bytes
#[derive(Debug)]
pub(crate) struct ApiResponse {
    pub status: u16,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Transport {
    Http {
        client: reqwest::Client,
        base_url: String,
    },
    Unix {
        socket: PathBuf,
        timeout: Duration,
    },
}

impl Transport {
    pub fn new(endpoint: DockerEndpoint, timeout: Duration) -> Result<Self, ProviderError> {
        match endpoint {
            DockerEndpoint::Unix(socket) => Ok(Transport::Unix { socket, timeout }),
            DockerEndpoint::Http { base_url, tls } => {
                let mut builder = reqwest::Client::builder().timeout(timeout).use_rustls_tls();
                if let Some(tls) = tls {
                    builder = configure_tls(builder, &tls, &base_url)?;
                }
                let client = builder
                    .build()
                    .map_err(|e| ProviderError::Config(format!("failed to create HTTP client: {e}")))?;
                Ok(Transport::Http { client, base_url })
            }
        }
    }

    /// Where requests go, for log and error messages
    pub fn describe(&self) -> String {
        match self {
            Transport::Http { base_url, .. } => base_url.clone(),
            Transport::Unix { socket, .. } => format!("unix://{}", socket.display()),
        }
    }

    /// Send a request; `Err` carries the transport failure message
    pub async fn send(
        &self,
        verb: Verb,
        path_and_query: &str,
        json_body: Option<Vec<u8>>,
    ) -> Result<ApiResponse, String> {
        match self {
            Transport::Http { client, base_url } => {
                let url = format!("{base_url}{path_and_query}");
                let request = match verb {
                    Verb::Get => client.get(&url),
                    Verb::Post => client.post(&url),
                    Verb::Delete => client.delete(&url),
                };
                let request = match json_body {
                    Some(body) => request
                        .header(reqwest::header::CONTENT_TYPE, "application/json")
                        .body(body),
                    None => request,
                };
                let response = request.send().await.map_err(|e| e.to_string())?;
                let status = response.status().as_u16();
                let body = response.bytes().await.map_err(|e| e.to_string())?;
                Ok(ApiResponse { status, body })
            }
            Transport::Unix { socket, timeout } => {
                tokio::time::timeout(*timeout, send_unix(socket, verb, path_and_query, json_body))
                    .await
                    .map_err(|_elapsed| format!("request timed out after {}s", timeout.as_secs()))?
            }
        }
    }
}

fn configure_tls(
    mut builder: reqwest::ClientBuilder,
    tls: &TlsSettings,
    base_url: &str,
) -> Result<reqwest::ClientBuilder, ProviderError> {
    if let Some(dir) = &tls.cert_path {
        let ca = dir.join("ca.pem");
        if ca.is_file() {
            let pem = read_pem(&ca)?;
            let certificate = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                ProviderError::Config(format!("invalid CA certificate {}: {e}", ca.display()))
            })?;
            builder = builder.add_root_certificate(certificate);
        }

        let cert = dir.join("cert.pem");
        let key = dir.join("key.pem");
        if cert.is_file() && key.is_file() {
            let mut pem = read_pem(&cert)?;
            pem.extend(read_pem(&key)?);
            let identity = reqwest::Identity::from_pem(&pem).map_err(|e| {
                ProviderError::Config(format!(
                    "invalid client certificate in {}: {e}",
                    dir.display()
                ))
            })?;
            builder = builder.identity(identity);
        }
    }

    if !tls.verify {
        warn!(
            "TLS certificate verification is disabled for the Docker daemon at {}; set DOCKER_TLS_VERIFY=1 to enable it",
            base_url
        );
        builder = builder.danger_accept_invalid_certs(true);
    }

    Ok(builder)
}

fn read_pem(path: &Path) -> Result<Vec<u8>, ProviderError> {
    std::fs::read(path)
        .map_err(|e| ProviderError::Config(format!("failed to read {}: {e}", path.display())))
}

#[cfg(unix)]
async fn send_unix(
    socket: &Path,
    verb: Verb,
    path_and_query: &str,
    json_body: Option<Vec<u8>>,
) -> Result<ApiResponse, String> {
    use http_body_util::{BodyExt, Full};
    use hyper_util::rt::TokioIo;

    let stream = tokio::net::UnixStream::connect(socket)
        .await
        .map_err(|e| e.to_string())?;
    let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .map_err(|e| e.to_string())?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::debug!("Docker socket connection closed with error: {}", e);
        }
    });

    let method = match verb {
        Verb::Get => hyper::Method::GET,
        Verb::Post => hyper::Method::POST,
        Verb::Delete => hyper::Method::DELETE,
    };
    let mut builder = hyper::Request::builder()
        .method(method)
        .uri(path_and_query)
        .header(hyper::header::HOST, "docker");
    if json_body.is_some() {
        builder = builder.header(hyper::header::CONTENT_TYPE, "application/json");
    }
    let request = builder
        .body(Full::new(Bytes::from(json_body.unwrap_or_default())))
        .map_err(|e| e.to_string())?;

    let response = sender
        .send_request(request)
        .await
        .map_err(|e| e.to_string())?;
    let status = response.status().as_u16();
    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|e| e.to_string())?
        .to_bytes();

    Ok(ApiResponse { status, body })
}

#[cfg(not(unix))]
async fn send_unix(
    socket: &Path,
    _verb: Verb,
    _path_and_query: &str,
    _json_body: Option<Vec<u8>>,
) -> Result<ApiResponse, String> {
    Err(format!(
        "unix sockets are not supported on this platform ({})",
        socket.display()
    ))
}
