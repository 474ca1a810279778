//! Default [`Transport`] built on `reqwest`.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::redirect::Policy;
use reqwest::{Body, Client, Method};
use tracing::{debug, instrument, trace};

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS, default_user_agent};
use super::{Transport, TransportError};
use crate::config::ExecutorConfig;
use crate::http::headers::RedactedHeaders;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::payload::{ByteStream, ContentMetadata, Payload};

/// HTTP transport backed by a pooled `reqwest` client.
///
/// Create it once and share it (`Arc<dyn Transport>`) between executors to
/// reuse connections. The client never follows redirects on its own; the
/// executor's [`RedirectPolicy`](crate::redirect::RedirectPolicy) does.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
///
/// use cloudcmd_core::config::ExecutorConfig;
/// use cloudcmd_core::executor::{Command, CommandExecutor};
/// use cloudcmd_core::http::HttpRequest;
/// use cloudcmd_core::transport::ReqwestTransport;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ExecutorConfig::default();
/// let executor = CommandExecutor::new(Arc::new(ReqwestTransport::new()), &config)?;
/// let mut command = Command::new(HttpRequest::get("https://api.example.com/v1/images")?);
/// let response = executor.execute(&mut command).await?;
/// println!("HTTP {}", response.status());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestTransport {
    /// Creates a transport with default timeouts.
    ///
    /// Default configuration:
    /// - Connect timeout: 30 seconds
    /// - Read timeout: 5 minutes (for large bodies)
    /// - Gzip decompression: enabled
    /// - Redirects: never followed by the client
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    pub fn new() -> Self {
        Self::new_with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a transport with explicit timeout values.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the supplied
    /// timeout configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new_with_timeouts(connect_timeout_secs: u64, read_timeout_secs: u64) -> Self {
        let client = build_client(connect_timeout_secs, read_timeout_secs)
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Creates a transport using the timeouts in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidRequest`] if the client cannot be
    /// built (for example when no TLS backend can be initialised).
    pub fn from_config(config: &ExecutorConfig) -> Result<Self, TransportError> {
        build_client(config.connect_timeout_secs, config.read_timeout_secs)
            .map(|client| Self { client })
            .map_err(|e| TransportError::invalid_request("<client>", e.to_string()))
    }

    /// Wraps an existing client.
    ///
    /// The client should be built with `redirect(Policy::none())`; otherwise
    /// redirects are followed below the executor and never reach the
    /// redirect policy.
    #[must_use]
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Returns a reference to the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }

    fn build_request(
        &self,
        request: &HttpRequest,
        body: Option<ByteStream>,
    ) -> Result<reqwest::Request, TransportError> {
        let endpoint = request.endpoint().as_str();
        let mut builder = self.client.request(to_method(request.method()), endpoint);
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(payload) = request.payload() {
            for (name, value) in payload.metadata().to_headers() {
                if request.header(&name).is_none() {
                    builder = builder.header(name, value);
                }
            }
        }
        if let Some(body) = body {
            builder = builder.body(Body::wrap_stream(body));
        }
        builder
            .build()
            .map_err(|e| TransportError::invalid_request(endpoint, e.to_string()))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[instrument(skip(self, request, body), fields(method = %request.method(), endpoint = %request.endpoint()))]
    async fn send(
        &self,
        request: &HttpRequest,
        body: Option<ByteStream>,
    ) -> Result<HttpResponse, TransportError> {
        let endpoint = request.endpoint().as_str();
        let wire_request = self.build_request(request, body)?;
        trace!(
            headers = %RedactedHeaders(&header_pairs(wire_request.headers())),
            ">> request"
        );

        let response = self
            .client
            .execute(wire_request)
            .await
            .map_err(|e| map_reqwest_error(endpoint, e))?;

        let status = response.status().as_u16();
        let headers = header_pairs(response.headers());
        trace!(status, headers = %RedactedHeaders(&headers), "<< response");
        debug!(status, "response received");

        let has_body = request.method() != HttpMethod::Head && !matches!(status, 204 | 304);
        let mut result = HttpResponse::new(status).with_headers(headers);
        if has_body {
            let metadata = ContentMetadata::from_headers(result.headers());
            let stream: ByteStream =
                Box::pin(response.bytes_stream().map(|chunk| chunk.map_err(io::Error::other)));
            result = result.with_payload(Payload::from_stream(stream).with_metadata(metadata));
        }
        Ok(result)
    }
}

fn build_client(connect_timeout_secs: u64, read_timeout_secs: u64) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .timeout(Duration::from_secs(read_timeout_secs))
        .gzip(true)
        .redirect(Policy::none())
        .user_agent(default_user_agent())
        .build()
}

fn to_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Head => Method::HEAD,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Post => Method::POST,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Options => Method::OPTIONS,
    }
}

fn header_pairs(headers: &reqwest::header::HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

fn map_reqwest_error(endpoint: &str, error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::timeout(endpoint)
    } else if error.is_builder() {
        TransportError::invalid_request(endpoint, error.to_string())
    } else if is_tls_error(&error) {
        TransportError::tls(endpoint, error)
    } else {
        TransportError::connection(endpoint, error)
    }
}

/// Checks if a reqwest error is a TLS/certificate error.
fn is_tls_error(error: &reqwest::Error) -> bool {
    // TLS failures surface in the error chain text only
    let mut source: Option<&dyn std::error::Error> = Some(error);
    while let Some(current) = source {
        let text = current.to_string().to_lowercase();
        if text.contains("certificate")
            || text.contains("tls")
            || text.contains("ssl")
            || text.contains("handshake")
        {
            return true;
        }
        source = current.source();
    }
    false
}
