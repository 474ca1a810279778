//! The wire: sending one request and receiving one response.
//!
//! A [`Transport`] performs exactly one physical exchange. It never retries,
//! never follows redirects and never interprets status codes; those are the
//! executor's job. Connection pooling and TLS are the implementation's
//! concern. [`ReqwestTransport`] is the default implementation.

mod client;
mod constants;

use std::error::Error as StdError;
use std::fmt::Debug;

use async_trait::async_trait;
use thiserror::Error;

use crate::http::{HttpRequest, HttpResponse};
use crate::payload::ByteStream;

pub use self::client::ReqwestTransport;
pub use self::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};

/// Socket-level HTTP send/receive.
///
/// `body` is the opened request payload; the transport must consume it from
/// the stream rather than reopening the request's payload. The returned
/// future resolves once response headers have arrived; the response body
/// streams afterwards. Dropping the future aborts the exchange.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Sends `request` with `body` and waits for the response headers.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if no response was received.
    async fn send(
        &self,
        request: &HttpRequest,
        body: Option<ByteStream>,
    ) -> Result<HttpResponse, TransportError>;
}

/// Failures before a response was received.
///
/// Messages carry the endpoint but never header values.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No response headers within the configured timeout.
    #[error("timeout sending request to {endpoint}")]
    Timeout {
        /// The target endpoint.
        endpoint: String,
    },

    /// Connection refused, reset, or closed before headers.
    #[error("connection error sending request to {endpoint}: {source}")]
    Connection {
        /// The target endpoint.
        endpoint: String,
        /// The underlying error.
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// TLS handshake or certificate failure.
    #[error("TLS error sending request to {endpoint}: {source}")]
    Tls {
        /// The target endpoint.
        endpoint: String,
        /// The underlying error.
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// The request could not be expressed on the wire.
    #[error("invalid request to {endpoint}: {reason}")]
    InvalidRequest {
        /// The target endpoint.
        endpoint: String,
        /// What was wrong with the request.
        reason: String,
    },
}

impl TransportError {
    /// Creates a timeout error.
    pub fn timeout(endpoint: impl Into<String>) -> Self {
        Self::Timeout {
            endpoint: endpoint.into(),
        }
    }

    /// Creates a connection error.
    pub fn connection(
        endpoint: impl Into<String>,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self::Connection {
            endpoint: endpoint.into(),
            source: source.into(),
        }
    }

    /// Creates a TLS error.
    pub fn tls(
        endpoint: impl Into<String>,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self::Tls {
            endpoint: endpoint.into(),
            source: source.into(),
        }
    }

    /// Creates an invalid-request error.
    pub fn invalid_request(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// The endpoint the failed request targeted.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        match self {
            Self::Timeout { endpoint }
            | Self::Connection { endpoint, .. }
            | Self::Tls { endpoint, .. }
            | Self::InvalidRequest { endpoint, .. } => endpoint,
        }
    }

    /// Returns `true` for failures a resend may fix.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        crate::retry::classify_transport_error(self).is_retryable()
    }
}
