//! HTTP responses returned by the transport.

use std::fmt;

use bytes::Bytes;
use tracing::warn;

use super::headers::{RedactedHeaders, find_header};
use crate::integrity::ContentDigest;
use crate::payload::{ContentMetadata, Payload, PayloadError};

/// A response received from the transport.
///
/// HEAD, 204 and 304 responses carry no payload. `Debug` output redacts
/// credential-bearing headers such as `Set-Cookie`.
pub struct HttpResponse {
    status: u16,
    headers: Vec<(String, String)>,
    payload: Option<Payload>,
    request_digest: Option<ContentDigest>,
}

impl HttpResponse {
    /// Creates a bodiless response.
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            payload: None,
            request_digest: None,
        }
    }

    /// Appends a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replaces all headers.
    #[must_use]
    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    /// Attaches a body.
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<Payload>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// The status code.
    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// `2xx`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// `3xx`.
    #[must_use]
    pub fn is_redirection(&self) -> bool {
        (300..400).contains(&self.status)
    }

    /// Headers in received order.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First value of a header, matched case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// The body, if any.
    #[must_use]
    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    /// Detaches the body, leaving the response bodiless.
    pub fn take_payload(&mut self) -> Option<Payload> {
        self.payload.take()
    }

    /// Consumes the response, returning its body.
    #[must_use]
    pub fn into_payload(self) -> Option<Payload> {
        self.payload
    }

    /// The body when it is held in memory (always the case for error
    /// responses after the executor buffered them).
    #[must_use]
    pub fn body_bytes(&self) -> Option<&Bytes> {
        self.payload.as_ref().and_then(Payload::as_bytes)
    }

    /// Reads the whole body into memory.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError`] if the body cannot be read.
    pub async fn bytes(self) -> Result<Bytes, PayloadError> {
        match self.payload {
            Some(payload) => payload.read_to_bytes(usize::MAX).await,
            None => Ok(Bytes::new()),
        }
    }

    /// Digest of the request bytes the transport consumed for the attempt
    /// that produced this response.
    #[must_use]
    pub fn request_digest(&self) -> Option<&ContentDigest> {
        self.request_digest.as_ref()
    }

    pub(crate) fn set_request_digest(&mut self, digest: Option<ContentDigest>) {
        self.request_digest = digest;
    }

    /// Replaces a streamed body with at most `limit` buffered bytes.
    ///
    /// A body that fails to read is dropped rather than failing the
    /// response.
    pub(crate) async fn buffer_payload(&mut self, limit: usize) {
        let Some(payload) = self.payload.take() else {
            return;
        };
        if payload.as_bytes().is_some() {
            self.payload = Some(payload);
            return;
        }
        match payload.read_to_bytes(limit).await {
            Ok(bytes) => {
                let metadata = ContentMetadata {
                    length: None,
                    ..payload.metadata().clone()
                };
                self.payload = Some(Payload::from_bytes(bytes).with_metadata(metadata));
            }
            Err(e) => {
                warn!(status = self.status, error = %e, "failed to buffer response body");
            }
        }
        payload.release();
    }

    /// Releases the body, if any.
    pub(crate) fn release_payload(&self) {
        if let Some(payload) = &self.payload {
            payload.release();
        }
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("headers", &format_args!("{}", RedactedHeaders(&self.headers)))
            .field("payload", &self.payload)
            .field("request_digest", &self.request_digest)
            .finish()
    }
}
