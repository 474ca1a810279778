//! Immutable HTTP request values and their builder.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use url::Url;

use super::HttpMethod;
use super::headers::{RedactedHeaders, find_header};
use crate::payload::Payload;

/// The endpoint string could not be parsed as an absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid endpoint URL: {endpoint}")]
pub struct InvalidEndpoint {
    /// The rejected endpoint.
    pub endpoint: String,
}

/// A fully built HTTP request.
///
/// Requests are values: every `with_*` method returns a new request and
/// leaves `self` untouched. The payload is shared (`Arc`) between a request
/// and the requests derived from it, so rebuilding never copies the body.
///
/// The request also records the ids of the filters already applied to it,
/// which is how [`FilterChain`](crate::filter::FilterChain) avoids
/// transforming a request twice.
///
/// `Debug` output redacts credential-bearing headers.
#[derive(Clone)]
pub struct HttpRequest {
    method: HttpMethod,
    endpoint: Url,
    headers: Vec<(String, String)>,
    payload: Option<Arc<Payload>>,
    applied_filters: Vec<String>,
}

impl HttpRequest {
    /// Starts a request builder.
    #[must_use]
    pub fn builder(method: HttpMethod, endpoint: impl Into<String>) -> HttpRequestBuilder {
        HttpRequestBuilder::new(method, endpoint)
    }

    /// Convenience for a bodiless GET.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidEndpoint`] if `endpoint` is not an absolute URL.
    pub fn get(endpoint: impl Into<String>) -> Result<Self, InvalidEndpoint> {
        Self::builder(HttpMethod::Get, endpoint).build()
    }

    /// The request method.
    #[must_use]
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// The target URL.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Headers in insertion order; names may repeat.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First value of a header, matched case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// All values of a header, in order.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(candidate, _)| candidate.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The request body, if any.
    #[must_use]
    pub fn payload(&self) -> Option<&Arc<Payload>> {
        self.payload.as_ref()
    }

    /// Ids of the filters already applied, in application order.
    #[must_use]
    pub fn applied_filters(&self) -> &[String] {
        &self.applied_filters
    }

    /// Returns whether the filter with `id` has already been applied.
    #[must_use]
    pub fn has_filter(&self, id: &str) -> bool {
        self.applied_filters.iter().any(|applied| applied == id)
    }

    /// Returns a builder seeded with this request.
    #[must_use]
    pub fn to_builder(&self) -> HttpRequestBuilder {
        HttpRequestBuilder {
            method: self.method,
            endpoint: EndpointInput::Parsed(self.endpoint.clone()),
            headers: self.headers.clone(),
            payload: self.payload.clone(),
            applied_filters: self.applied_filters.clone(),
        }
    }

    /// Returns a copy targeting another endpoint.
    #[must_use]
    pub fn with_endpoint(&self, endpoint: Url) -> Self {
        Self {
            endpoint,
            ..self.clone()
        }
    }

    /// Returns a copy with another method.
    #[must_use]
    pub fn with_method(&self, method: HttpMethod) -> Self {
        Self {
            method,
            ..self.clone()
        }
    }

    /// Returns a copy with an additional header value.
    #[must_use]
    pub fn with_header(&self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.headers.push((name.into(), value.into()));
        next
    }

    /// Returns a copy where `name` has exactly one value.
    #[must_use]
    pub fn with_replaced_header(&self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let mut next = self.without_header(&name);
        next.headers.push((name, value.into()));
        next
    }

    /// Returns a copy without any value for `name`.
    #[must_use]
    pub fn without_header(&self, name: &str) -> Self {
        let mut next = self.clone();
        next.headers
            .retain(|(candidate, _)| !candidate.eq_ignore_ascii_case(name));
        next
    }

    /// Returns a copy with another payload (or none).
    #[must_use]
    pub fn with_payload(&self, payload: Option<Arc<Payload>>) -> Self {
        Self {
            payload,
            ..self.clone()
        }
    }

    pub(crate) fn with_applied_filter(mut self, id: &str) -> Self {
        self.applied_filters.push(id.to_string());
        self
    }
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("endpoint", &self.endpoint.as_str())
            .field("headers", &format_args!("{}", RedactedHeaders(&self.headers)))
            .field("payload", &self.payload)
            .field("applied_filters", &self.applied_filters)
            .finish()
    }
}

#[derive(Debug, Clone)]
enum EndpointInput {
    Raw(String),
    Parsed(Url),
}

/// Builder for [`HttpRequest`].
///
/// Provider code assembles a request value here and hands it to the
/// executor inside a [`Command`](crate::executor::Command).
#[derive(Debug, Clone)]
pub struct HttpRequestBuilder {
    method: HttpMethod,
    endpoint: EndpointInput,
    headers: Vec<(String, String)>,
    payload: Option<Arc<Payload>>,
    applied_filters: Vec<String>,
}

impl HttpRequestBuilder {
    /// Creates a builder for `method` against `endpoint`.
    #[must_use]
    pub fn new(method: HttpMethod, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: EndpointInput::Raw(endpoint.into()),
            headers: Vec::new(),
            payload: None,
            applied_filters: Vec::new(),
        }
    }

    /// Sets the method.
    #[must_use]
    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Sets the endpoint from an already-parsed URL.
    #[must_use]
    pub fn endpoint_url(mut self, endpoint: Url) -> Self {
        self.endpoint = EndpointInput::Parsed(endpoint);
        self
    }

    /// Appends a header value.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the payload.
    #[must_use]
    pub fn payload(mut self, payload: impl Into<Payload>) -> Self {
        self.payload = Some(Arc::new(payload.into()));
        self
    }

    /// Sets a payload that is already shared.
    #[must_use]
    pub fn shared_payload(mut self, payload: Arc<Payload>) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Builds the request.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidEndpoint`] if the endpoint is not an absolute
    /// `http`/`https` URL.
    pub fn build(self) -> Result<HttpRequest, InvalidEndpoint> {
        let endpoint = match self.endpoint {
            EndpointInput::Parsed(url) => url,
            EndpointInput::Raw(raw) => {
                Url::parse(&raw).map_err(|_| InvalidEndpoint { endpoint: raw.clone() })?
            }
        };
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(InvalidEndpoint {
                endpoint: endpoint.to_string(),
            });
        }
        Ok(HttpRequest {
            method: self.method,
            endpoint,
            headers: self.headers,
            payload: self.payload,
            applied_filters: self.applied_filters,
        })
    }
}
