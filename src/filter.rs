//! Request filters applied before every physical send.
//!
//! A [`RequestFilter`] transforms a request into a new request (signing,
//! enveloping, adding headers). Filters may read outside state such as the
//! clock or credentials but never mutate the payload's underlying resource;
//! they can only wrap or replace the payload.
//!
//! The [`FilterChain`] applies filters in registration order and records each
//! filter's id on the request. A filter whose id is already recorded is
//! skipped, so a request that was filtered once is never transformed twice.
//! Filter failures are fatal and never retried.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use thiserror::Error;
use tracing::{debug, trace};

use crate::http::HttpRequest;

/// Errors raised by request filters.
#[derive(Debug, Error)]
pub enum FilterError {
    /// The filter has no credentials to apply.
    #[error("filter {filter} is missing credentials")]
    MissingCredentials {
        /// Id of the failing filter.
        filter: String,
    },

    /// The filter refused to process the request.
    #[error("filter {filter} rejected request to {endpoint}: {reason}")]
    Rejected {
        /// Id of the failing filter.
        filter: String,
        /// Endpoint of the rejected request.
        endpoint: String,
        /// Why the request was rejected.
        reason: String,
    },

    /// The filter failed with an underlying error.
    #[error("filter {filter} failed: {source}")]
    Failed {
        /// Id of the failing filter.
        filter: String,
        /// The underlying error.
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl FilterError {
    /// Creates a missing-credentials error.
    pub fn missing_credentials(filter: impl Into<String>) -> Self {
        Self::MissingCredentials {
            filter: filter.into(),
        }
    }

    /// Creates a rejection error.
    pub fn rejected(
        filter: impl Into<String>,
        request: &HttpRequest,
        reason: impl Into<String>,
    ) -> Self {
        Self::Rejected {
            filter: filter.into(),
            endpoint: request.endpoint().to_string(),
            reason: reason.into(),
        }
    }

    /// Wraps an underlying error.
    pub fn failed(
        filter: impl Into<String>,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self::Failed {
            filter: filter.into(),
            source: source.into(),
        }
    }
}

/// A pure request transform.
pub trait RequestFilter: Send + Sync {
    /// Stable identifier recorded on filtered requests.
    fn id(&self) -> &str;

    /// Transforms the request.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] if the request cannot be processed.
    fn filter(&self, request: HttpRequest) -> Result<HttpRequest, FilterError>;
}

/// Ordered list of request filters.
#[derive(Clone, Default)]
pub struct FilterChain {
    filters: Vec<Arc<dyn RequestFilter>>,
}

impl FilterChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a filter.
    #[must_use]
    pub fn with(mut self, filter: impl RequestFilter + 'static) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    /// Appends a shared filter.
    pub fn push(&mut self, filter: Arc<dyn RequestFilter>) {
        self.filters.push(filter);
    }

    /// Number of registered filters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Returns `true` if no filters are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Ids of the registered filters, in order.
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.filters.iter().map(|filter| filter.id()).collect()
    }

    /// Applies every filter not yet applied to `request`.
    ///
    /// # Errors
    ///
    /// Returns the first [`FilterError`]; later filters are not run.
    pub fn apply(&self, request: HttpRequest) -> Result<HttpRequest, FilterError> {
        let mut request = request;
        for filter in &self.filters {
            let id = filter.id();
            if request.has_filter(id) {
                trace!(filter = id, "filter already applied, skipping");
                continue;
            }
            request = filter.filter(request)?.with_applied_filter(id);
        }
        debug!(
            endpoint = %request.endpoint(),
            applied = ?request.applied_filters(),
            "request filtered"
        );
        Ok(request)
    }
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterChain")
            .field("filters", &self.ids())
            .finish()
    }
}

/// Adapts a closure into a [`RequestFilter`].
pub struct FnFilter<F> {
    id: String,
    f: F,
}

/// Creates a filter from a closure.
pub fn filter_fn<F>(id: impl Into<String>, f: F) -> FnFilter<F>
where
    F: Fn(HttpRequest) -> Result<HttpRequest, FilterError> + Send + Sync,
{
    FnFilter { id: id.into(), f }
}

impl<F> RequestFilter for FnFilter<F>
where
    F: Fn(HttpRequest) -> Result<HttpRequest, FilterError> + Send + Sync,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn filter(&self, request: HttpRequest) -> Result<HttpRequest, FilterError> {
        (self.f)(request)
    }
}

/// Adds fixed headers, replacing existing values of the same names.
#[derive(Debug, Clone)]
pub struct HeaderFilter {
    id: String,
    headers: Vec<(String, String)>,
}

impl HeaderFilter {
    /// Creates a header filter.
    #[must_use]
    pub fn new(id: impl Into<String>, headers: Vec<(String, String)>) -> Self {
        Self {
            id: id.into(),
            headers,
        }
    }
}

impl RequestFilter for HeaderFilter {
    fn id(&self) -> &str {
        &self.id
    }

    fn filter(&self, request: HttpRequest) -> Result<HttpRequest, FilterError> {
        Ok(self
            .headers
            .iter()
            .fold(request, |request, (name, value)| {
                request.with_replaced_header(name.as_str(), value.as_str())
            }))
    }
}

/// Sets HTTP basic credentials on the `Authorization` header.
#[derive(Clone)]
pub struct BasicAuthFilter {
    username: String,
    password: String,
}

impl BasicAuthFilter {
    /// Filter id recorded on requests.
    pub const ID: &'static str = "basic-auth";

    /// Creates a basic auth filter.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl RequestFilter for BasicAuthFilter {
    fn id(&self) -> &str {
        Self::ID
    }

    fn filter(&self, request: HttpRequest) -> Result<HttpRequest, FilterError> {
        if self.username.is_empty() || self.password.is_empty() {
            return Err(FilterError::missing_credentials(Self::ID));
        }
        let token = BASE64.encode(format!("{}:{}", self.username, self.password));
        Ok(request.with_replaced_header("Authorization", format!("Basic {token}")))
    }
}

impl fmt::Debug for BasicAuthFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuthFilter")
            .field("username", &self.username)
            .field("password", &crate::http::headers::REDACTED)
            .finish()
    }
}
