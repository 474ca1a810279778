//! Redirect following.
//!
//! The transport never follows redirects itself. The executor asks the
//! [`RedirectPolicy`] for the next request after every response; a `3xx`
//! with a `Location` header yields a request against the new endpoint that
//! keeps the method, headers and payload of the request that was sent
//! (already filtered, so filters are not re-applied on the hop). `303 See
//! Other` switches to a bodiless `GET`.

use tracing::debug;
use url::Url;

use crate::error::CommandError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Statuses that carry a `Location` to follow.
const REDIRECT_STATUSES: [u16; 5] = [301, 302, 303, 307, 308];

const SEE_OTHER: u16 = 303;

/// Default number of hops followed within one attempt.
pub const DEFAULT_MAX_REDIRECTS: u32 = 5;

/// Decides whether and how to re-issue a request from a `3xx` response.
///
/// Stateless: the hop count is supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedirectPolicy {
    max_redirects: u32,
    follow: bool,
}

impl Default for RedirectPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REDIRECTS)
    }
}

impl RedirectPolicy {
    /// Follows up to `max_redirects` hops per attempt.
    #[must_use]
    pub fn new(max_redirects: u32) -> Self {
        Self {
            max_redirects,
            follow: true,
        }
    }

    /// Never follows redirects; `3xx` responses are returned as-is.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_redirects: 0,
            follow: false,
        }
    }

    /// Maximum hops per attempt.
    #[must_use]
    pub fn max_redirects(&self) -> u32 {
        self.max_redirects
    }

    /// Returns `true` if `response` is a redirect this policy would follow.
    #[must_use]
    pub fn is_redirect(&self, response: &HttpResponse) -> bool {
        self.follow
            && REDIRECT_STATUSES.contains(&response.status())
            && response.header("Location").is_some()
    }

    /// Builds the request for the next hop, or `None` if `response` is not a
    /// redirect to follow.
    ///
    /// `hops` is the number of redirects already followed in this attempt.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::TooManyRedirects`] when `hops` has reached the
    /// limit, and [`CommandError::InvalidRedirect`] when the `Location` does
    /// not resolve to an `http`/`https` URL.
    pub fn next_request(
        &self,
        request: &HttpRequest,
        response: &HttpResponse,
        hops: u32,
    ) -> Result<Option<HttpRequest>, CommandError> {
        if !self.is_redirect(response) {
            return Ok(None);
        }
        if hops >= self.max_redirects {
            return Err(CommandError::TooManyRedirects {
                endpoint: request.endpoint().to_string(),
                max_redirects: self.max_redirects,
            });
        }
        let location = response.header("Location").unwrap_or_default();
        let target = resolve_location(request.endpoint(), location)?;
        debug!(
            status = response.status(),
            from = %request.endpoint(),
            to = %target,
            "following redirect"
        );

        let next = request.with_endpoint(target);
        if response.status() == SEE_OTHER
            && !matches!(request.method(), HttpMethod::Get | HttpMethod::Head)
        {
            return Ok(Some(next.with_method(HttpMethod::Get).with_payload(None)));
        }
        Ok(Some(next))
    }
}

fn resolve_location(base: &Url, location: &str) -> Result<Url, CommandError> {
    let invalid = || CommandError::InvalidRedirect {
        endpoint: base.to_string(),
        location: location.to_string(),
    };
    let target = base.join(location).map_err(|_| invalid())?;
    if matches!(target.scheme(), "http" | "https") {
        Ok(target)
    } else {
        Err(invalid())
    }
}
