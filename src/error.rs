//! Error types for command execution.
//!
//! [`CommandError`] is the single classified error returned by the
//! executor. Retryable conditions never surface here while the attempt
//! budget lasts; every variant is terminal.

use std::error::Error as StdError;

use thiserror::Error;

use crate::executor::CommandState;
use crate::filter::FilterError;
use crate::http::HttpResponse;
use crate::payload::PayloadError;
use crate::transport::TransportError;

/// Terminal failures of a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The transport failed and the failure was not retryable (or the
    /// command was not eligible for a resend).
    #[error(transparent)]
    Transport(TransportError),

    /// A non-2xx response that is the command's final result.
    ///
    /// Produced by [`CommandExecutor::invoke`](crate::executor::CommandExecutor::invoke);
    /// [`execute`](crate::executor::CommandExecutor::execute) returns such
    /// responses as `Ok`.
    #[error("HTTP {status} from {endpoint}")]
    NonRetryableResponse {
        /// The response status.
        status: u16,
        /// The endpoint that produced the response.
        endpoint: String,
        /// The response, with its error body buffered.
        response: Box<HttpResponse>,
    },

    /// The attempt budget ran out while the failure was still retryable.
    #[error("retries exhausted after {attempts} attempts to {endpoint}{}", status_suffix(.last_status))]
    RetryExhausted {
        /// Physical sends issued.
        attempts: u32,
        /// The endpoint of the last attempt.
        endpoint: String,
        /// Status of the last response, if the last failure was a response.
        last_status: Option<u16>,
        /// The last response, if the last failure was a response.
        response: Option<Box<HttpResponse>>,
        /// The last transport error, if the last failure was one.
        #[source]
        last_error: Option<TransportError>,
    },

    /// A request filter failed. Never retried.
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// A retry or redirect needed to re-read a payload whose source cannot
    /// be reopened.
    #[error("payload for {endpoint} cannot be replayed for attempt {attempt}")]
    PayloadNotReplayable {
        /// The endpoint of the attempt that needed the payload.
        endpoint: String,
        /// The attempt that needed the payload.
        attempt: u32,
    },

    /// The payload failed to open or read.
    #[error(transparent)]
    Payload(#[from] PayloadError),

    /// Redirects exceeded the configured depth.
    #[error("too many redirects from {endpoint} (max {max_redirects})")]
    TooManyRedirects {
        /// The endpoint whose response would have been the next hop.
        endpoint: String,
        /// The configured limit.
        max_redirects: u32,
    },

    /// A redirect `Location` did not resolve to an HTTP URL.
    #[error("invalid redirect from {endpoint} to {location}")]
    InvalidRedirect {
        /// The endpoint that sent the redirect.
        endpoint: String,
        /// The rejected `Location` value.
        location: String,
    },

    /// The command was cancelled.
    #[error("command cancelled after {attempts} attempts")]
    Cancelled {
        /// Physical sends issued before cancellation.
        attempts: u32,
    },

    /// The command already reached a terminal state.
    #[error("command is already {state}")]
    InvalidState {
        /// The state the command was in.
        state: CommandState,
    },

    /// The binding layer failed to parse a successful response.
    #[error("failed to parse response: {source}")]
    Parse {
        /// The underlying error.
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

fn status_suffix(status: &Option<u16>) -> String {
    status
        .map(|status| format!(" (last status {status})"))
        .unwrap_or_default()
}

impl CommandError {
    /// Wraps a response-parsing error.
    pub fn parse(source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::Parse {
            source: source.into(),
        }
    }

    /// Creates a non-retryable response error.
    #[must_use]
    pub fn non_retryable(endpoint: impl Into<String>, response: HttpResponse) -> Self {
        Self::NonRetryableResponse {
            status: response.status(),
            endpoint: endpoint.into(),
            response: Box::new(response),
        }
    }

    /// The HTTP status attached to the error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NonRetryableResponse { status, .. } => Some(*status),
            Self::RetryExhausted { last_status, .. } => *last_status,
            _ => None,
        }
    }

    /// The response attached to the error, if any.
    #[must_use]
    pub fn response(&self) -> Option<&HttpResponse> {
        match self {
            Self::NonRetryableResponse { response, .. } => Some(&**response),
            Self::RetryExhausted { response, .. } => response.as_deref(),
            _ => None,
        }
    }

    /// Returns `true` for a terminal `404 Not Found`.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NonRetryableResponse { status: 404, .. })
    }

    /// Returns `true` if the command was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
