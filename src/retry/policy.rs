//! Retry decisions for failed responses.

use std::collections::BTreeSet;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument};

use super::{Backoff, DetectingErrorCodeParser, ErrorCodeParser};
use crate::config::ExecutorConfig;
use crate::executor::Command;
use crate::http::HttpResponse;

/// Gateway timeout: the request never reached a backend, so it is always
/// safe to resend.
const GATEWAY_TIMEOUT: u16 = 504;

/// Service unavailable: retried only for a retryable provider error code.
const SERVICE_UNAVAILABLE: u16 = 503;

/// Decision on whether to retry a failed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the command after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which physical send the retry will be (1-indexed).
        attempt: u32,
    },

    /// Do not retry; the response is the command's result.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

impl RetryDecision {
    /// Creates a no-retry decision.
    pub fn do_not_retry(reason: impl Into<String>) -> Self {
        Self::DoNotRetry {
            reason: reason.into(),
        }
    }

    /// Returns `true` for [`RetryDecision::Retry`].
    #[must_use]
    pub fn is_retry(&self) -> bool {
        matches!(self, Self::Retry { .. })
    }
}

/// Pluggable retry decision function.
///
/// Implementations are shared across concurrent commands and must be
/// stateless: everything a decision depends on comes from the command (its
/// request and [`RetryState`](super::RetryState)) and the response. The
/// attempt budget is enforced by the executor, not by the policy.
pub trait RetryPolicy: Send + Sync + Debug {
    /// Decides whether `command` should be retried after `response`.
    ///
    /// The executor calls this with the error body already buffered and the
    /// failure already recorded in the command's retry state.
    fn should_retry(&self, command: &Command, response: &HttpResponse) -> RetryDecision;

    /// Provider error code carried by `response`, recorded in the retry state.
    fn error_code(&self, response: &HttpResponse) -> Option<String> {
        let _ = response;
        None
    }
}

/// The default policy: `503` with a retryable provider code, `504`, and any
/// caller-configured statuses are retried with exponential backoff.
///
/// Rules, in priority order:
///
/// 1. The command must be retry-eligible (idempotent, or marked retry-safe
///    with a replayable payload).
/// 2. `503` is retried only if the buffered body parses to a code in the
///    retryable-code set. A missing or malformed body is never retried.
/// 3. `504` is always retried.
/// 4. Statuses in the retryable-status set are retried.
/// 5. Anything else is not retried.
#[derive(Debug, Clone)]
pub struct BackoffLimitedRetryPolicy {
    retryable_codes: BTreeSet<String>,
    retryable_statuses: BTreeSet<u16>,
    backoff: Backoff,
    parser: Arc<dyn ErrorCodeParser>,
}

impl BackoffLimitedRetryPolicy {
    /// Creates a policy with empty code and status sets.
    #[must_use]
    pub fn new(backoff: Backoff) -> Self {
        Self {
            retryable_codes: BTreeSet::new(),
            retryable_statuses: BTreeSet::new(),
            backoff,
            parser: Arc::new(DetectingErrorCodeParser::default()),
        }
    }

    /// Builds the policy described by `config`.
    #[must_use]
    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self::new(config.backoff())
            .with_retryable_codes(config.retryable_server_codes.iter().cloned())
            .with_retryable_statuses(config.retryable_statuses.iter().copied())
    }

    /// Adds provider error codes that make a `503` retryable.
    #[must_use]
    pub fn with_retryable_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.retryable_codes.extend(codes.into_iter().map(Into::into));
        self
    }

    /// Adds statuses that are retried unconditionally.
    #[must_use]
    pub fn with_retryable_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.retryable_statuses.extend(statuses);
        self
    }

    /// Replaces the error body parser.
    #[must_use]
    pub fn with_error_code_parser(mut self, parser: Arc<dyn ErrorCodeParser>) -> Self {
        self.parser = parser;
        self
    }

    /// The backoff used for delays.
    #[must_use]
    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    fn retry(&self, command: &Command) -> RetryDecision {
        let state = command.retry_state();
        let delay = self.backoff.delay(state.failures());
        debug!(
            attempt = state.attempt(),
            next_attempt = state.attempt() + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );
        RetryDecision::Retry {
            delay,
            attempt: state.attempt() + 1,
        }
    }
}

impl RetryPolicy for BackoffLimitedRetryPolicy {
    #[instrument(skip_all, fields(status = response.status()))]
    fn should_retry(&self, command: &Command, response: &HttpResponse) -> RetryDecision {
        if !command.is_retry_eligible() {
            return RetryDecision::do_not_retry(
                "command is not idempotent or its payload cannot be replayed",
            );
        }

        match response.status() {
            SERVICE_UNAVAILABLE => match self.error_code(response) {
                Some(code) if self.retryable_codes.contains(&code) => self.retry(command),
                Some(code) => {
                    RetryDecision::do_not_retry(format!("error code {code} is not retryable"))
                }
                None => RetryDecision::do_not_retry("503 without a parseable error code"),
            },
            GATEWAY_TIMEOUT => self.retry(command),
            status if self.retryable_statuses.contains(&status) => self.retry(command),
            status => RetryDecision::do_not_retry(format!("status {status} is not retryable")),
        }
    }

    fn error_code(&self, response: &HttpResponse) -> Option<String> {
        response
            .body_bytes()
            .filter(|body| !body.is_empty())
            .and_then(|body| self.parser.parse(body))
    }
}
