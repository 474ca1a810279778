//! Command execution: filters, transport, retries and redirects.
//!
//! The [`CommandExecutor`] owns the attempt loop for one [`Command`] at a
//! time per call; any number of commands may run concurrently against the
//! same executor, which holds only shared, stateless collaborators.
//!
//! # Attempt loop
//!
//! 1. Apply the filter chain to the command's base request (`FILTERED`).
//! 2. Open the payload from the start and send (`SENT`).
//! 3. Follow redirects by re-sending the filtered request against the new
//!    endpoint (`REDIRECTING`), without re-filtering.
//! 4. `2xx` is returned. Any other response has its body buffered and is
//!    handed to the [`RetryPolicy`]; a retry sleeps (`RETRYING`) and starts
//!    again at step 1, otherwise the response is returned.
//! 5. Transient transport failures are retried with the same backoff,
//!    independent of the policy.
//!
//! The attempt budget (`max_retries`) caps retries regardless of policy;
//! running out while still retryable is [`CommandError::RetryExhausted`].
//! Every suspension point (send, error body read, backoff) observes the
//! command's cancellation token.

mod command;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

pub use command::{Command, CommandState};

use crate::config::{ConfigError, ExecutorConfig};
use crate::error::CommandError;
use crate::fallback::Fallback;
use crate::filter::{FilterChain, RequestFilter};
use crate::http::{HttpRequest, HttpResponse};
use crate::integrity::{DigestAlgorithm, tap_stream};
use crate::payload::PayloadError;
use crate::redirect::RedirectPolicy;
use crate::retry::{
    Backoff, BackoffLimitedRetryPolicy, FailureType, RetryDecision, RetryPolicy,
    classify_transport_error,
};
use crate::transport::{Transport, TransportError};

/// Outcome of one send (with its redirect hops) that did not produce a
/// response.
enum SendFailure {
    Transport(TransportError),
    Command(CommandError),
}

impl From<CommandError> for SendFailure {
    fn from(error: CommandError) -> Self {
        Self::Command(error)
    }
}

/// Runs commands against a [`Transport`].
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
///
/// use cloudcmd_core::config::ExecutorConfig;
/// use cloudcmd_core::error::CommandError;
/// use cloudcmd_core::executor::{Command, CommandExecutor};
/// use cloudcmd_core::fallback::NullOnNotFound;
/// use cloudcmd_core::filter::BasicAuthFilter;
/// use cloudcmd_core::http::HttpRequest;
/// use cloudcmd_core::transport::ReqwestTransport;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ExecutorConfig::from_json_str(
///     r#"{"retryable_server_codes": ["RequestLimitExceeded"]}"#,
/// )?;
/// let executor = CommandExecutor::new(Arc::new(ReqwestTransport::from_config(&config)?), &config)?
///     .with_filter(BasicAuthFilter::new("alice", "s3cret"));
///
/// let mut command = Command::new(HttpRequest::get("https://api.example.com/v1/servers/9")?);
/// let server: Option<String> = executor
///     .invoke(
///         &mut command,
///         |response| async move {
///             let body = response.bytes().await?;
///             Ok::<_, CommandError>(Some(String::from_utf8_lossy(&body).into_owned()))
///         },
///         &NullOnNotFound,
///     )
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    transport: Arc<dyn Transport>,
    filters: FilterChain,
    retry_policy: Arc<dyn RetryPolicy>,
    redirect_policy: RedirectPolicy,
    transport_backoff: Backoff,
    max_retries: u32,
    max_error_body_bytes: usize,
    upload_digest: Option<DigestAlgorithm>,
}

impl CommandExecutor {
    /// Creates an executor with the default retry and redirect policies
    /// described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `config` fails validation.
    pub fn new(transport: Arc<dyn Transport>, config: &ExecutorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            transport,
            filters: FilterChain::new(),
            retry_policy: Arc::new(BackoffLimitedRetryPolicy::from_config(config)),
            redirect_policy: RedirectPolicy::new(config.max_redirects),
            transport_backoff: config.backoff(),
            max_retries: config.max_retries,
            max_error_body_bytes: config.max_error_body_bytes,
            upload_digest: config.upload_digest,
        })
    }

    /// Replaces the filter chain.
    #[must_use]
    pub fn with_filters(mut self, filters: FilterChain) -> Self {
        self.filters = filters;
        self
    }

    /// Appends a filter to the chain.
    #[must_use]
    pub fn with_filter(mut self, filter: impl RequestFilter + 'static) -> Self {
        self.filters = self.filters.with(filter);
        self
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Replaces the redirect policy.
    #[must_use]
    pub fn with_redirect_policy(mut self, policy: RedirectPolicy) -> Self {
        self.redirect_policy = policy;
        self
    }

    /// The filter chain.
    #[must_use]
    pub fn filters(&self) -> &FilterChain {
        &self.filters
    }

    /// The shared retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> &Arc<dyn RetryPolicy> {
        &self.retry_policy
    }

    /// Runs `command` to a terminal state.
    ///
    /// Non-2xx responses that are not retried (or that the policy gave up
    /// on) are returned as `Ok`, with their body buffered; use
    /// [`invoke`](Self::invoke) to turn them into errors and apply a
    /// fallback.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] for terminal failures: filter errors,
    /// non-retryable transport errors, an exhausted attempt budget, redirect
    /// failures, payloads that cannot be replayed, and cancellation.
    #[instrument(skip_all, fields(method = %command.request().method(), endpoint = %command.request().endpoint()))]
    pub async fn execute(&self, command: &mut Command) -> Result<HttpResponse, CommandError> {
        if command.state().is_terminal() {
            return Err(CommandError::InvalidState {
                state: command.state(),
            });
        }
        let result = self.run(command).await;
        command.finish(result.is_ok());
        match &result {
            Ok(response) => debug!(
                status = response.status(),
                attempts = command.attempts(),
                "command finished"
            ),
            Err(e) => warn!(error = %e, attempts = command.attempts(), "command failed"),
        }
        result
    }

    /// Executes `command`, parses a `2xx` response with `parse`, and applies
    /// `fallback` to terminal failures.
    ///
    /// A non-2xx result becomes [`CommandError::NonRetryableResponse`] before
    /// the fallback sees it. Errors returned by `parse` are not passed to the
    /// fallback.
    ///
    /// # Errors
    ///
    /// Returns whatever the fallback rethrows, or the error from `parse`.
    pub async fn invoke<T, P, Fut, F>(
        &self,
        command: &mut Command,
        parse: P,
        fallback: &F,
    ) -> Result<T, CommandError>
    where
        P: FnOnce(HttpResponse) -> Fut,
        Fut: Future<Output = Result<T, CommandError>>,
        F: Fallback<T> + ?Sized,
    {
        let endpoint = command.request().endpoint().to_string();
        let outcome = match self.execute(command).await {
            Ok(response) if response.is_success() => return parse(response).await,
            Ok(response) => CommandError::non_retryable(endpoint, response),
            Err(e) => e,
        };
        debug!(error = %outcome, "applying fallback");
        fallback.create(outcome)
    }

    async fn run(&self, command: &mut Command) -> Result<HttpResponse, CommandError> {
        loop {
            let filtered = self.filters.apply(command.request().clone())?;
            command.set_state(CommandState::Filtered);

            let delay = match self.send_following_redirects(command, filtered).await {
                Ok(response) if response.is_success() => return Ok(response),
                Ok(response) => match self.judge_response(command, response).await? {
                    ResponseOutcome::Return(response) => return Ok(response),
                    ResponseOutcome::Retry(delay) => delay,
                },
                Err(SendFailure::Command(e)) => return Err(e),
                Err(SendFailure::Transport(e)) => self.judge_transport_error(command, e)?,
            };
            self.back_off(command, delay).await?;
        }
    }

    /// Buffers the error body and consults the retry policy.
    async fn judge_response(
        &self,
        command: &mut Command,
        mut response: HttpResponse,
    ) -> Result<ResponseOutcome, CommandError> {
        let token = command.cancellation_token();
        let cancelled = tokio::select! {
            biased;
            () = token.cancelled() => true,
            () = response.buffer_payload(self.max_error_body_bytes) => false,
        };
        if cancelled {
            debug!(
                status = response.status(),
                attempts = command.attempts(),
                "cancelled while reading error body"
            );
            return Err(CommandError::Cancelled {
                attempts: command.attempts(),
            });
        }
        let error_code = self.retry_policy.error_code(&response);
        command
            .retry_state_mut()
            .record_response(response.status(), error_code);

        match self.retry_policy.should_retry(command, &response) {
            RetryDecision::DoNotRetry { reason } => {
                debug!(status = response.status(), %reason, "not retrying");
                Ok(ResponseOutcome::Return(response))
            }
            RetryDecision::Retry { delay, .. } => {
                if command.retry_state().retries() >= self.max_retries {
                    return Err(CommandError::RetryExhausted {
                        attempts: command.attempts(),
                        endpoint: command.request().endpoint().to_string(),
                        last_status: Some(response.status()),
                        response: Some(Box::new(response)),
                        last_error: None,
                    });
                }
                info!(
                    status = response.status(),
                    error_code = command.retry_state().error_code(),
                    attempt = command.attempts() + 1,
                    max_retries = self.max_retries,
                    delay_ms = delay.as_millis(),
                    failure = ?FailureType::RetryableServer,
                    "retrying command"
                );
                response.release_payload();
                Ok(ResponseOutcome::Retry(delay))
            }
        }
    }

    /// Transient transport failures are retried up to the budget,
    /// independent of the status-code policy.
    fn judge_transport_error(
        &self,
        command: &mut Command,
        error: TransportError,
    ) -> Result<Duration, CommandError> {
        let failure = classify_transport_error(&error);
        if failure != FailureType::Transient || !command.is_retry_eligible() {
            return Err(CommandError::Transport(error));
        }
        command.retry_state_mut().record_transport_failure();
        if command.retry_state().retries() >= self.max_retries {
            return Err(CommandError::RetryExhausted {
                attempts: command.attempts(),
                endpoint: error.endpoint().to_string(),
                last_status: None,
                response: None,
                last_error: Some(error),
            });
        }
        let delay = self
            .transport_backoff
            .delay(command.retry_state().failures());
        info!(
            attempt = command.attempts() + 1,
            max_retries = self.max_retries,
            delay_ms = delay.as_millis(),
            error = %error,
            "retrying after transport failure"
        );
        Ok(delay)
    }

    /// Sleeps before the next attempt unless the command is cancelled first.
    async fn back_off(&self, command: &mut Command, delay: Duration) -> Result<(), CommandError> {
        command.set_state(CommandState::Retrying);
        command.retry_state_mut().record_retry();
        let token = command.cancellation_token();
        tokio::select! {
            biased;
            () = token.cancelled() => {
                debug!(attempts = command.attempts(), "cancelled during backoff");
                Err(CommandError::Cancelled { attempts: command.attempts() })
            }
            () = tokio::time::sleep(delay) => Ok(()),
        }
    }

    /// Sends `request`, then every redirect hop the policy asks for.
    async fn send_following_redirects(
        &self,
        command: &mut Command,
        request: HttpRequest,
    ) -> Result<HttpResponse, SendFailure> {
        let mut request = request;
        let mut hops = 0;
        loop {
            let response = self.send_once(command, &request).await?;
            let Some(next) = self.redirect_policy.next_request(&request, &response, hops)? else {
                return Ok(response);
            };
            response.release_payload();
            command.follow_redirect(&next);
            request = next;
            hops += 1;
        }
    }

    /// One physical send: opens the payload from the start, taps it for the
    /// upload digest, and races the transport against cancellation.
    async fn send_once(
        &self,
        command: &mut Command,
        request: &HttpRequest,
    ) -> Result<HttpResponse, SendFailure> {
        let token = command.cancellation_token();
        if token.is_cancelled() {
            return Err(CommandError::Cancelled {
                attempts: command.attempts(),
            }
            .into());
        }

        let mut digest = None;
        let body = match request.payload() {
            Some(payload) => {
                let stream = payload.open().await.map_err(|e| match e {
                    PayloadError::NotReplayable => CommandError::PayloadNotReplayable {
                        endpoint: request.endpoint().to_string(),
                        attempt: command.attempts() + 1,
                    },
                    other => CommandError::Payload(other),
                })?;
                match self.upload_digest {
                    Some(algorithm) => {
                        let (tapped, handle) = tap_stream(stream, algorithm);
                        digest = Some(handle);
                        Some(tapped)
                    }
                    None => Some(stream),
                }
            }
            None => None,
        };

        let attempt = command.begin_send();
        debug!(
            attempt,
            method = %request.method(),
            endpoint = %request.endpoint(),
            "sending request"
        );
        let result = tokio::select! {
            biased;
            () = token.cancelled() => {
                debug!(attempt, "cancelled while sending");
                return Err(CommandError::Cancelled { attempts: attempt }.into());
            }
            result = self.transport.send(request, body) => result,
        };

        let mut response = result.map_err(SendFailure::Transport)?;
        response.set_request_digest(digest.and_then(|handle| handle.finish()));
        debug!(attempt, status = response.status(), "response received");
        Ok(response)
    }
}

/// What to do with a non-2xx response.
enum ResponseOutcome {
    Return(HttpResponse),
    Retry(Duration),
}
