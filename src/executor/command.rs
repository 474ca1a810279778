//! One logical operation and its state machine.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::http::HttpRequest;
use crate::payload::Payload;
use crate::retry::RetryState;

/// Lifecycle of a [`Command`].
///
/// ```text
/// BUILT -> FILTERED -> SENT -> SUCCEEDED
///             ^          |  -> FAILED
///             |          |  -> REDIRECTING -> SENT
///             +----------+  <- RETRYING
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    /// Assembled by the caller, never sent.
    Built,
    /// The filter chain produced the request for the next send.
    Filtered,
    /// A request is in flight.
    Sent,
    /// Waiting out the backoff before the next attempt.
    Retrying,
    /// Following a redirect.
    Redirecting,
    /// Finished with a response.
    Succeeded,
    /// Finished with an error.
    Failed,
}

impl CommandState {
    /// Returns `true` for `Succeeded` and `Failed`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Upper-case state name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Built => "BUILT",
            Self::Filtered => "FILTERED",
            Self::Sent => "SENT",
            Self::Retrying => "RETRYING",
            Self::Redirecting => "REDIRECTING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for CommandState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logical client operation, possibly spanning several physical sends.
///
/// The command carries the current unfiltered request (its endpoint follows
/// redirects), the per-command [`RetryState`] and a cancellation token. It is
/// driven by [`CommandExecutor::execute`](super::CommandExecutor::execute),
/// which takes it by `&mut` so a command can never have two sends in flight.
///
/// The payload attached to the initial request is released exactly once: by
/// the executor when the command reaches a terminal state, or by the caller
/// through [`Command::release_payload`] if the command never runs.
#[derive(Debug)]
pub struct Command {
    request: HttpRequest,
    payload: Option<Arc<Payload>>,
    state: CommandState,
    retry_state: RetryState,
    retry_safe: bool,
    cancel: CancellationToken,
}

impl Command {
    /// Creates a command in the `BUILT` state.
    #[must_use]
    pub fn new(request: HttpRequest) -> Self {
        Self {
            payload: request.payload().cloned(),
            request,
            state: CommandState::Built,
            retry_state: RetryState::new(),
            retry_safe: false,
            cancel: CancellationToken::new(),
        }
    }

    /// Marks a non-idempotent command as safe to resend.
    ///
    /// A retry-safe command with a payload that cannot be replayed is still
    /// never retried.
    #[must_use]
    pub fn retry_safe(mut self, retry_safe: bool) -> Self {
        self.retry_safe = retry_safe;
        self
    }

    /// Uses `token` for cancellation (for example a child of an application
    /// shutdown token).
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// A clone of the command's cancellation token.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancels the command at its next suspension point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The current unfiltered request.
    #[must_use]
    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> CommandState {
        self.state
    }

    /// Retry bookkeeping.
    #[must_use]
    pub fn retry_state(&self) -> &RetryState {
        &self.retry_state
    }

    /// Physical sends issued so far.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.retry_state.attempt()
    }

    /// Returns `true` if the command may be resent after a failure.
    ///
    /// Idempotent methods are always eligible. Other methods are eligible
    /// only when marked retry-safe and their payload can be replayed.
    #[must_use]
    pub fn is_retry_eligible(&self) -> bool {
        if self.request.method().is_idempotent() {
            return true;
        }
        self.retry_safe
            && self
                .request
                .payload()
                .is_none_or(|payload| payload.is_repeatable())
    }

    /// Releases the payload of a command that will not be executed.
    ///
    /// Returns `true` if this call performed the release.
    pub fn release_payload(&self) -> bool {
        let released = self.payload.as_ref().is_some_and(|payload| payload.release());
        if released {
            debug!(endpoint = %self.request.endpoint(), "payload released");
        }
        released
    }

    pub(crate) fn set_state(&mut self, state: CommandState) {
        trace!(from = %self.state, to = %state, "command state");
        self.state = state;
    }

    pub(crate) fn retry_state_mut(&mut self) -> &mut RetryState {
        &mut self.retry_state
    }

    pub(crate) fn begin_send(&mut self) -> u32 {
        self.set_state(CommandState::Sent);
        self.retry_state.begin_send()
    }

    /// Moves the base request to the redirect target so later retries go
    /// there too.
    ///
    /// The hop was built from the filtered request, so only its endpoint is
    /// taken over. The base request keeps its own unfiltered payload unless
    /// the hop switched method (`303`), which drops the body.
    pub(crate) fn follow_redirect(&mut self, hop: &HttpRequest) {
        self.set_state(CommandState::Redirecting);
        let mut next = self.request.with_endpoint(hop.endpoint().clone());
        if hop.method() != self.request.method() {
            next = next.with_method(hop.method()).with_payload(None);
        }
        self.request = next;
    }

    pub(crate) fn finish(&mut self, succeeded: bool) {
        self.set_state(if succeeded {
            CommandState::Succeeded
        } else {
            CommandState::Failed
        });
        self.release_payload();
    }
}
