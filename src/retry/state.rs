//! Per-command retry bookkeeping.

/// Retry bookkeeping for one command.
///
/// Created fresh with every [`Command`](crate::executor::Command) and updated
/// by the executor only. Nothing in here is shared between commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryState {
    attempt: u32,
    failures: u32,
    retries: u32,
    last_status: Option<u16>,
    error_code: Option<String>,
}

impl RetryState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Physical sends issued so far, redirect hops included.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Failed attempts recorded so far.
    #[must_use]
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Retries scheduled so far.
    #[must_use]
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Status of the last failed response, if the last failure had one.
    #[must_use]
    pub fn last_status(&self) -> Option<u16> {
        self.last_status
    }

    /// Provider error code parsed from the last failed response.
    #[must_use]
    pub fn error_code(&self) -> Option<&str> {
        self.error_code.as_deref()
    }

    pub(crate) fn begin_send(&mut self) -> u32 {
        self.attempt += 1;
        self.attempt
    }

    pub(crate) fn record_response(&mut self, status: u16, error_code: Option<String>) {
        self.failures += 1;
        self.last_status = Some(status);
        self.error_code = error_code;
    }

    pub(crate) fn record_transport_failure(&mut self) {
        self.failures += 1;
        self.last_status = None;
        self.error_code = None;
    }

    pub(crate) fn record_retry(&mut self) {
        self.retries += 1;
    }
}
