//! Failure classification for retry decisions.

use tracing::instrument;

use crate::transport::TransportError;

/// Classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Connection reset or timeout before headers arrived. Retried up to the
    /// attempt budget regardless of the status-code policy.
    Transient,

    /// A response the retry policy decided to retry (`503` with a retryable
    /// provider code, `504`, or a caller-configured status).
    RetryableServer,

    /// Anything that a retry would not fix.
    NonRetryable,
}

impl FailureType {
    /// Returns `true` for retryable classifications.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        !matches!(self, Self::NonRetryable)
    }
}

/// Classifies a transport failure.
///
/// | Error | Type | Rationale |
/// |-------|------|-----------|
/// | Timeout | Transient | Network may recover |
/// | Connection | Transient | Peer may come back |
/// | Tls | NonRetryable | Certificate/config issue |
/// | InvalidRequest | NonRetryable | Won't succeed |
#[instrument(level = "trace")]
pub fn classify_transport_error(error: &TransportError) -> FailureType {
    match error {
        TransportError::Timeout { .. } | TransportError::Connection { .. } => {
            FailureType::Transient
        }
        TransportError::Tls { .. } | TransportError::InvalidRequest { .. } => {
            FailureType::NonRetryable
        }
    }
}
