//! Executor configuration.
//!
//! All options are supplied by the embedding application. Every field has a
//! documented fallback so a partial (or empty) JSON object is a valid
//! configuration:
//!
//! ```
//! use cloudcmd_core::config::ExecutorConfig;
//!
//! let config = ExecutorConfig::from_json_str(
//!     r#"{"retryable_server_codes": ["RequestLimitExceeded"], "max_retries": 3}"#,
//! )
//! .unwrap();
//! assert_eq!(config.max_retries, 3);
//! assert_eq!(config.max_redirects, 5);
//! ```

use std::collections::BTreeSet;
use std::ops::RangeInclusive;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::integrity::DigestAlgorithm;
use crate::redirect::DEFAULT_MAX_REDIRECTS;
use crate::retry::Backoff;
use crate::transport::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};

/// Default attempt budget (retries after the first send).
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default base backoff period in milliseconds.
pub const DEFAULT_BASE_PERIOD_MS: u64 = 50;

/// Default maximum backoff period in milliseconds.
pub const DEFAULT_MAX_PERIOD_MS: u64 = 1000;

/// Default cap on buffered error bodies (64 KiB).
pub const DEFAULT_MAX_ERROR_BODY_BYTES: usize = 64 * 1024;

const MAX_RETRIES_RANGE: RangeInclusive<u64> = 0..=100;
const BASE_PERIOD_RANGE: RangeInclusive<u64> = 1..=60_000;
const MAX_REDIRECTS_RANGE: RangeInclusive<u64> = 0..=20;
const ERROR_BODY_RANGE: RangeInclusive<u64> = 1..=16 * 1024 * 1024;
const TIMEOUT_RANGE: RangeInclusive<u64> = 1..=3600;
const RETRYABLE_STATUS_RANGE: RangeInclusive<u64> = 500..=599;

/// Errors loading or validating an [`ExecutorConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value is outside its accepted range.
    #[error("invalid {field}: {value} (expected {expected})")]
    OutOfRange {
        /// The offending option.
        field: &'static str,
        /// The rejected value.
        value: String,
        /// Human-readable accepted range.
        expected: String,
    },

    /// The JSON document could not be parsed.
    #[error("failed to parse executor config: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    fn out_of_range(field: &'static str, value: impl ToString, expected: impl ToString) -> Self {
        Self::OutOfRange {
            field,
            value: value.to_string(),
            expected: expected.to_string(),
        }
    }
}

/// Options recognized by [`CommandExecutor`](crate::executor::CommandExecutor).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutorConfig {
    /// Provider error codes that make a `503` retryable.
    pub retryable_server_codes: BTreeSet<String>,
    /// Additional `5xx` statuses retried unconditionally.
    pub retryable_statuses: BTreeSet<u16>,
    /// Retries allowed after the first send.
    pub max_retries: u32,
    /// Backoff base period.
    pub base_period_ms: u64,
    /// Backoff maximum period.
    pub max_period_ms: u64,
    /// Redirect hops followed per attempt.
    pub max_redirects: u32,
    /// Cap on error body bytes buffered for classification.
    pub max_error_body_bytes: usize,
    /// Digest computed over uploaded bytes; `null` disables it.
    pub upload_digest: Option<DigestAlgorithm>,
    /// Connect timeout of the default transport.
    pub connect_timeout_secs: u64,
    /// Read timeout of the default transport.
    pub read_timeout_secs: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            retryable_server_codes: BTreeSet::new(),
            retryable_statuses: BTreeSet::new(),
            max_retries: DEFAULT_MAX_RETRIES,
            base_period_ms: DEFAULT_BASE_PERIOD_MS,
            max_period_ms: DEFAULT_MAX_PERIOD_MS,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            max_error_body_bytes: DEFAULT_MAX_ERROR_BODY_BYTES,
            upload_digest: Some(DigestAlgorithm::Md5),
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            read_timeout_secs: READ_TIMEOUT_SECS,
        }
    }
}

impl ExecutorConfig {
    /// Parses and validates a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON or unknown fields,
    /// and [`ConfigError::OutOfRange`] for invalid values.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every option against its accepted range.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError::OutOfRange`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("max_retries", u64::from(self.max_retries), &MAX_RETRIES_RANGE)?;
        check_range("base_period_ms", self.base_period_ms, &BASE_PERIOD_RANGE)?;
        if self.max_period_ms < self.base_period_ms {
            return Err(ConfigError::out_of_range(
                "max_period_ms",
                self.max_period_ms,
                format!(">= base_period_ms ({})", self.base_period_ms),
            ));
        }
        check_range("max_redirects", u64::from(self.max_redirects), &MAX_REDIRECTS_RANGE)?;
        check_range(
            "max_error_body_bytes",
            u64::try_from(self.max_error_body_bytes).unwrap_or(u64::MAX),
            &ERROR_BODY_RANGE,
        )?;
        check_range("connect_timeout_secs", self.connect_timeout_secs, &TIMEOUT_RANGE)?;
        check_range("read_timeout_secs", self.read_timeout_secs, &TIMEOUT_RANGE)?;
        for status in &self.retryable_statuses {
            check_range("retryable_statuses", u64::from(*status), &RETRYABLE_STATUS_RANGE)?;
        }
        Ok(())
    }

    /// The backoff described by the period options.
    #[must_use]
    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.base_period_ms),
            Duration::from_millis(self.max_period_ms),
        )
    }
}

fn check_range(
    field: &'static str,
    value: u64,
    range: &RangeInclusive<u64>,
) -> Result<(), ConfigError> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::out_of_range(
            field,
            value,
            format!("{}..={}", range.start(), range.end()),
        ))
    }
}
