//! Retry logic with exponential backoff for failed commands.
//!
//! This module provides the [`RetryPolicy`] trait and the default
//! [`BackoffLimitedRetryPolicy`], plus the pieces they are built from.
//!
//! # Overview
//!
//! A failed attempt is one of:
//! - a transport failure, classified by [`classify_transport_error`] into a
//!   [`FailureType`]; transient ones are retried by the executor up to the
//!   attempt budget, independent of any policy;
//! - a non-2xx response, handed to the [`RetryPolicy`], which returns a
//!   [`RetryDecision`] with a [`Backoff`] delay.
//!
//! Per-command bookkeeping lives in [`RetryState`]. Policies hold no mutable
//! state and are shared across concurrent commands.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use cloudcmd_core::executor::Command;
//! use cloudcmd_core::http::{HttpRequest, HttpResponse};
//! use cloudcmd_core::retry::{Backoff, BackoffLimitedRetryPolicy, RetryDecision, RetryPolicy};
//!
//! let policy = BackoffLimitedRetryPolicy::new(Backoff::new(
//!     Duration::from_millis(50),
//!     Duration::from_secs(1),
//! ));
//! let command = Command::new(HttpRequest::get("https://api.example.com/v1/images").unwrap());
//!
//! match policy.should_retry(&command, &HttpResponse::new(504)) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         println!("Retrying in {:?} (attempt {})", delay, attempt);
//!     }
//!     RetryDecision::DoNotRetry { reason } => {
//!         println!("Not retrying: {}", reason);
//!     }
//! }
//! ```

mod backoff;
mod classify;
mod error_code;
mod policy;
mod state;

pub use backoff::Backoff;
pub use classify::{FailureType, classify_transport_error};
pub use error_code::{
    DetectingErrorCodeParser, ErrorCodeParser, JsonErrorCodeParser, XmlErrorCodeParser,
};
pub use policy::{BackoffLimitedRetryPolicy, RetryDecision, RetryPolicy};
pub use state::RetryState;
