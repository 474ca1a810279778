//! Cloud Command Core Library
//!
//! Provider-agnostic execution of HTTP commands against cloud APIs: a
//! request is filtered (authentication, signing, common headers), sent over
//! a pluggable transport, retried when the provider reports a transient
//! condition, redirected when told to, and checked for payload integrity.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`http`] - Request/response model, methods and header redaction
//! - [`payload`] - Replayable and one-shot request/response bodies
//! - [`filter`] - Ordered request filters (auth, headers)
//! - [`retry`] - Backoff, retry policies and error-code parsing
//! - [`redirect`] - Redirect following
//! - [`executor`] - Commands and the attempt loop
//! - [`transport`] - The `Transport` seam and its reqwest implementation
//! - [`integrity`] - Content digests and verification
//! - [`fallback`] - Substitute results for terminal failures
//! - [`config`] - Executor options
//! - [`error`] - The command error taxonomy

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod executor;
pub mod fallback;
pub mod filter;
pub mod http;
pub mod integrity;
pub mod payload;
pub mod redirect;
pub mod retry;
#[cfg(test)]
pub(crate) mod test_support;
pub mod transport;

// Re-export commonly used types
pub use config::{ConfigError, ExecutorConfig};
pub use error::CommandError;
pub use executor::{Command, CommandExecutor, CommandState};
pub use fallback::{
    EmptyOnNotFound, FalseOnNotFound, Fallback, NullOnNotFound, Rethrow, TrueOnNotFound,
    VoidOnNotFound,
};
pub use filter::{BasicAuthFilter, FilterChain, FilterError, HeaderFilter, RequestFilter};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use integrity::{ContentDigest, DigestAlgorithm, Verification};
pub use payload::{ByteStream, ContentMetadata, Payload, PayloadError};
pub use redirect::RedirectPolicy;
pub use retry::{
    Backoff, BackoffLimitedRetryPolicy, FailureType, RetryDecision, RetryPolicy, RetryState,
};
pub use transport::{ReqwestTransport, Transport, TransportError};
