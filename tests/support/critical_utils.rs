//! Shared utilities for integration and critical tests (flaky provider mocks,
//! executor construction, deterministic payloads).

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use cloudcmd_core::{CommandExecutor, ExecutorConfig, ReqwestTransport};
use wiremock::matchers::path;
use wiremock::{Mock, MockServer, Respond, ResponseTemplate};

use super::socket_guard::start_mock_server_or_skip;

/// Provider throttling body recognized by [`fast_config`].
pub const THROTTLED_XML: &str =
    "<?xml version=\"1.0\"?><Response><Errors><Error><Code>RequestLimitExceeded</Code><Message>Request limit exceeded.</Message></Error></Errors></Response>";

/// Executor config with millisecond backoff so retry tests stay fast.
pub fn fast_config() -> ExecutorConfig {
    ExecutorConfig {
        retryable_server_codes: ["RequestLimitExceeded".to_string()].into(),
        base_period_ms: 5,
        max_period_ms: 20,
        connect_timeout_secs: 5,
        read_timeout_secs: 10,
        ..ExecutorConfig::default()
    }
}

/// An executor backed by the reqwest transport.
pub fn reqwest_executor(config: &ExecutorConfig) -> CommandExecutor {
    let transport = ReqwestTransport::from_config(config).expect("build transport");
    CommandExecutor::new(Arc::new(transport), config).expect("valid config")
}

/// `len` bytes following `(i * 31 + 7) % 251`.
pub fn patterned_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31 + 7) % 251) as u8).collect()
}

/// Responder that fails the first `fail_count` requests with `fail_status`
/// and `fail_body`, then returns 200 with `success_body`.
pub struct FlakyResponder {
    request_count: Arc<AtomicUsize>,
    fail_count: usize,
    fail_status: u16,
    fail_body: Vec<u8>,
    success_body: Vec<u8>,
}

impl FlakyResponder {
    pub fn new(fail_count: usize, fail_status: u16) -> Self {
        Self {
            request_count: Arc::new(AtomicUsize::new(0)),
            fail_count,
            fail_status,
            fail_body: Vec::new(),
            success_body: b"ok".to_vec(),
        }
    }

    pub fn fail_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.fail_body = body.into();
        self
    }

    pub fn success_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.success_body = body.into();
        self
    }

    /// Shared counter of requests answered so far.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.request_count)
    }
}

impl Respond for FlakyResponder {
    fn respond(&self, _request: &wiremock::Request) -> ResponseTemplate {
        let n = self.request_count.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_count {
            ResponseTemplate::new(self.fail_status).set_body_bytes(self.fail_body.clone())
        } else {
            ResponseTemplate::new(200).set_body_bytes(self.success_body.clone())
        }
    }
}

/// Flaky provider mock mounted on `route` for any method.
///
/// Returns `None` when sockets are unavailable and the test should be skipped.
pub async fn flaky_provider_mock(
    route: &str,
    responder: FlakyResponder,
) -> Option<(MockServer, Arc<AtomicUsize>)> {
    let mock_server = start_mock_server_or_skip().await?;
    let counter = responder.counter();

    Mock::given(path(route))
        .respond_with(responder)
        .mount(&mock_server)
        .await;

    Some((mock_server, counter))
}
