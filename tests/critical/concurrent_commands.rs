//! One executor shared across many concurrent commands.

use std::sync::atomic::Ordering;

use cloudcmd_core::{Command, ExecutorConfig, HttpRequest};
use wiremock::matchers::path_regex;
use wiremock::{Mock, ResponseTemplate};

use crate::support::critical_utils::{
    FlakyResponder, THROTTLED_XML, fast_config, flaky_provider_mock, reqwest_executor,
};
use crate::support::socket_guard::start_mock_server_or_skip;

#[tokio::test]
async fn p1_concurrent_commands_keep_independent_retry_state() {
    let responder = FlakyResponder::new(8, 503).fail_body(THROTTLED_XML);
    let Some((server, counter)) = flaky_provider_mock("/v1/servers", responder).await else {
        return;
    };
    let config = ExecutorConfig {
        max_retries: 10,
        ..fast_config()
    };
    let executor = reqwest_executor(&config);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let executor = executor.clone();
        let endpoint = format!("{}/v1/servers", server.uri());
        handles.push(tokio::spawn(async move {
            let mut command = Command::new(HttpRequest::get(endpoint).unwrap());
            let response = executor.execute(&mut command).await.unwrap();
            (response.status(), command.attempts())
        }));
    }

    let mut total_attempts = 0;
    for handle in handles {
        let (status, attempts) = handle.await.unwrap();
        assert_eq!(status, 200);
        assert!(attempts >= 1);
        total_attempts += attempts;
    }
    // Eight throttled answers plus one success per command.
    assert_eq!(total_attempts, 16);
    assert_eq!(counter.load(Ordering::SeqCst), 16);
}

#[tokio::test]
async fn p1_many_concurrent_successes() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(path_regex(r"^/v1/servers/i-\d+$"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(64)
        .mount(&server)
        .await;
    let executor = reqwest_executor(&fast_config());

    let mut handles = Vec::new();
    for i in 0..64 {
        let executor = executor.clone();
        let endpoint = format!("{}/v1/servers/i-{i}", server.uri());
        handles.push(tokio::spawn(async move {
            let mut command = Command::new(HttpRequest::get(endpoint).unwrap());
            executor.execute(&mut command).await.map(|r| r.status())
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), 200);
    }
    server.verify().await;
}
