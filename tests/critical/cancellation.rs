//! Cancellation during backoff and during an in-flight send.

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use cloudcmd_core::{Command, CommandError, CommandState, ExecutorConfig, HttpRequest};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::path;
use wiremock::{Mock, ResponseTemplate};

use crate::support::critical_utils::{
    FlakyResponder, fast_config, flaky_provider_mock, reqwest_executor,
};
use crate::support::socket_guard::start_mock_server_or_skip;

fn cancel_after(token: CancellationToken, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        token.cancel();
    });
}

#[tokio::test]
async fn p0_cancel_during_backoff_prevents_next_send() {
    let Some((server, counter)) =
        flaky_provider_mock("/v1/servers", FlakyResponder::new(10, 504)).await
    else {
        return;
    };
    let config = ExecutorConfig {
        base_period_ms: 10_000,
        max_period_ms: 10_000,
        ..fast_config()
    };
    let mut command = Command::new(HttpRequest::get(format!("{}/v1/servers", server.uri())).unwrap());
    cancel_after(command.cancellation_token(), Duration::from_millis(200));

    let started = Instant::now();
    let error = reqwest_executor(&config)
        .execute(&mut command)
        .await
        .unwrap_err();

    assert!(matches!(error, CommandError::Cancelled { attempts: 1 }), "{error:?}");
    assert!(started.elapsed() < Duration::from_secs(5));
    // Give a stray retry time to show up before counting.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(command.state(), CommandState::Failed);
}

#[tokio::test]
async fn p0_cancel_during_slow_response_returns_promptly() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(path("/v1/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;
    let mut command = Command::new(HttpRequest::get(format!("{}/v1/slow", server.uri())).unwrap());
    cancel_after(command.cancellation_token(), Duration::from_millis(200));

    let started = Instant::now();
    let error = reqwest_executor(&fast_config())
        .execute(&mut command)
        .await
        .unwrap_err();

    assert!(error.is_cancelled());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn p0_shared_parent_token_cancels_every_command() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(path("/v1/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;
    let shutdown = CancellationToken::new();
    let executor = reqwest_executor(&fast_config());

    let mut handles = Vec::new();
    for _ in 0..4 {
        let executor = executor.clone();
        let token = shutdown.child_token();
        let endpoint = format!("{}/v1/slow", server.uri());
        handles.push(tokio::spawn(async move {
            let mut command =
                Command::new(HttpRequest::get(endpoint).unwrap()).with_cancellation(token);
            executor.execute(&mut command).await
        }));
    }
    cancel_after(shutdown.clone(), Duration::from_millis(200));

    for handle in handles {
        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("command did not observe cancellation")
            .unwrap();
        assert!(result.unwrap_err().is_cancelled());
    }
}

#[tokio::test]
async fn p0_already_cancelled_command_never_sends() {
    let Some((server, counter)) =
        flaky_provider_mock("/v1/servers", FlakyResponder::new(0, 200)).await
    else {
        return;
    };
    let mut command = Command::new(HttpRequest::get(format!("{}/v1/servers", server.uri())).unwrap());
    command.cancel();

    let error = reqwest_executor(&fast_config())
        .execute(&mut command)
        .await
        .unwrap_err();

    assert!(matches!(error, CommandError::Cancelled { attempts: 0 }));
    assert_eq!(counter.load(Ordering::SeqCst), 0);
}
