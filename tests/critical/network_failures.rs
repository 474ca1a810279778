//! Connection failures, read timeouts and bad redirects over a real socket.

use std::time::Duration;

use cloudcmd_core::{
    Command, CommandError, ExecutorConfig, HttpMethod, HttpRequest, TransportError,
};
use wiremock::matchers::path;
use wiremock::{Mock, ResponseTemplate};

use crate::support::critical_utils::{fast_config, reqwest_executor};
use crate::support::socket_guard::start_mock_server_or_skip;

#[tokio::test]
async fn p0_refused_connection_exhausts_budget_for_idempotent_command() {
    let config = ExecutorConfig {
        max_retries: 2,
        ..fast_config()
    };
    // Port 9 (discard) is closed on test hosts.
    let mut command = Command::new(HttpRequest::get("http://127.0.0.1:9/v1/servers").unwrap());

    let error = reqwest_executor(&config)
        .execute(&mut command)
        .await
        .unwrap_err();

    match error {
        CommandError::RetryExhausted {
            attempts,
            last_status: None,
            last_error: Some(TransportError::Connection { .. }),
            ..
        } => assert_eq!(attempts, 3),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn p0_refused_connection_is_terminal_for_non_idempotent_command() {
    let request = HttpRequest::builder(HttpMethod::Post, "http://127.0.0.1:9/v1/servers")
        .payload("create")
        .build()
        .unwrap();
    let mut command = Command::new(request);

    let error = reqwest_executor(&fast_config())
        .execute(&mut command)
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        CommandError::Transport(TransportError::Connection { .. })
    ));
    assert_eq!(command.attempts(), 1);
}

#[tokio::test]
async fn p0_read_timeout_is_retried_then_exhausted() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(path("/v1/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;
    let config = ExecutorConfig {
        max_retries: 1,
        read_timeout_secs: 1,
        ..fast_config()
    };
    let mut command = Command::new(HttpRequest::get(format!("{}/v1/slow", server.uri())).unwrap());

    let error = reqwest_executor(&config)
        .execute(&mut command)
        .await
        .unwrap_err();

    assert!(
        matches!(
            error,
            CommandError::RetryExhausted {
                attempts: 2,
                last_error: Some(TransportError::Timeout { .. }),
                ..
            }
        ),
        "{error:?}"
    );
}

#[tokio::test]
async fn p0_redirect_to_unsupported_scheme_is_rejected() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(path("/v1/objects/a"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", "file:///etc/passwd"),
        )
        .expect(1)
        .mount(&server)
        .await;
    let mut command =
        Command::new(HttpRequest::get(format!("{}/v1/objects/a", server.uri())).unwrap());

    let error = reqwest_executor(&fast_config())
        .execute(&mut command)
        .await
        .unwrap_err();

    assert!(matches!(error, CommandError::InvalidRedirect { .. }));
    server.verify().await;
}

#[tokio::test]
async fn p0_redirect_loop_stops_at_limit() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/loop"))
        .expect(4)
        .mount(&server)
        .await;
    let config = ExecutorConfig {
        max_redirects: 3,
        ..fast_config()
    };
    let mut command = Command::new(HttpRequest::get(format!("{}/loop", server.uri())).unwrap());

    let error = reqwest_executor(&config)
        .execute(&mut command)
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        CommandError::TooManyRedirects {
            max_redirects: 3,
            ..
        }
    ));
    server.verify().await;
}
