//! Credentials must not appear in errors, `Debug` output or redirect targets.

use cloudcmd_core::filter::FilterChain;
use cloudcmd_core::{
    BasicAuthFilter, Command, CommandError, ExecutorConfig, HttpRequest, HttpResponse,
};
use wiremock::matchers::path;
use wiremock::{Mock, ResponseTemplate};

use crate::support::critical_utils::{fast_config, reqwest_executor};
use crate::support::socket_guard::start_mock_server_or_skip;

const PASSWORD: &str = "s3cret";
const TOKEN: &str = "YWxpY2U6czNjcmV0";

fn assert_clean(text: &str) {
    assert!(!text.contains(PASSWORD), "password leaked: {text}");
    assert!(!text.contains(TOKEN), "auth token leaked: {text}");
}

#[test]
fn p0_filtered_request_debug_redacts_authorization() {
    let chain = FilterChain::new().with(BasicAuthFilter::new("alice", PASSWORD));
    let request = chain
        .apply(HttpRequest::get("https://api.example.com/v1/servers").unwrap())
        .unwrap();

    assert!(request.header("Authorization").is_some());
    assert_clean(&format!("{request:?}"));
    assert_clean(&format!("{:?}", BasicAuthFilter::new("alice", PASSWORD)));
}

#[test]
fn p0_response_debug_redacts_set_cookie() {
    let response = HttpResponse::new(200).with_header("Set-Cookie", format!("session={TOKEN}"));
    assert_clean(&format!("{response:?}"));
}

#[tokio::test]
async fn p0_error_for_rejected_request_does_not_contain_credentials() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(path("/v1/servers"))
        .respond_with(ResponseTemplate::new(403).set_body_string("denied"))
        .mount(&server)
        .await;
    let executor = reqwest_executor(&fast_config()).with_filter(BasicAuthFilter::new("alice", PASSWORD));
    let mut command = Command::new(HttpRequest::get(format!("{}/v1/servers", server.uri())).unwrap());

    let error = executor
        .invoke(&mut command, |_| async { Ok(()) }, &cloudcmd_core::Rethrow)
        .await
        .unwrap_err();

    assert_eq!(error.status(), Some(403));
    assert_clean(&error.to_string());
    assert_clean(&format!("{error:?}"));
}

#[tokio::test]
async fn p0_exhausted_error_does_not_contain_credentials() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(path("/v1/servers"))
        .respond_with(ResponseTemplate::new(504))
        .mount(&server)
        .await;
    let config = ExecutorConfig {
        max_retries: 1,
        ..fast_config()
    };
    let executor = reqwest_executor(&config).with_filter(BasicAuthFilter::new("alice", PASSWORD));
    let mut command = Command::new(HttpRequest::get(format!("{}/v1/servers", server.uri())).unwrap());

    let error = executor.execute(&mut command).await.unwrap_err();

    assert!(matches!(error, CommandError::RetryExhausted { .. }));
    assert_clean(&error.to_string());
    assert_clean(&format!("{error:?}"));
    assert_clean(&format!("{command:?}"));
}

#[tokio::test]
async fn p0_redirect_keeps_credentials_off_the_command() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(path("/v1/servers"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/v2/servers"))
        .mount(&server)
        .await;
    Mock::given(path("/v2/servers"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    let executor = reqwest_executor(&fast_config()).with_filter(BasicAuthFilter::new("alice", PASSWORD));
    let mut command = Command::new(HttpRequest::get(format!("{}/v1/servers", server.uri())).unwrap());

    executor.execute(&mut command).await.unwrap();

    // The base request is never filtered, so it cannot carry the token.
    assert!(command.request().header("Authorization").is_none());
    assert_clean(&format!("{command:?}"));
}
