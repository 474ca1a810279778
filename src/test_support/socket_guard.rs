//! Skips wiremock-backed tests where loopback sockets cannot be bound.
//!
//! Shared with the integration tests through `#[path]` in
//! `tests/support/mod.rs`.

use std::net::TcpListener;
use std::panic::Location;

use wiremock::MockServer;

/// Set to `1`, `true` or `yes` to turn a skip into a failure (CI).
const REQUIRE_SOCKETS_ENV: &str = "CLOUDCMD_REQUIRE_SOCKET_TESTS";

fn sockets_required() -> bool {
    std::env::var(REQUIRE_SOCKETS_ENV)
        .ok()
        .is_some_and(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

/// Starts a mock server, or returns `None` when the environment forbids
/// binding `127.0.0.1`.
///
/// # Panics
///
/// Panics instead of skipping when `CLOUDCMD_REQUIRE_SOCKET_TESTS` is set.
#[track_caller]
pub fn start_mock_server_or_skip() -> impl Future<Output = Option<MockServer>> {
    let caller = Location::caller();
    let bindable = TcpListener::bind("127.0.0.1:0").is_ok();
    async move {
        if bindable {
            return Some(MockServer::start().await);
        }
        let message = format!(
            "[socket-bound-test] {}:{} cannot bind a loopback socket for the mock provider",
            caller.file(),
            caller.line()
        );
        assert!(!sockets_required(), "{message} ({REQUIRE_SOCKETS_ENV} is set)");
        eprintln!("{message}; skipping. Set {REQUIRE_SOCKETS_ENV}=1 to fail instead.");
        None
    }
}
