//! Skips wiremock tests where the sandbox forbids binding a localhost socket.

use std::net::TcpListener;
use std::panic::Location;

use wiremock::MockServer;

const REQUIRE_SOCKETS_ENV: &str = "ANIMAL_ETL_REQUIRE_SOCKET_TESTS";

/// `true` when CI asked for socket tests to fail instead of skip.
#[must_use]
pub fn socket_tests_required() -> bool {
    std::env::var(REQUIRE_SOCKETS_ENV)
        .ok()
        .is_some_and(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

/// Starts a mock server, or returns `None` after logging why the test is skipped.
///
/// # Panics
///
/// When sockets are unavailable and [`socket_tests_required`] is set.
#[track_caller]
pub fn start_mock_server_or_skip() -> impl Future<Output = Option<MockServer>> {
    let bindable = TcpListener::bind("127.0.0.1:0").is_ok();
    let caller = Location::caller();

    if !bindable {
        let message = format!(
            "[socket-bound-test] {}:{} cannot bind a localhost socket",
            caller.file(),
            caller.line()
        );
        assert!(
            !socket_tests_required(),
            "{message}; unset {REQUIRE_SOCKETS_ENV} to allow skipping"
        );
        eprintln!("{message}; skipping. Set {REQUIRE_SOCKETS_ENV}=1 to fail instead.");
    }

    async move {
        if bindable {
            Some(MockServer::start().await)
        } else {
            None
        }
    }
}
