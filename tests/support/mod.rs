//! Shared helpers for integration tests.

pub mod socket_guard;

/// Starts a mock server or returns early from the calling test.
macro_rules! require_mock_server {
    () => {{
        let Some(mock_server) = $crate::support::socket_guard::start_mock_server_or_skip().await
        else {
            return;
        };
        mock_server
    }};
}
