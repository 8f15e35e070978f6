//! Skips wiremock-backed tests in sandboxes that forbid binding localhost.

use std::net::TcpListener;
use std::panic::Location;

use wiremock::MockServer;

/// Environment switch that turns a skipped socket test into a failure.
const REQUIRE_SOCKET_TESTS_VAR: &str = "CATALOGUE_SYNC_REQUIRE_SOCKET_TESTS";

#[must_use]
pub fn socket_tests_required() -> bool {
    std::env::var(REQUIRE_SOCKET_TESTS_VAR)
        .ok()
        .is_some_and(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

#[track_caller]
#[must_use]
pub fn should_skip_socket_bound_test() -> bool {
    if TcpListener::bind("127.0.0.1:0").is_ok() {
        return false;
    }

    let location = Location::caller();
    let message = format!(
        "[socket-bound-test] cannot bind localhost socket at {}:{}; wiremock-based test cannot run here",
        location.file(),
        location.line()
    );
    assert!(
        !socket_tests_required(),
        "{message}. Unset {REQUIRE_SOCKET_TESTS_VAR} to allow skipping."
    );

    eprintln!("{message}. Skipping test. Set {REQUIRE_SOCKET_TESTS_VAR}=1 to fail instead.");
    true
}

pub async fn start_mock_server_or_skip() -> Option<MockServer> {
    if should_skip_socket_bound_test() {
        None
    } else {
        Some(MockServer::start().await)
    }
}
