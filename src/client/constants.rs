//! Constants for the transport client (endpoints, timeouts).

/// Default base URL of the animals API.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3123";

/// Default per-request timeout (60 seconds), covering connect, send and body read.
pub const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Default HTTP connect timeout (10 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Listing endpoint; the page number is passed as the `page` query parameter.
pub const ANIMALS_PATH: &str = "/animals/v1/animals";

/// Upload endpoint for normalized batches.
pub const HOME_PATH: &str = "/animals/v1/home";

/// HTTP status codes that are retried with backoff. Every other non-2xx status fails at once.
pub const RETRYABLE_STATUSES: [u16; 4] = [500, 502, 503, 504];

/// User-Agent sent with every request.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("animal-etl/{version}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_contains_crate_version() {
        let ua = default_user_agent();
        assert_eq!(ua, format!("animal-etl/{}", env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_retryable_statuses_are_server_errors() {
        assert!(RETRYABLE_STATUSES.iter().all(|s| (500..600).contains(s)));
        assert!(!RETRYABLE_STATUSES.contains(&501));
    }
}
