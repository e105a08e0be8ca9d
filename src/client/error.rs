//! Error types for the transport client.
//!
//! [`RequestError`] describes one failed HTTP attempt. [`ApiError`] is what
//! callers see once the retry policy has finished with a request: either the
//! transient failure that survived every attempt, or the permanent failure
//! that stopped retrying early.

use thiserror::Error;

use super::constants::RETRYABLE_STATUSES;

/// Errors from a single HTTP attempt.
#[derive(Debug, Error)]
pub enum RequestError {
    /// Network-level error (DNS resolution, connection refused, reset, body read failure).
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL that was requested.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Response body was not the JSON the caller expected.
    #[error("invalid JSON from {url}: {source}")]
    Decode {
        /// The URL whose body failed to decode.
        url: String,
        /// The underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// The endpoint URL could not be built from the base URL.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The offending URL text.
        url: String,
    },
}

impl RequestError {
    /// Creates a network error from a reqwest error, promoting timeouts.
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { url: url.into() }
        } else {
            Self::Network {
                url: url.into(),
                source,
            }
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates a decode error.
    pub fn decode(url: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            url: url.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }
}

/// Errors surfaced by [`ApiClient`](super::ApiClient) after retry handling.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network failure, timeout or retryable 5xx that persisted through every attempt.
    #[error("transport failure after {attempts} attempt(s): {source}")]
    Transport {
        /// Number of attempts made.
        attempts: u32,
        /// The last attempt's error.
        #[source]
        source: RequestError,
    },

    /// Non-retryable HTTP status (4xx, or a 5xx outside the retryable set).
    #[error("HTTP {status} from {url} (not retried)")]
    Client {
        /// The URL that rejected the request.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Response was not valid JSON, or not the shape the endpoint promises.
    #[error("invalid response from {url}: {source}")]
    Decode {
        /// The URL whose body failed to decode.
        url: String,
        /// The underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// Endpoint URL could not be built.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The offending URL text.
        url: String,
    },

    /// The underlying HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

impl ApiError {
    /// Converts the final attempt's error into the caller-facing error.
    #[must_use]
    pub fn from_final_attempt(error: RequestError, attempts: u32) -> Self {
        match error {
            RequestError::HttpStatus { url, status } if !RETRYABLE_STATUSES.contains(&status) => {
                Self::Client { url, status }
            }
            RequestError::Decode { url, source } => Self::Decode { url, source },
            RequestError::InvalidUrl { url } => Self::InvalidUrl { url },
            other => Self::Transport {
                attempts,
                source: other,
            },
        }
    }

    /// Wraps a shape mismatch found after a successful JSON decode.
    pub fn decode(url: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            url: url.into(),
            source,
        }
    }

    /// Returns the HTTP status code when the failure came from a status response.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Client { status, .. }
            | Self::Transport {
                source: RequestError::HttpStatus { status, .. },
                ..
            } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` for failures that were retried until the attempt budget ran out.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn json_error() -> serde_json::Error {
        serde_json::from_str::<serde_json::Value>("{not json").unwrap_err()
    }

    #[test]
    fn test_request_error_http_status_display() {
        let error = RequestError::http_status("http://localhost/animals", 503);
        let msg = error.to_string();
        assert!(msg.contains("503"), "Expected '503' in: {msg}");
        assert!(msg.contains("http://localhost/animals"), "Expected URL in: {msg}");
    }

    #[test]
    fn test_final_attempt_404_becomes_client_error() {
        let error = ApiError::from_final_attempt(RequestError::http_status("http://a", 404), 1);
        assert!(matches!(error, ApiError::Client { status: 404, .. }));
        assert_eq!(error.status(), Some(404));
        assert!(!error.is_transport());
    }

    #[test]
    fn test_final_attempt_501_is_not_retryable_status() {
        let error = ApiError::from_final_attempt(RequestError::http_status("http://a", 501), 1);
        assert!(matches!(error, ApiError::Client { status: 501, .. }));
    }

    #[test]
    fn test_final_attempt_503_becomes_transport_error() {
        let error = ApiError::from_final_attempt(RequestError::http_status("http://a", 503), 5);
        assert!(error.is_transport());
        assert_eq!(error.status(), Some(503));
        let msg = error.to_string();
        assert!(msg.contains("5 attempt"), "Expected attempt count in: {msg}");
    }

    #[test]
    fn test_final_attempt_timeout_becomes_transport_error() {
        let error = ApiError::from_final_attempt(RequestError::timeout("http://a"), 5);
        assert!(matches!(error, ApiError::Transport { attempts: 5, .. }));
        assert_eq!(error.status(), None);
    }

    #[test]
    fn test_final_attempt_decode_stays_decode() {
        let error = ApiError::from_final_attempt(RequestError::decode("http://a", json_error()), 1);
        assert!(matches!(error, ApiError::Decode { .. }));
    }
}
