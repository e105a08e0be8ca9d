//! Transport client for the animals API.
//!
//! This module provides [`ApiClient`], a JSON-over-HTTP client with a fixed
//! per-request timeout and retry with exponential backoff for transient
//! failures, plus the [`AnimalApi`] trait the pipeline stages depend on.
//!
//! # Retry behavior
//!
//! - Network errors, timeouts and HTTP 500/502/503/504 are retried
//! - Any other non-success status fails after one attempt
//! - Up to 5 attempts with backoff `min(30s, 2s * 2^(n-1))` by default

mod api;
mod constants;
mod error;
mod http;
mod retry;

pub use api::AnimalApi;
pub use constants::{
    ANIMALS_PATH, CONNECT_TIMEOUT_SECS, DEFAULT_BASE_URL, HOME_PATH, REQUEST_TIMEOUT_SECS,
    RETRYABLE_STATUSES,
};
pub use error::{ApiError, RequestError};
pub use http::{ApiClient, ClientSettings};
pub use retry::{
    DEFAULT_MAX_ATTEMPTS, FailureType, RetryDecision, RetryPolicy, classify_error, run_with_retry,
};

// Note: no module-local Result aliases. Use `Result<T, ApiError>` explicitly in signatures.
