//! Animal ETL Library
//!
//! This library extracts animal records from a paginated HTTP API, normalizes
//! their `friends` and `born_at` fields, and loads them back in batches.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`client`] - JSON transport with timeout and retry, plus the [`AnimalApi`] seam
//! - [`model`] - Wire types shared by the stages
//! - [`transform`] - Pure field normalization
//! - [`pipeline`] - Scan, fetch, load stages and the orchestrating [`Pipeline`]

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod model;
pub mod pipeline;
pub mod transform;

// Re-export commonly used types
pub use client::{AnimalApi, ApiClient, ApiError, ClientSettings, RetryPolicy};
pub use model::{AnimalId, NormalizedRecord, Page, RawRecord};
pub use pipeline::{
    BatchLoader, DetailFetcher, FetchMode, PageScanner, Pipeline, PipelineConfig, PipelineError,
    PipelineStage, PipelineSummary,
};
pub use transform::{transform_animal, transform_batch};
