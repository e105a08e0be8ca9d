//! The ETL stages and their orchestration.
//!
//! A run is strictly sequential at the stage level:
//!
//! 1. [`PageScanner`] walks listing pages and collects identifiers
//! 2. [`DetailFetcher`] fetches each full record, optionally in parallel
//! 3. [`transform_batch`](crate::transform::transform_batch) normalizes them
//! 4. [`BatchLoader`] uploads them in fixed-size batches
//!
//! [`Pipeline`] drives the four stages and tags any failure with the stage
//! it happened in.

mod error;
mod fetcher;
mod loader;
mod orchestrator;
mod scanner;

pub use error::{FetchError, LoadError, PipelineError, ScanError, StageError};
pub use fetcher::{DEFAULT_CONCURRENCY, DetailFetcher, FetchMode, FetchProgress, ProgressObserver};
pub use loader::{BatchLoader, DEFAULT_BATCH_SIZE};
pub use orchestrator::{Pipeline, PipelineConfig, PipelineStage, PipelineSummary};
pub use scanner::PageScanner;
