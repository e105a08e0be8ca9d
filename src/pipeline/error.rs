//! Error types for the pipeline stages.

use thiserror::Error;
use tokio::task::JoinError;

use super::fetcher::{MAX_CONCURRENCY, MIN_CONCURRENCY};
use super::orchestrator::PipelineStage;
use crate::client::ApiError;
use crate::model::AnimalId;

/// Errors from the page scan.
#[derive(Debug, Error)]
pub enum ScanError {
    /// A listing page could not be fetched or decoded.
    #[error("failed to fetch page {page}: {source}")]
    Page {
        /// The page being requested.
        page: u64,
        /// The underlying API error.
        #[source]
        source: ApiError,
    },
}

/// Errors from the detail fetch stage.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Invalid worker count.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// One animal could not be fetched; the whole fetch is abandoned.
    #[error("failed to fetch animal {id}: {source}")]
    Animal {
        /// The animal whose fetch failed.
        id: AnimalId,
        /// The underlying API error.
        #[source]
        source: ApiError,
    },

    /// A fetch worker panicked or was cancelled.
    #[error("fetch worker failed: {0}")]
    Worker(#[from] JoinError),

    /// The worker pool semaphore was closed unexpectedly.
    #[error("worker pool closed unexpectedly")]
    PoolClosed,
}

/// Errors from the batch load stage.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Batch size of zero.
    #[error("invalid batch size {value}: must be at least 1")]
    InvalidBatchSize {
        /// The invalid value that was provided.
        value: usize,
    },

    /// A batch upload failed. Earlier batches stay loaded.
    #[error("failed to load batch {batch}/{total_batches} ({loaded} animals already loaded): {source}")]
    Batch {
        /// 1-indexed number of the failed batch.
        batch: usize,
        /// Number of batches in the run.
        total_batches: usize,
        /// Records loaded by fully successful earlier batches.
        loaded: usize,
        /// The underlying API error.
        #[source]
        source: ApiError,
    },
}

impl LoadError {
    /// Records already loaded when the error happened.
    #[must_use]
    pub fn loaded(&self) -> usize {
        match self {
            Self::InvalidBatchSize { .. } => 0,
            Self::Batch { loaded, .. } => *loaded,
        }
    }
}

/// Any stage-level failure.
#[derive(Debug, Error)]
pub enum StageError {
    /// Scan failure.
    #[error(transparent)]
    Scan(#[from] ScanError),
    /// Fetch failure.
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// Load failure.
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// A fatal pipeline failure, tagged with the stage it happened in.
#[derive(Debug, Error)]
#[error("pipeline failed during {stage}: {source}")]
pub struct PipelineError {
    stage: PipelineStage,
    loaded: usize,
    #[source]
    source: StageError,
}

impl PipelineError {
    pub(crate) fn new(stage: PipelineStage, loaded: usize, source: StageError) -> Self {
        Self {
            stage,
            loaded,
            source,
        }
    }

    /// The stage that was running when the failure happened.
    #[must_use]
    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    /// Records acknowledged by the destination before the failure.
    #[must_use]
    pub fn loaded(&self) -> usize {
        self.loaded
    }

    /// The originating stage error.
    #[must_use]
    pub fn stage_error(&self) -> &StageError {
        &self.source
    }
}
