//! Stage sequencing for one ETL run.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, instrument};

use super::error::{PipelineError, StageError};
use super::fetcher::{DetailFetcher, FetchMode, ProgressObserver};
use super::loader::{BatchLoader, DEFAULT_BATCH_SIZE};
use super::scanner::PageScanner;
use crate::client::AnimalApi;
use crate::transform::transform_batch;

/// Where a run currently is.
///
/// Moves forward only: `Scanning → Fetching → Transforming → Loading → Done`,
/// or from any active stage to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    /// Not started yet.
    Idle,
    /// Walking listing pages.
    Scanning,
    /// Fetching full records.
    Fetching,
    /// Normalizing records.
    Transforming,
    /// Uploading batches.
    Loading,
    /// Finished successfully.
    Done,
    /// Stopped on an error.
    Failed,
}

impl PipelineStage {
    /// Lowercase stage name used in logs and error messages.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::Fetching => "fetching",
            Self::Transforming => "transforming",
            Self::Loading => "loading",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage tuning for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// How details are fetched.
    pub fetch_mode: FetchMode,
    /// Records per upload request.
    pub batch_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch_mode: FetchMode::default(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Counts from a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSummary {
    /// Identifiers found by the scan.
    pub discovered: usize,
    /// Full records fetched.
    pub fetched: usize,
    /// Records normalized.
    pub transformed: usize,
    /// Records acknowledged by the destination.
    pub loaded: usize,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

/// Runs scan, fetch, transform and load in order, stopping at the first failure.
pub struct Pipeline {
    scanner: PageScanner,
    fetcher: DetailFetcher,
    loader: BatchLoader,
    stage: PipelineStage,
}

impl Pipeline {
    /// Builds every stage over one shared API handle.
    ///
    /// # Errors
    ///
    /// Returns a [`StageError`] if the fetch concurrency or batch size is invalid.
    pub fn new(api: Arc<dyn AnimalApi>, config: PipelineConfig) -> Result<Self, StageError> {
        let scanner = PageScanner::new(Arc::clone(&api));
        let fetcher = DetailFetcher::new(Arc::clone(&api), config.fetch_mode)?;
        let loader = BatchLoader::new(api, config.batch_size)?;
        Ok(Self::from_stages(scanner, fetcher, loader))
    }

    /// Assembles a pipeline from already-built stages.
    #[must_use]
    pub fn from_stages(scanner: PageScanner, fetcher: DetailFetcher, loader: BatchLoader) -> Self {
        Self {
            scanner,
            fetcher,
            loader,
            stage: PipelineStage::Idle,
        }
    }

    /// Attaches a fetch progress observer.
    #[must_use]
    pub fn with_fetch_observer(mut self, observer: ProgressObserver) -> Self {
        self.fetcher = self.fetcher.with_observer(observer);
        self
    }

    /// Returns the current stage.
    #[must_use]
    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    /// Executes one full run.
    ///
    /// # Errors
    ///
    /// Returns a [`PipelineError`] naming the stage that failed. A load
    /// failure also reports how many records were delivered before it.
    #[instrument(skip(self))]
    pub async fn run(&mut self) -> Result<PipelineSummary, PipelineError> {
        let started = Instant::now();
        info!(
            fetch_mode = %self.fetcher.mode(),
            batch_size = self.loader.batch_size(),
            "Starting ETL pipeline"
        );

        self.enter(PipelineStage::Scanning);
        let scanned = self.scanner.scan_all_identifiers().await;
        let ids = match scanned {
            Ok(ids) => ids,
            Err(e) => return Err(self.fail(e.into(), 0)),
        };

        self.enter(PipelineStage::Fetching);
        let fetched = self.fetcher.fetch_details(&ids).await;
        let raw = match fetched {
            Ok(raw) => raw,
            Err(e) => return Err(self.fail(e.into(), 0)),
        };

        self.enter(PipelineStage::Transforming);
        let normalized = transform_batch(&raw);
        info!("Transformed {} animals", normalized.len());

        self.enter(PipelineStage::Loading);
        let load_result = self.loader.load(&normalized).await;
        let loaded = match load_result {
            Ok(loaded) => loaded,
            Err(e) => {
                let loaded = e.loaded();
                return Err(self.fail(e.into(), loaded));
            }
        };

        self.enter(PipelineStage::Done);
        let summary = PipelineSummary {
            discovered: ids.len(),
            fetched: raw.len(),
            transformed: normalized.len(),
            loaded,
            elapsed: started.elapsed(),
        };
        info!(
            discovered = summary.discovered,
            loaded = summary.loaded,
            elapsed_ms = u64::try_from(summary.elapsed.as_millis()).unwrap_or(u64::MAX),
            "ETL pipeline completed successfully"
        );
        Ok(summary)
    }

    fn enter(&mut self, stage: PipelineStage) {
        info!(from = %self.stage, to = %stage, "entering stage");
        self.stage = stage;
    }

    fn fail(&mut self, source: StageError, loaded: usize) -> PipelineError {
        let stage = self.stage;
        self.stage = PipelineStage::Failed;
        error!(%stage, loaded, error = %source, "pipeline stage failed");
        PipelineError::new(stage, loaded, source)
    }
}
