//! Detail fetching for discovered identifiers.
//!
//! [`DetailFetcher`] turns a list of identifiers into full records, either one
//! at a time or through a bounded worker pool. The pool uses the same
//! semaphore-permit pattern as any other fan-out in this crate: a permit is
//! acquired before each spawn and released when the task finishes.
//!
//! # Failure semantics
//!
//! A single failed fetch fails the whole stage. In parallel mode the first
//! failure raises a shared cancellation flag, no further identifiers are
//! dispatched, the in-flight tasks are drained and the first observed error
//! is returned. Partial results are never returned.
//!
//! # Ordering
//!
//! Sequential mode keeps identifier order. Parallel mode returns records in
//! completion order.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, instrument, warn};

use super::error::FetchError;
use crate::client::AnimalApi;
use crate::model::{AnimalId, RawRecord};

/// Minimum allowed concurrency value.
pub(crate) const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub(crate) const MAX_CONCURRENCY: usize = 100;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// A progress line is logged every this many completed fetches.
const PROGRESS_LOG_INTERVAL: usize = 100;

/// Callback invoked with `(completed, total)` after each successful fetch.
pub type ProgressObserver = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// How details are fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// One request at a time, in identifier order.
    Sequential,
    /// Up to `concurrency` requests in flight.
    Parallel {
        /// Worker count (1-100).
        concurrency: usize,
    },
}

impl Default for FetchMode {
    fn default() -> Self {
        Self::Parallel {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::Parallel { concurrency } => write!(f, "parallel ({concurrency} workers)"),
        }
    }
}

/// Completed-fetch counter for one run.
#[derive(Default)]
pub struct FetchProgress {
    completed: AtomicUsize,
    observer: Option<ProgressObserver>,
}

impl fmt::Debug for FetchProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchProgress")
            .field("completed", &self.completed())
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl FetchProgress {
    /// Creates a counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of successful fetches so far.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.completed.store(0, Ordering::SeqCst);
    }

    /// Counts one success; returns the new count.
    fn record(&self, total: usize) -> usize {
        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        if completed % PROGRESS_LOG_INTERVAL == 0 || completed == total {
            info!(completed, total, "Progress: {completed}/{total} animals fetched");
        }
        if let Some(observer) = &self.observer {
            observer(completed, total);
        }
        completed
    }
}

/// Fetches full records for a list of identifiers.
pub struct DetailFetcher {
    api: Arc<dyn AnimalApi>,
    mode: FetchMode,
    progress: FetchProgress,
}

impl DetailFetcher {
    /// Creates a fetcher.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidConcurrency`] if a parallel mode asks for
    /// a worker count outside 1-100.
    #[instrument(level = "debug", skip(api))]
    pub fn new(api: Arc<dyn AnimalApi>, mode: FetchMode) -> Result<Self, FetchError> {
        if let FetchMode::Parallel { concurrency } = mode {
            if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
                return Err(FetchError::InvalidConcurrency { value: concurrency });
            }
        }

        debug!(%mode, "creating detail fetcher");

        Ok(Self {
            api,
            mode,
            progress: FetchProgress::new(),
        })
    }

    /// Registers a callback that sees every progress tick.
    #[must_use]
    pub fn with_observer(mut self, observer: ProgressObserver) -> Self {
        self.progress.observer = Some(observer);
        self
    }

    /// Returns the configured mode.
    #[must_use]
    pub fn mode(&self) -> FetchMode {
        self.mode
    }

    /// Returns the number of records fetched by the current or last run.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.progress.completed()
    }

    /// Fetches every identifier.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Animal`] for the first failed fetch,
    /// [`FetchError::Worker`] if a worker task panicked and
    /// [`FetchError::PoolClosed`] if the worker pool shut down.
    #[instrument(skip(self, ids), fields(count = ids.len(), mode = %self.mode))]
    pub async fn fetch_details(&self, ids: &[AnimalId]) -> Result<Vec<RawRecord>, FetchError> {
        self.progress.reset();
        if ids.is_empty() {
            debug!("no identifiers to fetch");
            return Ok(Vec::new());
        }

        info!("Fetching details for {} animals", ids.len());

        let records = match self.mode {
            FetchMode::Sequential => self.fetch_sequential(ids).await?,
            FetchMode::Parallel { concurrency } => self.fetch_parallel(ids, concurrency).await?,
        };

        info!(fetched = records.len(), "detail fetch complete");
        Ok(records)
    }

    async fn fetch_sequential(&self, ids: &[AnimalId]) -> Result<Vec<RawRecord>, FetchError> {
        let mut records = Vec::with_capacity(ids.len());
        for &id in ids {
            let record = self
                .api
                .fetch_animal(id)
                .await
                .map_err(|source| FetchError::Animal { id, source })?;
            records.push(record);
            self.progress.record(ids.len());
        }
        Ok(records)
    }

    async fn fetch_parallel(
        &self,
        ids: &[AnimalId],
        concurrency: usize,
    ) -> Result<Vec<RawRecord>, FetchError> {
        let total = ids.len();
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut workers: JoinSet<Result<RawRecord, FetchError>> = JoinSet::new();
        let mut records = Vec::with_capacity(total);
        let mut first_error: Option<FetchError> = None;

        for &id in ids {
            // Blocks while `concurrency` fetches are in flight.
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|_| FetchError::PoolClosed)?;

            while let Some(joined) = workers.try_join_next() {
                self.collect(joined, total, &mut records, &mut first_error);
            }
            if first_error.is_some() || cancelled.load(Ordering::SeqCst) {
                debug!(id, "fetch cancelled, remaining identifiers not dispatched");
                break;
            }

            let api = Arc::clone(&self.api);
            let cancelled = Arc::clone(&cancelled);
            workers.spawn(async move {
                let _permit = permit;
                let result = api
                    .fetch_animal(id)
                    .await
                    .map_err(|source| FetchError::Animal { id, source });
                if result.is_err() {
                    cancelled.store(true, Ordering::SeqCst);
                }
                result
            });
        }

        debug!(in_flight = workers.len(), "waiting for fetch workers");
        while let Some(joined) = workers.join_next().await {
            self.collect(joined, total, &mut records, &mut first_error);
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(records),
        }
    }

    fn collect(
        &self,
        joined: Result<Result<RawRecord, FetchError>, JoinError>,
        total: usize,
        records: &mut Vec<RawRecord>,
        first_error: &mut Option<FetchError>,
    ) {
        let error = match joined {
            Ok(Ok(record)) => {
                records.push(record);
                self.progress.record(total);
                return;
            }
            Ok(Err(error)) => error,
            Err(join_error) => FetchError::Worker(join_error),
        };

        if first_error.is_none() {
            warn!(error = %error, "animal fetch failed, cancelling remaining fetches");
            *first_error = Some(error);
        } else {
            debug!(error = %error, "additional fetch failure after cancellation");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::client::ApiError;
    use crate::model::{NormalizedRecord, Page};

    /// Answers detail requests from the id alone; ids in `failing` get a 500.
    struct FakeDetails {
        failing: HashSet<AnimalId>,
        delay: Duration,
        requested: Mutex<Vec<AnimalId>>,
        in_flight: AtomicUsize,
        peak_in_flight: AtomicUsize,
    }

    impl FakeDetails {
        fn new(failing: &[AnimalId]) -> Arc<Self> {
            Self::with_delay(failing, Duration::ZERO)
        }

        fn with_delay(failing: &[AnimalId], delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                failing: failing.iter().copied().collect(),
                delay,
                requested: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                peak_in_flight: AtomicUsize::new(0),
            })
        }

        fn requested(&self) -> Vec<AnimalId> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AnimalApi for FakeDetails {
        async fn fetch_page(&self, _page: u64) -> Result<Page, ApiError> {
            unreachable!("fetcher never scans")
        }

        async fn fetch_animal(&self, id: AnimalId) -> Result<RawRecord, ApiError> {
            self.requested.lock().unwrap().push(id);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.failing.contains(&id) {
                return Err(ApiError::Client {
                    url: format!("fake://animals/{id}"),
                    status: 500,
                });
            }
            Ok(json!({"id": id, "name": format!("animal-{id}")})
                .as_object()
                .unwrap()
                .clone())
        }

        async fn post_home(&self, _batch: &[NormalizedRecord]) -> Result<(), ApiError> {
            unreachable!("fetcher never uploads")
        }
    }

    fn ids_of(records: &[RawRecord]) -> Vec<AnimalId> {
        records
            .iter()
            .filter_map(|record| record.get("id").and_then(serde_json::Value::as_i64))
            .collect()
    }

    // ==================== Construction Tests ====================

    #[test]
    fn test_fetcher_rejects_zero_concurrency() {
        let result = DetailFetcher::new(FakeDetails::new(&[]), FetchMode::Parallel { concurrency: 0 });
        assert!(matches!(
            result,
            Err(FetchError::InvalidConcurrency { value: 0 })
        ));
    }

    #[test]
    fn test_fetcher_rejects_concurrency_above_limit() {
        let result =
            DetailFetcher::new(FakeDetails::new(&[]), FetchMode::Parallel { concurrency: 101 });
        assert!(matches!(
            result,
            Err(FetchError::InvalidConcurrency { value: 101 })
        ));
    }

    #[test]
    fn test_fetch_mode_default_is_ten_workers() {
        assert_eq!(FetchMode::default(), FetchMode::Parallel { concurrency: 10 });
    }

    // ==================== Sequential Tests ====================

    #[tokio::test]
    async fn test_sequential_preserves_identifier_order() {
        let api = FakeDetails::new(&[]);
        let fetcher = DetailFetcher::new(api.clone(), FetchMode::Sequential).unwrap();
        let records = fetcher.fetch_details(&[3, 1, 2]).await.unwrap();
        assert_eq!(ids_of(&records), vec![3, 1, 2]);
        assert_eq!(fetcher.completed(), 3);
    }

    #[tokio::test]
    async fn test_sequential_failure_stops_immediately() {
        let api = FakeDetails::new(&[2]);
        let fetcher = DetailFetcher::new(api.clone(), FetchMode::Sequential).unwrap();
        let result = fetcher.fetch_details(&[1, 2, 3]).await;
        assert!(matches!(result, Err(FetchError::Animal { id: 2, .. })));
        assert_eq!(api.requested(), vec![1, 2]);
    }

    // ==================== Parallel Tests ====================

    #[tokio::test]
    async fn test_parallel_returns_every_record() {
        let api = FakeDetails::new(&[]);
        let fetcher = DetailFetcher::new(api, FetchMode::Parallel { concurrency: 4 }).unwrap();
        let ids: Vec<AnimalId> = (1..=25).collect();
        let records = fetcher.fetch_details(&ids).await.unwrap();

        let mut fetched = ids_of(&records);
        fetched.sort_unstable();
        assert_eq!(fetched, ids);
        assert_eq!(fetcher.completed(), 25);
    }

    #[tokio::test]
    async fn test_parallel_failure_returns_error_not_partial_list() {
        let api = FakeDetails::new(&[2]);
        let fetcher = DetailFetcher::new(api, FetchMode::Parallel { concurrency: 3 }).unwrap();
        let result = fetcher.fetch_details(&[1, 2, 3]).await;
        assert!(matches!(result, Err(FetchError::Animal { id: 2, .. })));
    }

    #[tokio::test]
    async fn test_parallel_failure_stops_dispatching() {
        let api = FakeDetails::with_delay(&[1], Duration::from_millis(5));
        let fetcher = DetailFetcher::new(api.clone(), FetchMode::Parallel { concurrency: 1 }).unwrap();
        let ids: Vec<AnimalId> = (1..=50).collect();
        let result = fetcher.fetch_details(&ids).await;

        assert!(matches!(result, Err(FetchError::Animal { id: 1, .. })));
        // With one worker, the failing first fetch finishes before the next dispatch.
        assert_eq!(api.requested(), vec![1]);
    }

    #[tokio::test]
    async fn test_parallel_respects_concurrency_limit() {
        let api = FakeDetails::with_delay(&[], Duration::from_millis(10));
        let fetcher = DetailFetcher::new(api.clone(), FetchMode::Parallel { concurrency: 3 }).unwrap();
        let ids: Vec<AnimalId> = (1..=12).collect();
        fetcher.fetch_details(&ids).await.unwrap();

        let peak = api.peak_in_flight.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak in-flight {peak} exceeded limit");
    }

    #[tokio::test]
    async fn test_empty_identifier_list() {
        let fetcher = DetailFetcher::new(FakeDetails::new(&[]), FetchMode::default()).unwrap();
        assert!(fetcher.fetch_details(&[]).await.unwrap().is_empty());
    }

    // ==================== Progress Tests ====================

    #[tokio::test]
    async fn test_observer_sees_every_completion() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let fetcher = DetailFetcher::new(FakeDetails::new(&[]), FetchMode::Sequential)
            .unwrap()
            .with_observer(Arc::new(move |completed, total| {
                sink.lock().unwrap().push((completed, total));
            }));

        fetcher.fetch_details(&[10, 20, 30]).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[tokio::test]
    async fn test_progress_resets_between_runs() {
        let fetcher = DetailFetcher::new(FakeDetails::new(&[]), FetchMode::Sequential).unwrap();
        fetcher.fetch_details(&[1, 2]).await.unwrap();
        fetcher.fetch_details(&[3]).await.unwrap();
        assert_eq!(fetcher.completed(), 1);
    }
}
