//! Batched upload of normalized records.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use super::error::LoadError;
use crate::client::AnimalApi;
use crate::model::NormalizedRecord;

/// Default number of records per upload request.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Uploads records in fixed-size consecutive batches, in order.
///
/// Batches are sent strictly one after another. A failed batch stops the
/// load; earlier batches stay delivered.
pub struct BatchLoader {
    api: Arc<dyn AnimalApi>,
    batch_size: usize,
}

impl BatchLoader {
    /// Creates a loader.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::InvalidBatchSize`] if `batch_size` is zero.
    pub fn new(api: Arc<dyn AnimalApi>, batch_size: usize) -> Result<Self, LoadError> {
        if batch_size == 0 {
            return Err(LoadError::InvalidBatchSize { value: batch_size });
        }
        Ok(Self { api, batch_size })
    }

    /// Returns the configured batch size.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Uploads every record and returns how many were loaded.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Batch`] for the first failed batch, carrying its
    /// 1-indexed number and the count already loaded.
    #[instrument(skip(self, records), fields(count = records.len(), batch_size = self.batch_size))]
    pub async fn load(&self, records: &[NormalizedRecord]) -> Result<usize, LoadError> {
        if records.is_empty() {
            debug!("nothing to load");
            return Ok(0);
        }

        let total_batches = records.len().div_ceil(self.batch_size);
        info!(
            "Loading {} animals in batches of {}",
            records.len(),
            self.batch_size
        );

        let mut loaded = 0;
        for (index, batch) in records.chunks(self.batch_size).enumerate() {
            let batch_number = index + 1;
            self.api
                .post_home(batch)
                .await
                .map_err(|source| LoadError::Batch {
                    batch: batch_number,
                    total_batches,
                    loaded,
                    source,
                })?;
            loaded += batch.len();
            info!(
                batch = batch_number,
                total_batches,
                size = batch.len(),
                "Batch {batch_number}/{total_batches} loaded ({} animals)",
                batch.len()
            );
        }

        info!(loaded, "Successfully loaded {loaded} animals");
        Ok(loaded)
    }
}
