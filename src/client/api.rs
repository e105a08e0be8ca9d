//! The seam between pipeline stages and the remote API.

use async_trait::async_trait;

use super::ApiError;
use crate::model::{AnimalId, NormalizedRecord, Page, RawRecord};

/// Operations the pipeline needs from the animals API.
///
/// [`ApiClient`](super::ApiClient) implements this over HTTP. Implementations
/// must be safe to call from several fetch workers at once.
#[async_trait]
pub trait AnimalApi: Send + Sync {
    /// Fetches listing page `page` (1-indexed).
    async fn fetch_page(&self, page: u64) -> Result<Page, ApiError>;

    /// Fetches the full record of one animal.
    async fn fetch_animal(&self, id: AnimalId) -> Result<RawRecord, ApiError>;

    /// Uploads one batch of normalized records.
    async fn post_home(&self, batch: &[NormalizedRecord]) -> Result<(), ApiError>;
}
