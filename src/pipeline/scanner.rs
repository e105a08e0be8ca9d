//! Sequential pagination over the listing endpoint.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use super::error::ScanError;
use crate::client::AnimalApi;
use crate::model::AnimalId;

/// Walks listing pages from page 1 until the server runs out of items or pages.
pub struct PageScanner {
    api: Arc<dyn AnimalApi>,
}

impl PageScanner {
    /// Creates a scanner over `api`.
    #[must_use]
    pub fn new(api: Arc<dyn AnimalApi>) -> Self {
        Self { api }
    }

    /// Collects every identifier in page order, then item order.
    ///
    /// Stops on the first empty page, or once the current page reaches the
    /// declared `total_pages` (a missing `total_pages` means the current page
    /// is the last). A `total_pages` below the current page also stops.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Page`] if any page request fails; nothing collected
    /// so far is returned.
    #[instrument(skip(self))]
    pub async fn scan_all_identifiers(&self) -> Result<Vec<AnimalId>, ScanError> {
        let mut ids = Vec::new();
        let mut page = 1u64;

        loop {
            let listing = self
                .api
                .fetch_page(page)
                .await
                .map_err(|source| ScanError::Page { page, source })?;

            if listing.items.is_empty() {
                debug!(page, "empty page, end of listing");
                break;
            }

            let total_pages = listing.total_pages_or(page);
            ids.extend(listing.items.iter().map(|item| item.id));
            info!(
                page,
                total_pages,
                animals = listing.items.len(),
                "Fetched page {page}/{total_pages} ({} animals)",
                listing.items.len()
            );

            if page >= total_pages {
                break;
            }
            page += 1;
        }

        info!(total = ids.len(), "Found {} animals total", ids.len());
        Ok(ids)
    }
}
