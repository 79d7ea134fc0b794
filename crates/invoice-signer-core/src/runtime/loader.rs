// crates/invoice-signer-core/src/runtime/loader.rs
// ============================================================================
// Module: Batch Loader
// Description: Loads bounded pages of claimed records in id order.
// Purpose: Feed the worker pool one deterministic page at a time.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Pages are capped at [`MAX_PAGE_SIZE`] rows. The loader re-sorts and
//! truncates whatever the store returns so page ordering holds even for
//! stores that do not honor the ordering contract.

use crate::core::record::SignableRecord;
use crate::core::selector::ClaimScope;
use crate::interfaces::SigningStore;
use crate::interfaces::StoreError;

/// Upper bound on rows per page.
pub const MAX_PAGE_SIZE: usize = 800;

/// Loads claimed pages for a scope.
#[derive(Debug, Clone, Copy)]
pub struct BatchLoader {
    /// Rows per page.
    page_size: usize,
}

impl BatchLoader {
    /// Creates a loader; the page size is clamped to `1 ..= MAX_PAGE_SIZE`.
    #[must_use]
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Returns the effective page size.
    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    /// Loads the next page. An empty page is the terminal signal.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store query fails.
    pub fn load_page<S: SigningStore + ?Sized>(
        &self,
        store: &S,
        scope: &ClaimScope,
    ) -> Result<Vec<SignableRecord>, StoreError> {
        let mut page = store.load_claimed_page(scope, self.page_size)?;
        page.sort_by(|left, right| left.record_id.cmp(&right.record_id));
        page.truncate(self.page_size);
        Ok(page)
    }
}
