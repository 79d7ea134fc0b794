// crates/invoice-signer-core/src/runtime/persister.rs
// ============================================================================
// Module: Result Persister
// Description: Bulk delta write for one signed page.
// Purpose: Append a page's signed rows through the store gateway.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! One call per page; failures are not retried here and propagate to the
//! engine's abort path.

use crate::core::delta::SignedResult;
use crate::interfaces::SigningStore;
use crate::interfaces::StoreError;

/// Writes signed deltas for a page.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultPersister;

impl ResultPersister {
    /// Persists the page's signed rows and returns the number written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the delta insert fails.
    pub fn persist<S: SigningStore + ?Sized>(
        &self,
        store: &S,
        results: &[SignedResult],
    ) -> Result<usize, StoreError> {
        if results.is_empty() {
            return Ok(0);
        }
        store.insert_delta(results)?;
        Ok(results.len())
    }
}
