// crates/invoice-signer-core/src/runtime/store.rs
// ============================================================================
// Module: Invoice Signer In-Memory Store
// Description: Mutex-guarded in-memory signing store for tests and demos.
// Purpose: Provide a deterministic SigningStore with failure injection.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! [`InMemorySigningStore`] keeps records, customer profiles, providers, and
//! persisted deltas in ordered maps behind one mutex, so every operation is
//! atomic. Failures can be injected per operation to exercise abort and
//! recovery paths. It is not intended for production use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::core::delta::SignedResult;
use crate::core::identifiers::ActorId;
use crate::core::identifiers::RecordId;
use crate::core::profile::CustomerProfile;
use crate::core::record::ClaimState;
use crate::core::record::RecordState;
use crate::core::record::SignableRecord;
use crate::core::record::SuccessState;
use crate::core::selector::ClaimScope;
use crate::interfaces::ClaimOutcome;
use crate::interfaces::SigningStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Failure Injection
// ============================================================================

/// Store operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StoreOperation {
    /// `count_claimed`.
    Count,
    /// `mark_claimed` and `claim_exclusive`.
    Mark,
    /// `load_claimed_page`.
    Load,
    /// `insert_delta`.
    InsertDelta,
    /// `clear_claims`.
    Clear,
}

// ============================================================================
// SECTION: State
// ============================================================================

/// Record plus its markers.
#[derive(Debug, Clone)]
struct StoredRecord {
    /// Record payload.
    record: SignableRecord,
    /// Claim and success markers.
    state: RecordState,
}

/// Store contents.
#[derive(Debug, Default)]
struct InMemoryState {
    /// Records keyed by id.
    records: BTreeMap<RecordId, StoredRecord>,
    /// Customer profiles keyed by customer id.
    customers: BTreeMap<ActorId, CustomerProfile>,
    /// Provider contact emails keyed by provider id.
    providers: BTreeMap<String, String>,
    /// Persisted delta rows.
    deltas: Vec<SignedResult>,
    /// Calls observed per operation.
    calls: BTreeMap<StoreOperation, usize>,
    /// One-based call index at which each operation fails.
    failures: BTreeMap<StoreOperation, usize>,
}

impl InMemoryState {
    /// Records a call and returns an error when it is scheduled to fail.
    fn observe(&mut self, operation: StoreOperation) -> Result<(), StoreError> {
        let calls = self.calls.entry(operation).or_insert(0);
        *calls += 1;
        if self.failures.get(&operation) == Some(&*calls) {
            return Err(StoreError::Io(format!("injected {operation:?} failure")));
        }
        Ok(())
    }

    /// Counts claimed rows in scope.
    fn count_claimed(&self, scope: &ClaimScope) -> usize {
        self.records
            .values()
            .filter(|stored| stored.state.claim == ClaimState::Claimed && scope.selects(&stored.record))
            .count()
    }

    /// Marks eligible rows in scope, lowest ids first.
    fn mark_claimed(&mut self, scope: &ClaimScope) -> usize {
        let limit = scope.quantity.unwrap_or(usize::MAX);
        let mut marked = 0;
        for stored in self.records.values_mut() {
            if marked >= limit {
                break;
            }
            if stored.state.claim == ClaimState::Unclaimed
                && stored.state.success != SuccessState::Done
                && scope.selects(&stored.record)
            {
                stored.state.claim = ClaimState::Claimed;
                marked += 1;
            }
        }
        marked
    }

    /// Returns the record with provider contact data joined in.
    fn joined(&self, record: &SignableRecord) -> SignableRecord {
        let mut joined = record.clone();
        let provider_id = record
            .counterpart_id
            .as_deref()
            .and_then(|counterpart| self.customers.get(&ActorId::new(counterpart)))
            .and_then(|customer| customer.provider_id.clone())
            .filter(|provider| !provider.is_empty());
        joined.provider_email =
            provider_id.as_ref().and_then(|provider| self.providers.get(provider).cloned());
        joined.provider_id = provider_id;
        joined
    }
}

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// In-memory signing store for tests and examples.
#[derive(Debug, Default, Clone)]
pub struct InMemorySigningStore {
    /// Shared state protected by a mutex.
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemorySigningStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the shared state.
    fn lock(&self) -> Result<MutexGuard<'_, InMemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Store("signing store mutex poisoned".to_string()))
    }

    /// Inserts or replaces a record in `(Unclaimed, NotDone)` state.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store mutex is poisoned.
    pub fn insert_record(&self, record: SignableRecord) -> Result<(), StoreError> {
        self.insert_record_with_state(record, RecordState::PENDING)
    }

    /// Inserts or replaces a record with explicit markers.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store mutex is poisoned.
    pub fn insert_record_with_state(
        &self,
        record: SignableRecord,
        state: RecordState,
    ) -> Result<(), StoreError> {
        self.lock()?.records.insert(
            record.record_id.clone(),
            StoredRecord {
                record,
                state,
            },
        );
        Ok(())
    }

    /// Inserts or replaces a customer profile.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store mutex is poisoned.
    pub fn insert_customer(&self, profile: CustomerProfile) -> Result<(), StoreError> {
        self.lock()?.customers.insert(profile.customer_id.clone(), profile);
        Ok(())
    }

    /// Inserts or replaces a provider contact email.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store mutex is poisoned.
    pub fn insert_provider(&self, provider_id: &str, email: &str) -> Result<(), StoreError> {
        self.lock()?.providers.insert(provider_id.to_string(), email.to_string());
        Ok(())
    }

    /// Returns the markers of a record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store mutex is poisoned.
    pub fn record_state(&self, record_id: &RecordId) -> Result<Option<RecordState>, StoreError> {
        Ok(self.lock()?.records.get(record_id).map(|stored| stored.state))
    }

    /// Returns every record id with its markers, in id order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store mutex is poisoned.
    pub fn record_states(&self) -> Result<Vec<(RecordId, RecordState)>, StoreError> {
        Ok(self.lock()?.records.iter().map(|(id, stored)| (id.clone(), stored.state)).collect())
    }

    /// Overwrites the claim marker of a record, simulating crash residue.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the record does not exist.
    pub fn set_claim_state(&self, record_id: &RecordId, claim: ClaimState) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        let stored = guard
            .records
            .get_mut(record_id)
            .ok_or_else(|| StoreError::NotFound(format!("record {record_id}")))?;
        stored.state.claim = claim;
        drop(guard);
        Ok(())
    }

    /// Returns every persisted delta row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store mutex is poisoned.
    pub fn signed_results(&self) -> Result<Vec<SignedResult>, StoreError> {
        Ok(self.lock()?.deltas.clone())
    }

    /// Makes the `call`-th invocation (one-based, counted from now on) of
    /// `operation` fail.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store mutex is poisoned.
    pub fn fail_on(&self, operation: StoreOperation, call: usize) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        let seen = guard.calls.get(&operation).copied().unwrap_or(0);
        guard.failures.insert(operation, seen + call);
        drop(guard);
        Ok(())
    }

    /// Returns how many times `operation` was invoked.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store mutex is poisoned.
    pub fn calls(&self, operation: StoreOperation) -> Result<usize, StoreError> {
        Ok(self.lock()?.calls.get(&operation).copied().unwrap_or(0))
    }
}

impl SigningStore for InMemorySigningStore {
    fn count_claimed(&self, scope: &ClaimScope) -> Result<usize, StoreError> {
        let mut guard = self.lock()?;
        guard.observe(StoreOperation::Count)?;
        Ok(guard.count_claimed(scope))
    }

    fn mark_claimed(&self, scope: &ClaimScope) -> Result<usize, StoreError> {
        let mut guard = self.lock()?;
        guard.observe(StoreOperation::Mark)?;
        Ok(guard.mark_claimed(scope))
    }

    fn claim_exclusive(&self, scope: &ClaimScope) -> Result<ClaimOutcome, StoreError> {
        let mut guard = self.lock()?;
        guard.observe(StoreOperation::Count)?;
        let working_rows = guard.count_claimed(scope);
        if working_rows > 0 {
            return Ok(ClaimOutcome::Reentrant {
                working_rows,
            });
        }
        guard.observe(StoreOperation::Mark)?;
        Ok(ClaimOutcome::Claimed(guard.mark_claimed(scope)))
    }

    fn load_claimed_page(
        &self,
        scope: &ClaimScope,
        limit: usize,
    ) -> Result<Vec<SignableRecord>, StoreError> {
        let mut guard = self.lock()?;
        guard.observe(StoreOperation::Load)?;
        let page = guard
            .records
            .values()
            .filter(|stored| stored.state.claim == ClaimState::Claimed && scope.selects(&stored.record))
            .take(limit)
            .map(|stored| guard.joined(&stored.record))
            .collect();
        drop(guard);
        Ok(page)
    }

    fn insert_delta(&self, results: &[SignedResult]) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        guard.observe(StoreOperation::InsertDelta)?;
        if let Some(missing) = results.iter().find(|result| !guard.records.contains_key(&result.record_id)) {
            return Err(StoreError::NotFound(format!("record {}", missing.record_id)));
        }
        for result in results {
            if let Some(stored) = guard.records.get_mut(&result.record_id) {
                stored.state = RecordState {
                    claim: ClaimState::Unclaimed,
                    success: SuccessState::Done,
                };
            }
        }
        guard.deltas.extend_from_slice(results);
        drop(guard);
        Ok(())
    }

    fn clear_claims(&self, actor: Option<&ActorId>) -> Result<usize, StoreError> {
        let mut guard = self.lock()?;
        guard.observe(StoreOperation::Clear)?;
        let mut cleared = 0;
        for stored in guard.records.values_mut() {
            let owned = actor.is_none_or(|actor| stored.record.is_owned_by(actor));
            if stored.state.claim == ClaimState::Claimed && owned {
                stored.state = RecordState::PENDING;
                cleared += 1;
            }
        }
        drop(guard);
        Ok(cleared)
    }

    fn customer_profile(&self, actor: &ActorId) -> Result<Option<CustomerProfile>, StoreError> {
        Ok(self.lock()?.customers.get(actor).cloned())
    }
}
