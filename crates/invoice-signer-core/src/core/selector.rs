// crates/invoice-signer-core/src/core/selector.rs
// ============================================================================
// Module: Invoice Signer Selectors
// Description: Row-selector predicates and claim scope value objects.
// Purpose: Narrow the eligible record set for a claim request.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! A [`ClaimScope`] combines the requesting actor, a [`RecordSelector`], and
//! an optional quantity cap. The selector narrows records by explicit id list,
//! by inclusive issue-date range, or not at all. Store backends translate the
//! selector into their own predicates; [`RecordSelector::matches`] is the
//! reference semantics used by the in-memory store and tests.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;

use crate::core::identifiers::ActorId;
use crate::core::identifiers::RecordId;
use crate::core::record::SignableRecord;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Selector validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectorError {
    /// Date range bounds are reversed.
    #[error("date range start {from} is after end {till}")]
    ReversedRange {
        /// Lower bound as unix seconds.
        from: i64,
        /// Upper bound as unix seconds.
        till: i64,
    },
}

// ============================================================================
// SECTION: Date Range
// ============================================================================

/// Inclusive issue-date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Inclusive lower bound.
    #[serde(with = "time::serde::rfc3339")]
    pub from: OffsetDateTime,
    /// Inclusive upper bound.
    #[serde(with = "time::serde::rfc3339")]
    pub till: OffsetDateTime,
}

impl DateRange {
    /// Creates a validated range.
    ///
    /// # Errors
    ///
    /// Returns [`SelectorError::ReversedRange`] when `from > till`.
    pub fn new(from: OffsetDateTime, till: OffsetDateTime) -> Result<Self, SelectorError> {
        let range = Self { from, till };
        range.validate()?;
        Ok(range)
    }

    /// Validates the bound ordering.
    ///
    /// # Errors
    ///
    /// Returns [`SelectorError::ReversedRange`] when `from > till`.
    pub fn validate(&self) -> Result<(), SelectorError> {
        if self.from > self.till {
            return Err(SelectorError::ReversedRange {
                from: self.from_unix(),
                till: self.till_unix(),
            });
        }
        Ok(())
    }

    /// Lower bound as unix seconds.
    #[must_use]
    pub const fn from_unix(&self) -> i64 {
        self.from.unix_timestamp()
    }

    /// Upper bound as unix seconds.
    #[must_use]
    pub const fn till_unix(&self) -> i64 {
        self.till.unix_timestamp()
    }

    /// Returns true when `unix_seconds` falls within the range, bounds included.
    #[must_use]
    pub const fn contains(&self, unix_seconds: i64) -> bool {
        unix_seconds >= self.from_unix() && unix_seconds <= self.till_unix()
    }
}

// ============================================================================
// SECTION: Record Selector
// ============================================================================

/// Row-selector predicate for claim requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RecordSelector {
    /// Explicit record id list.
    Ids(Vec<RecordId>),
    /// Inclusive issue-date range.
    DateRange(DateRange),
    /// Every record owned by the actor.
    Unrestricted,
}

impl RecordSelector {
    /// Returns true when the selector can never match a record.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Ids(ids) if ids.is_empty())
    }

    /// Reference predicate used by in-process stores.
    #[must_use]
    pub fn matches(&self, record: &SignableRecord) -> bool {
        match self {
            Self::Ids(ids) => ids.contains(&record.record_id),
            Self::DateRange(range) => range.contains(record.issue_date),
            Self::Unrestricted => true,
        }
    }

    /// Validates selector contents.
    ///
    /// # Errors
    ///
    /// Returns [`SelectorError`] when a date range is reversed.
    pub fn validate(&self) -> Result<(), SelectorError> {
        match self {
            Self::DateRange(range) => range.validate(),
            Self::Ids(_) | Self::Unrestricted => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Claim Scope
// ============================================================================

/// Actor plus selector plus quantity cap for one claim request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimScope {
    /// Requesting actor.
    pub actor_id: ActorId,
    /// Row selector.
    pub selector: RecordSelector,
    /// Maximum rows to claim; `None` claims every eligible row.
    pub quantity: Option<usize>,
}

impl ClaimScope {
    /// Creates a claim scope.
    #[must_use]
    pub const fn new(actor_id: ActorId, selector: RecordSelector, quantity: Option<usize>) -> Self {
        Self {
            actor_id,
            selector,
            quantity,
        }
    }

    /// Returns the effective quantity cap; id lists default to their length.
    #[must_use]
    pub fn effective_quantity(&self) -> Option<usize> {
        match (&self.selector, self.quantity) {
            (_, Some(quantity)) => Some(quantity),
            (RecordSelector::Ids(ids), None) => Some(ids.len()),
            (_, None) => None,
        }
    }

    /// Returns true when the scope selects the record for this actor.
    #[must_use]
    pub fn selects(&self, record: &SignableRecord) -> bool {
        record.is_owned_by(&self.actor_id) && self.selector.matches(record)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Tests use unwrap on deterministic fixtures.")]

    use time::Duration;

    use super::*;

    #[test]
    fn date_range_includes_both_bounds() {
        let from = OffsetDateTime::UNIX_EPOCH + Duration::days(10);
        let till = from + Duration::days(1);
        let range = DateRange::new(from, till).unwrap();
        assert!(range.contains(from.unix_timestamp()));
        assert!(range.contains(till.unix_timestamp()));
        assert!(!range.contains(till.unix_timestamp() + 1));
        assert!(!range.contains(from.unix_timestamp() - 1));
    }

    #[test]
    fn reversed_range_is_rejected() {
        let till = OffsetDateTime::UNIX_EPOCH;
        let from = till + Duration::seconds(5);
        assert_eq!(
            DateRange::new(from, till),
            Err(SelectorError::ReversedRange {
                from: 5,
                till: 0
            })
        );
    }

    #[test]
    fn id_list_quantity_defaults_to_length() {
        let scope = ClaimScope::new(
            ActorId::new("A1"),
            RecordSelector::Ids(vec![RecordId::new("r1"), RecordId::new("r2")]),
            None,
        );
        assert_eq!(scope.effective_quantity(), Some(2));
        let open = ClaimScope::new(ActorId::new("A1"), RecordSelector::Unrestricted, None);
        assert_eq!(open.effective_quantity(), None);
        assert!(RecordSelector::Ids(Vec::new()).is_empty());
    }
}
