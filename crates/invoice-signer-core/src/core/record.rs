// crates/invoice-signer-core/src/core/record.rs
// ============================================================================
// Module: Invoice Signer Records
// Description: Signable record model, ownership regimes, and claim markers.
// Purpose: Describe pending documents and the state flags driving the claim loop.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A [`SignableRecord`] is one pending document loaded from the store. Its
//! `type_code` selects the ownership regime: the last two characters decide
//! whether the issuer or the broker identity is authoritative for claims.
//!
//! Claim and success markers use the single-character store encoding
//! (`"F"`/`"X"` and `"F"`/`"T"`).
//!
//! # Invariants
//! - A record transitions `Unclaimed -> Claimed -> Unclaimed`.
//! - `SuccessState` only moves `NotDone -> Done`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ActorId;
use crate::core::identifiers::RecordId;

// ============================================================================
// SECTION: Ownership Regime
// ============================================================================

/// Type-code suffixes owned by the issuer identity.
pub const DIRECT_ISSUER_SUFFIXES: [&str; 3] = ["01", "02", "04"];

/// Type-code suffixes owned by the broker identity.
pub const BROKER_MEDIATED_SUFFIXES: [&str; 2] = ["03", "05"];

/// Ownership regime derived from the tail of a record type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnershipRegime {
    /// The issuer identity owns the record.
    DirectIssuer,
    /// The broker identity owns the record.
    BrokerMediated,
}

impl OwnershipRegime {
    /// Resolves the regime from a type code, or `None` for unknown suffixes.
    #[must_use]
    pub fn from_type_code(type_code: &str) -> Option<Self> {
        let suffix = type_code.get(type_code.len().checked_sub(2)? ..)?;
        if DIRECT_ISSUER_SUFFIXES.contains(&suffix) {
            Some(Self::DirectIssuer)
        } else if BROKER_MEDIATED_SUFFIXES.contains(&suffix) {
            Some(Self::BrokerMediated)
        } else {
            None
        }
    }
}

// ============================================================================
// SECTION: Claim Markers
// ============================================================================

/// Mid-flight exclusivity marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimState {
    /// Record is free to be claimed.
    Unclaimed,
    /// Record is claimed by an in-flight run.
    Claimed,
}

impl ClaimState {
    /// Returns the store encoding.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Unclaimed => "F",
            Self::Claimed => "X",
        }
    }

    /// Parses the store encoding.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "F" => Some(Self::Unclaimed),
            "X" => Some(Self::Claimed),
            _ => None,
        }
    }
}

/// Completion marker set by a successful delta write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuccessState {
    /// No successful signing pass yet.
    NotDone,
    /// A signing pass completed and its delta was persisted.
    Done,
}

impl SuccessState {
    /// Returns the store encoding.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotDone => "F",
            Self::Done => "T",
        }
    }

    /// Parses the store encoding.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "F" => Some(Self::NotDone),
            "T" => Some(Self::Done),
            _ => None,
        }
    }
}

/// Claim and success markers of a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordState {
    /// Claim marker.
    pub claim: ClaimState,
    /// Success marker.
    pub success: SuccessState,
}

impl RecordState {
    /// State of a freshly created upstream record.
    pub const PENDING: Self = Self {
        claim: ClaimState::Unclaimed,
        success: SuccessState::NotDone,
    };
}

// ============================================================================
// SECTION: Signable Record
// ============================================================================

/// A pending document joined with the contact data needed to sign it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignableRecord {
    /// Stable sortable key.
    pub record_id: RecordId,
    /// Type code; its last two characters select the ownership regime.
    pub type_code: String,
    /// Issuer identity.
    pub issuer_id: ActorId,
    /// Issuer contact email.
    pub issuer_email: Option<String>,
    /// Counterpart identity.
    pub counterpart_id: Option<String>,
    /// Counterpart contact email.
    pub counterpart_email: Option<String>,
    /// Broker identity, when the record is broker-mediated.
    pub broker_id: Option<ActorId>,
    /// Broker contact email.
    pub broker_email: Option<String>,
    /// Provider identity from the issuer's customer profile.
    pub provider_id: Option<String>,
    /// Provider contact email.
    pub provider_email: Option<String>,
    /// Issue date as unix seconds.
    pub issue_date: i64,
    /// Document payload to sign.
    pub document: serde_json::Value,
}

impl SignableRecord {
    /// Returns the ownership regime, or `None` when the type code is unknown.
    #[must_use]
    pub fn regime(&self) -> Option<OwnershipRegime> {
        OwnershipRegime::from_type_code(&self.type_code)
    }

    /// Returns the identity authoritative for this record's regime.
    #[must_use]
    pub fn authoritative_owner(&self) -> Option<&ActorId> {
        match self.regime()? {
            OwnershipRegime::DirectIssuer => Some(&self.issuer_id),
            OwnershipRegime::BrokerMediated => self.broker_id.as_ref(),
        }
    }

    /// Returns true when `actor` is the authoritative owner.
    #[must_use]
    pub fn is_owned_by(&self, actor: &ActorId) -> bool {
        self.authoritative_owner() == Some(actor)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
