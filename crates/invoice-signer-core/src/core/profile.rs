// crates/invoice-signer-core/src/core/profile.rs
// ============================================================================
// Module: Invoice Signer Customer Profile
// Description: Per-actor signing preferences stored alongside records.
// Purpose: Expose the customer signing window to callers.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Customer profiles are read-only from the signer's perspective.

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ActorId;

/// Customer signing profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerProfile {
    /// Customer (actor) identifier.
    pub customer_id: ActorId,
    /// Provider identifier.
    pub provider_id: Option<String>,
    /// Provider-defined signing type code.
    pub signing_type: String,
    /// First day of month the customer signs on.
    pub sign_from_day: i64,
    /// Last day of month the customer signs on, when bounded.
    pub sign_till_day: Option<i64>,
}
