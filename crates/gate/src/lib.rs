//! The access gate: one decision function for every clinical mutation.
//!
//! Individual components never re-derive consent status on their own —
//! drift between screens is exactly the failure mode this crate exists to
//! remove. The engine resolves the patient's clinical consent status once
//! per operation and asks the gate; nothing downstream of the gate may
//! bypass it.
//!
//! The only bypass is the designated audit-override role
//! (`IntegrityAuditor`), kept for system-integrity verification so a
//! revoked record is not permanently bricked. Every use of the override is
//! audit-logged unconditionally by the caller, whether or not the guarded
//! operation then succeeds. The exception must never widen to other roles.

use chartseal_types::{ActorRole, ConsentStatus};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Mutating operations subject to gating.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateOperation {
    CreateNote,
    EditNote,
    SealNote,
    SupersedeNote,
    CompleteNote,
    PlanTransition,
    PostCharge,
}

/// Why a mutation was denied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    ClinicalConsentRevoked,
}

/// The gate's verdict.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow {
        /// True when the allow came from the audit-override role acting on
        /// a revoked record; the caller must append an `OverrideUsed`
        /// audit record regardless of the operation's outcome.
        override_used: bool,
    },
    Deny(DenialReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow { .. })
    }
}

/// Stateless decision function over role, consent status, and operation.
pub struct AccessGate;

impl AccessGate {
    pub fn check(
        role: ActorRole,
        clinical_consent: ConsentStatus,
        operation: GateOperation,
    ) -> Decision {
        if !clinical_consent.is_revoked() {
            return Decision::Allow {
                override_used: false,
            };
        }
        if role.is_audit_override() {
            debug!(?operation, "audit-override bypass of revoked clinical consent");
            return Decision::Allow {
                override_used: true,
            };
        }
        debug!(?role, ?operation, "mutation denied: clinical consent revoked");
        Decision::Deny(DenialReason::ClinicalConsentRevoked)
    }
}
