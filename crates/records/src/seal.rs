//! Canonical content hashing for clinical notes.

use sha2::{Digest, Sha256};

use crate::note::ClinicalFields;

/// Domain tag versioning the canonical encoding; bump on any field change.
const SEAL_DOMAIN_TAG: &str = "chartseal-note-seal-v1";

/// Compute the hex-encoded SHA-256 seal hash over the clinical fields.
///
/// Pure and deterministic: identical fields always produce the same hash.
/// Fields are joined with an unambiguous unit separator so adjacent fields
/// cannot collide by concatenation.
pub fn seal_fields(fields: &ClinicalFields) -> String {
    let mut hasher = Sha256::new();
    hasher.update(SEAL_DOMAIN_TAG.as_bytes());
    for part in [
        fields.subjective.as_str(),
        fields.objective.as_str(),
        fields.assessment.as_str(),
        fields.plan_narrative.as_str(),
        fields.procedure.as_str(),
        fields.target_site.as_str(),
    ] {
        hasher.update([0x1f]);
        hasher.update(part.as_bytes());
    }
    hasher.update([0x1f]);
    hasher.update(fields.performed_on.to_rfc3339().as_bytes());
    hex::encode(hasher.finalize())
}
