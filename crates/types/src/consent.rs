use serde::{Deserialize, Serialize};

/// Independent revocable permission categories scoped to a patient.
///
/// Only `Clinical` has systemic effect: revoking it locks all clinical
/// mutation for the patient. `Marketing` and `ThirdParty` are advisory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentCategory {
    Clinical,
    Marketing,
    ThirdParty,
}

/// Current derived status of one consent category for one patient.
///
/// `None` means no event has ever been recorded for the category.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentStatus {
    Granted,
    Revoked,
    #[default]
    None,
}

impl ConsentStatus {
    pub fn is_revoked(&self) -> bool {
        matches!(self, Self::Revoked)
    }
}
