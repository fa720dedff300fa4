use chartseal_types::{ActorId, ConsentCategory, ConsentStatus, PatientId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a consent event did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentEventKind {
    Granted,
    Revoked,
}

impl ConsentEventKind {
    pub fn as_status(&self) -> ConsentStatus {
        match self {
            Self::Granted => ConsentStatus::Granted,
            Self::Revoked => ConsentStatus::Revoked,
        }
    }
}

/// One immutable grant/revoke record.
///
/// Events carry the policy version in force at capture time so a grant can
/// be traced to the exact consent wording the patient saw.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentEvent {
    pub patient: PatientId,
    pub category: ConsentCategory,
    pub kind: ConsentEventKind,
    pub policy_version: String,
    pub recorded_at: DateTime<Utc>,
    pub actor: ActorId,
    pub note: Option<String>,
}
