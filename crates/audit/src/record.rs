use chartseal_types::{ActorId, PatientId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// What happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditRecordKind {
    // Notes
    NoteCreated,
    NoteUpdated,
    NoteSealed,
    NoteSuperseded,
    NoteCompleted,

    // Deviation protocol
    Deviation,
    VarianceOverride,

    // Consent
    ConsentGranted,
    ConsentRevoked,

    // Treatment plans
    PlanCreated,
    PlanSubmitted,
    PlanApproved,
    PlanRejected,
    PlanReverted,
    PlanDeleted,
    PlanCompleted,
    PlanReopened,

    // Ledger
    ChargePosted,
    PaymentPosted,

    // Access gate
    OverrideUsed,
}

/// What the record is about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEntityKind {
    Note,
    Plan,
    Consent,
    Ledger,
    Patient,
}

/// Input for one append; the trail assigns id, timestamp, and chain hashes.
#[derive(Clone, Debug)]
pub struct AuditRecordInput {
    pub actor: ActorId,
    pub kind: AuditRecordKind,
    pub entity_kind: AuditEntityKind,
    pub entity_id: String,
    pub patient: PatientId,
    pub detail: String,
}

/// One immutable, hash-chained audit record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub actor: ActorId,
    pub kind: AuditRecordKind,
    pub entity_kind: AuditEntityKind,
    pub entity_id: String,
    pub patient: PatientId,
    pub detail: String,
    pub recorded_at: DateTime<Utc>,
    /// Hash of the previous record in the trail, `None` for the first.
    pub previous_hash: Option<String>,
    /// Hex-encoded SHA-256 over this record's canonical fields.
    pub record_hash: String,
}

impl AuditRecordInput {
    /// Finalize into a chained record.
    pub(crate) fn finalize(self, previous_hash: Option<String>) -> AuditRecord {
        let id = Uuid::new_v4();
        let recorded_at = Utc::now();
        let record_hash = compute_hash(
            id,
            recorded_at,
            &self.actor,
            self.kind,
            self.entity_kind,
            &self.entity_id,
            self.patient,
            &self.detail,
            previous_hash.as_deref(),
        );
        AuditRecord {
            id,
            actor: self.actor,
            kind: self.kind,
            entity_kind: self.entity_kind,
            entity_id: self.entity_id,
            patient: self.patient,
            detail: self.detail,
            recorded_at,
            previous_hash,
            record_hash,
        }
    }
}

impl AuditRecord {
    /// Recompute this record's hash from its stored fields.
    pub fn recompute_hash(&self) -> String {
        compute_hash(
            self.id,
            self.recorded_at,
            &self.actor,
            self.kind,
            self.entity_kind,
            &self.entity_id,
            self.patient,
            &self.detail,
            self.previous_hash.as_deref(),
        )
    }
}

#[allow(clippy::too_many_arguments)]
fn compute_hash(
    id: Uuid,
    recorded_at: DateTime<Utc>,
    actor: &ActorId,
    kind: AuditRecordKind,
    entity_kind: AuditEntityKind,
    entity_id: &str,
    patient: PatientId,
    detail: &str,
    previous_hash: Option<&str>,
) -> String {
    let hash_input = format!(
        "{}{}{}{}{}{}{}{}{}",
        id,
        recorded_at.to_rfc3339(),
        actor,
        serde_json::to_string(&kind).unwrap_or_default(),
        serde_json::to_string(&entity_kind).unwrap_or_default(),
        entity_id,
        patient,
        detail,
        previous_hash.unwrap_or("")
    );
    let mut hasher = Sha256::new();
    hasher.update(hash_input.as_bytes());
    hex::encode(hasher.finalize())
}
