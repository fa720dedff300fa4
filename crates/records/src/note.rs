use chartseal_types::{ActorId, ActorRole, AmountMinor, NoteId, PatientId, PlanId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The clinical-field subset covered by the seal.
///
/// Deliberately a separate struct: the seal hash is computed over exactly
/// these fields, so non-clinical metadata (author display name, plan
/// linkage, pricing) can change without invalidating a seal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicalFields {
    pub subjective: String,
    pub objective: String,
    pub assessment: String,
    pub plan_narrative: String,
    pub procedure: String,
    pub target_site: String,
    pub performed_on: DateTime<Utc>,
}

/// Lifecycle status of a note. Sealing is orthogonal: an open note may be
/// sealed (frozen wording) before the procedure is completed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteStatus {
    #[default]
    Open,
    Completed,
}

/// The seal attached to a note: content hash plus sealing timestamp.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteSeal {
    /// Hex-encoded SHA-256 over the canonical clinical-field encoding.
    pub hash: String,
    pub sealed_at: DateTime<Utc>,
    pub sealed_by: ActorId,
}

/// Result of a successful deviation/variance evaluation, applied to the
/// note at completion time.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionOutcome {
    /// Set when the completed procedure differed from the planned one.
    pub deviation_narrative: Option<String>,
    /// Baseline procedure recorded alongside an accepted deviation.
    pub original_planned_procedure: Option<String>,
    /// Set when the actual price exceeded the quote beyond tolerance.
    pub financial_narrative: Option<String>,
}

/// One version of a clinical note.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClinicalNoteEntry {
    pub id: NoteId,
    pub patient: PatientId,
    pub author: ActorId,
    pub author_role: ActorRole,
    pub fields: ClinicalFields,
    pub created_at: DateTime<Utc>,

    /// Treatment plan this note is linked to, if any.
    pub plan: Option<PlanId>,
    /// The procedure as it stood when the note was first linked to its
    /// plan; the baseline for deviation checks.
    pub planned_procedure: Option<String>,
    /// Snapshot of `planned_procedure` copied onto the note when a
    /// deviation was accepted at completion.
    pub original_planned_procedure: Option<String>,

    pub quoted_price: Option<AmountMinor>,
    pub actual_price: Option<AmountMinor>,

    pub status: NoteStatus,
    pub seal: Option<NoteSeal>,

    /// Points at the sealed prior version this note corrects.
    pub supersedes: Option<NoteId>,
    /// Set on the old version when a correction is recorded.
    pub superseded_by: Option<NoteId>,

    pub deviation_narrative: Option<String>,
    pub financial_narrative: Option<String>,
}

impl ClinicalNoteEntry {
    pub fn new(
        patient: PatientId,
        author: ActorId,
        author_role: ActorRole,
        fields: ClinicalFields,
    ) -> Self {
        Self {
            id: NoteId::new(),
            patient,
            author,
            author_role,
            fields,
            created_at: Utc::now(),
            plan: None,
            planned_procedure: None,
            original_planned_procedure: None,
            quoted_price: None,
            actual_price: None,
            status: NoteStatus::Open,
            seal: None,
            supersedes: None,
            superseded_by: None,
            deviation_narrative: None,
            financial_narrative: None,
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.seal.is_some()
    }

    pub fn is_superseded(&self) -> bool {
        self.superseded_by.is_some()
    }

    pub fn is_completed(&self) -> bool {
        self.status == NoteStatus::Completed
    }
}
