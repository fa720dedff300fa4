use chartseal_consent::ConsentEvent;
use chartseal_ledger::LedgerStatement;
use chartseal_records::ClinicalNoteEntry;
use chartseal_types::PatientId;
use chartseal_workflow::TreatmentPlan;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Read-only, point-in-time copy of one patient's aggregate.
///
/// Taken under the patient lock, so an export can never observe a
/// half-completed mutation. Superseded note versions are included; the
/// consumer filters as needed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PatientSnapshot {
    pub patient: PatientId,
    pub taken_at: DateTime<Utc>,
    pub consent_events: Vec<ConsentEvent>,
    pub notes: Vec<ClinicalNoteEntry>,
    pub plans: Vec<TreatmentPlan>,
    pub ledger: LedgerStatement,
}

impl PatientSnapshot {
    /// The non-superseded note versions, the default display view.
    pub fn active_notes(&self) -> impl Iterator<Item = &ClinicalNoteEntry> {
        self.notes.iter().filter(|note| !note.is_superseded())
    }
}
