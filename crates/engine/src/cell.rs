use std::collections::HashMap;

use chartseal_consent::ConsentLog;
use chartseal_ledger::PatientLedger;
use chartseal_records::NoteStore;
use chartseal_types::{PatientId, PlanId};
use chartseal_workflow::TreatmentPlan;

/// One patient's entire mutable aggregate.
///
/// Guarded by a single mutex in the engine: the per-patient
/// mutual-exclusion boundary the balance invariant and computed plan
/// completion both depend on.
#[derive(Debug)]
pub struct PatientCell {
    pub consent: ConsentLog,
    pub notes: NoteStore,
    pub plans: HashMap<PlanId, TreatmentPlan>,
    /// Plan insertion order, for stable listings.
    pub plan_order: Vec<PlanId>,
    pub ledger: PatientLedger,
}

impl PatientCell {
    pub fn new(patient: PatientId) -> Self {
        Self {
            consent: ConsentLog::new(patient),
            notes: NoteStore::new(patient),
            plans: HashMap::new(),
            plan_order: Vec::new(),
            ledger: PatientLedger::new(patient),
        }
    }

    /// Completion flags of the non-superseded notes linked to one plan.
    pub fn linked_completion_flags(&self, plan: PlanId) -> Vec<bool> {
        self.notes
            .notes_for_plan(plan)
            .iter()
            .map(|note| note.is_completed())
            .collect()
    }
}
