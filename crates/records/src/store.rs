use std::collections::HashMap;

use chartseal_types::{ActorId, ActorRole, AmountMinor, NoteId, PatientId, PlanId};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::RecordError;
use crate::note::{ClinicalFields, ClinicalNoteEntry, CompletionOutcome, NoteSeal, NoteStatus};
use crate::seal::seal_fields;

/// Versioned note arena for one patient.
///
/// Entries are kept forever: a correction appends a new version and flags
/// the old one superseded. Readers default to the non-superseded view;
/// `all_versions` exposes full history on demand. The engine serializes
/// access, so the store itself carries no locking.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NoteStore {
    patient: PatientId,
    notes: HashMap<NoteId, ClinicalNoteEntry>,
    /// Insertion order, for stable listings and exports.
    order: Vec<NoteId>,
}

impl NoteStore {
    pub fn new(patient: PatientId) -> Self {
        Self {
            patient,
            notes: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn patient(&self) -> PatientId {
        self.patient
    }

    /// Append a fresh, unsealed note.
    pub fn create(
        &mut self,
        author: ActorId,
        author_role: ActorRole,
        fields: ClinicalFields,
    ) -> NoteId {
        let entry = ClinicalNoteEntry::new(self.patient, author, author_role, fields);
        let id = entry.id;
        debug!(patient = %self.patient, note = %id, "note created");
        self.order.push(id);
        self.notes.insert(id, entry);
        id
    }

    pub fn get(&self, id: NoteId) -> Result<&ClinicalNoteEntry, RecordError> {
        self.notes.get(&id).ok_or(RecordError::NoteNotFound(id))
    }

    /// Replace the clinical fields of an unsealed note.
    pub fn update_fields(&mut self, id: NoteId, fields: ClinicalFields) -> Result<(), RecordError> {
        let entry = self.get_mut(id)?;
        if entry.is_sealed() {
            return Err(RecordError::AlreadySealed(id));
        }
        entry.fields = fields;
        Ok(())
    }

    /// Seal a note: compute the canonical content hash and freeze the
    /// clinical fields forever. Re-sealing is refused.
    pub fn seal(&mut self, id: NoteId, actor: ActorId) -> Result<&NoteSeal, RecordError> {
        let entry = self.get_mut(id)?;
        if entry.is_sealed() {
            return Err(RecordError::AlreadySealed(id));
        }
        let seal = NoteSeal {
            hash: seal_fields(&entry.fields),
            sealed_at: Utc::now(),
            sealed_by: actor,
        };
        info!(patient = %entry.patient, note = %id, hash = %seal.hash, "note sealed");
        entry.seal = Some(seal);
        Ok(entry
            .seal
            .as_ref()
            .unwrap_or_else(|| unreachable!("seal just attached")))
    }

    /// Record a correction: a new unsealed version superseding a sealed
    /// original. The original is flagged, never deleted. Plan linkage,
    /// the planned-procedure baseline, and pricing carry over.
    pub fn supersede(
        &mut self,
        id: NoteId,
        author: ActorId,
        author_role: ActorRole,
        fields: ClinicalFields,
    ) -> Result<NoteId, RecordError> {
        let original = self.get(id)?;
        if !original.is_sealed() {
            return Err(RecordError::NotSealed(id));
        }
        if let Some(successor) = original.superseded_by {
            return Err(RecordError::Superseded(id, successor));
        }

        let mut replacement = ClinicalNoteEntry::new(self.patient, author, author_role, fields);
        replacement.supersedes = Some(id);
        replacement.plan = original.plan;
        replacement.planned_procedure = original.planned_procedure.clone();
        replacement.quoted_price = original.quoted_price;
        let new_id = replacement.id;

        info!(patient = %self.patient, superseded = %id, replacement = %new_id, "note superseded");
        self.order.push(new_id);
        self.notes.insert(new_id, replacement);
        if let Some(original) = self.notes.get_mut(&id) {
            original.superseded_by = Some(new_id);
        }
        Ok(new_id)
    }

    /// Link a note to a treatment plan, capturing the procedure as the
    /// deviation baseline on first link.
    pub fn link_to_plan(&mut self, id: NoteId, plan: PlanId) -> Result<(), RecordError> {
        let entry = self.current_mut(id)?;
        entry.plan = Some(plan);
        if entry.planned_procedure.is_none() {
            entry.planned_procedure = Some(entry.fields.procedure.clone());
        }
        Ok(())
    }

    /// Detach every note linked to a deleted plan. Notes survive; the
    /// deviation baseline is cleared so a later re-link recaptures it.
    pub fn unlink_plan(&mut self, plan: PlanId) -> Vec<NoteId> {
        let mut unlinked = Vec::new();
        for id in &self.order {
            if let Some(entry) = self.notes.get_mut(id) {
                if entry.plan == Some(plan) {
                    entry.plan = None;
                    entry.planned_procedure = None;
                    unlinked.push(*id);
                }
            }
        }
        unlinked
    }

    pub fn set_quoted_price(&mut self, id: NoteId, amount: AmountMinor) -> Result<(), RecordError> {
        if amount <= 0 {
            return Err(RecordError::NonPositivePrice { amount });
        }
        self.current_mut(id)?.quoted_price = Some(amount);
        Ok(())
    }

    pub fn set_actual_price(&mut self, id: NoteId, amount: AmountMinor) -> Result<(), RecordError> {
        if amount <= 0 {
            return Err(RecordError::NonPositivePrice { amount });
        }
        self.current_mut(id)?.actual_price = Some(amount);
        Ok(())
    }

    /// Apply a completion that already passed the deviation and variance
    /// checks. The caller (the engine) is responsible for running them; a
    /// failed check never reaches this method, leaving the note untouched.
    pub fn complete(&mut self, id: NoteId, outcome: CompletionOutcome) -> Result<(), RecordError> {
        let entry = self.current_mut(id)?;
        if entry.is_completed() {
            return Err(RecordError::AlreadyCompleted(id));
        }
        entry.status = NoteStatus::Completed;
        entry.deviation_narrative = outcome.deviation_narrative;
        entry.original_planned_procedure = outcome.original_planned_procedure;
        entry.financial_narrative = outcome.financial_narrative;
        info!(patient = %entry.patient, note = %id, "note completed");
        Ok(())
    }

    /// Non-superseded notes in insertion order — the default reader view.
    pub fn active(&self) -> Vec<&ClinicalNoteEntry> {
        self.order
            .iter()
            .filter_map(|id| self.notes.get(id))
            .filter(|entry| !entry.is_superseded())
            .collect()
    }

    /// Every version ever recorded, in insertion order.
    pub fn all_versions(&self) -> Vec<&ClinicalNoteEntry> {
        self.order.iter().filter_map(|id| self.notes.get(id)).collect()
    }

    /// Non-superseded notes linked to one plan.
    pub fn notes_for_plan(&self, plan: PlanId) -> Vec<&ClinicalNoteEntry> {
        self.active()
            .into_iter()
            .filter(|entry| entry.plan == Some(plan))
            .collect()
    }

    fn get_mut(&mut self, id: NoteId) -> Result<&mut ClinicalNoteEntry, RecordError> {
        self.notes.get_mut(&id).ok_or(RecordError::NoteNotFound(id))
    }

    /// Mutable access refusing superseded versions.
    fn current_mut(&mut self, id: NoteId) -> Result<&mut ClinicalNoteEntry, RecordError> {
        let entry = self.notes.get_mut(&id).ok_or(RecordError::NoteNotFound(id))?;
        if let Some(successor) = entry.superseded_by {
            return Err(RecordError::Superseded(id, successor));
        }
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fields(procedure: &str) -> ClinicalFields {
        ClinicalFields {
            subjective: "sensitivity to cold".into(),
            objective: "MOD caries #14".into(),
            assessment: "reversible pulpitis".into(),
            plan_narrative: "composite restoration".into(),
            procedure: procedure.into(),
            target_site: "14".into(),
            performed_on: chrono::Utc.with_ymd_and_hms(2026, 5, 2, 10, 0, 0).unwrap(),
        }
    }

    fn store() -> NoteStore {
        NoteStore::new(PatientId::new())
    }

    fn author() -> ActorId {
        ActorId::new("dr-santos")
    }

    #[test]
    fn unsealed_notes_are_editable() {
        let mut store = store();
        let id = store.create(author(), ActorRole::Clinician, fields("Composite"));
        store.update_fields(id, fields("Composite, two surfaces")).unwrap();
        assert_eq!(
            store.get(id).unwrap().fields.procedure,
            "Composite, two surfaces"
        );
    }

    #[test]
    fn sealing_freezes_clinical_fields() {
        let mut store = store();
        let id = store.create(author(), ActorRole::Clinician, fields("Composite"));
        let hash = store.seal(id, author()).unwrap().hash.clone();

        let before = store.get(id).unwrap().clone();
        let error = store.update_fields(id, fields("Extraction")).unwrap_err();
        assert_eq!(error, RecordError::AlreadySealed(id));

        // Refused edit leaves the stored entry byte-identical.
        assert_eq!(store.get(id).unwrap(), &before);
        assert_eq!(store.get(id).unwrap().seal.as_ref().unwrap().hash, hash);
    }

    #[test]
    fn resealing_is_refused() {
        let mut store = store();
        let id = store.create(author(), ActorRole::Clinician, fields("Composite"));
        store.seal(id, author()).unwrap();
        assert_eq!(
            store.seal(id, author()).unwrap_err(),
            RecordError::AlreadySealed(id)
        );
    }

    #[test]
    fn corrections_supersede_rather_than_overwrite() {
        let mut store = store();
        let id = store.create(author(), ActorRole::Clinician, fields("Composite"));
        store.seal(id, author()).unwrap();

        let corrected = store
            .supersede(id, author(), ActorRole::Clinician, fields("Composite #15"))
            .unwrap();

        let original = store.get(id).unwrap();
        assert_eq!(original.superseded_by, Some(corrected));
        assert!(original.is_sealed());

        let replacement = store.get(corrected).unwrap();
        assert_eq!(replacement.supersedes, Some(id));
        assert!(!replacement.is_sealed());

        // Default reader view hides the superseded version; history keeps it.
        let active: Vec<_> = store.active().iter().map(|n| n.id).collect();
        assert_eq!(active, vec![corrected]);
        assert_eq!(store.all_versions().len(), 2);
    }

    #[test]
    fn superseding_an_unsealed_note_is_refused() {
        let mut store = store();
        let id = store.create(author(), ActorRole::Clinician, fields("Composite"));
        assert_eq!(
            store
                .supersede(id, author(), ActorRole::Clinician, fields("Other"))
                .unwrap_err(),
            RecordError::NotSealed(id)
        );
    }

    #[test]
    fn superseding_twice_is_refused() {
        let mut store = store();
        let id = store.create(author(), ActorRole::Clinician, fields("Composite"));
        store.seal(id, author()).unwrap();
        let successor = store
            .supersede(id, author(), ActorRole::Clinician, fields("A"))
            .unwrap();
        assert_eq!(
            store
                .supersede(id, author(), ActorRole::Clinician, fields("B"))
                .unwrap_err(),
            RecordError::Superseded(id, successor)
        );
    }

    #[test]
    fn first_link_captures_deviation_baseline() {
        let mut store = store();
        let plan = PlanId::new();
        let id = store.create(author(), ActorRole::Clinician, fields("Composite"));
        store.link_to_plan(id, plan).unwrap();
        assert_eq!(
            store.get(id).unwrap().planned_procedure.as_deref(),
            Some("Composite")
        );

        // A later edit does not move the baseline.
        store.update_fields(id, fields("Extraction")).unwrap();
        store.link_to_plan(id, plan).unwrap();
        assert_eq!(
            store.get(id).unwrap().planned_procedure.as_deref(),
            Some("Composite")
        );
    }

    #[test]
    fn plan_deletion_unlinks_but_keeps_notes() {
        let mut store = store();
        let plan = PlanId::new();
        let id = store.create(author(), ActorRole::Clinician, fields("Composite"));
        store.link_to_plan(id, plan).unwrap();

        let unlinked = store.unlink_plan(plan);
        assert_eq!(unlinked, vec![id]);
        let entry = store.get(id).unwrap();
        assert_eq!(entry.plan, None);
        assert_eq!(entry.planned_procedure, None);
    }

    #[test]
    fn non_positive_prices_are_refused() {
        let mut store = store();
        let id = store.create(author(), ActorRole::Clinician, fields("Composite"));
        assert_eq!(
            store.set_quoted_price(id, 0).unwrap_err(),
            RecordError::NonPositivePrice { amount: 0 }
        );
        assert_eq!(
            store.set_actual_price(id, -1500).unwrap_err(),
            RecordError::NonPositivePrice { amount: -1500 }
        );
        let entry = store.get(id).unwrap();
        assert_eq!(entry.quoted_price, None);
        assert_eq!(entry.actual_price, None);

        store.set_quoted_price(id, 1500).unwrap();
        assert_eq!(store.get(id).unwrap().quoted_price, Some(1500));
    }

    #[test]
    fn completion_is_terminal() {
        let mut store = store();
        let id = store.create(author(), ActorRole::Clinician, fields("Composite"));
        store.complete(id, CompletionOutcome::default()).unwrap();
        assert_eq!(
            store.complete(id, CompletionOutcome::default()).unwrap_err(),
            RecordError::AlreadyCompleted(id)
        );
    }
}
