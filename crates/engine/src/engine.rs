use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, TryLockError};

use chartseal_audit::{AuditEntityKind, AuditRecord, AuditRecordInput, AuditRecordKind, AuditTrail, ChainVerification};
use chartseal_consent::ConsentEvent;
use chartseal_gate::{AccessGate, Decision, DenialReason, GateOperation};
use chartseal_ledger::{LedgerEntry, LedgerStatement};
use chartseal_records::{ClinicalFields, ClinicalNoteEntry, CompletionOutcome, NoteSeal, RecordError};
use chartseal_types::{Actor, AmountMinor, ConsentCategory, ConsentStatus, NoteId, PatientId, PlanId};
use chartseal_workflow::{
    CompletionChecks, CompletionRequest, FinancialConsent, PlanStatus, TreatmentPlan,
};
use chrono::Utc;
use tracing::warn;

use crate::cell::PatientCell;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::snapshot::PatientSnapshot;

/// The mutation facade over all patient state.
///
/// One mutex per patient serializes that patient's aggregate; the shared
/// audit trail is appended after each successful mutation, in mutation
/// order.
pub struct ClinicEngine {
    config: EngineConfig,
    audit: Arc<AuditTrail>,
    cells: RwLock<HashMap<PatientId, Arc<Mutex<PatientCell>>>>,
}

impl ClinicEngine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            audit: Arc::new(AuditTrail::new()),
            cells: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the audit trail, e.g. to attach notification subscribers.
    /// Must be called before the engine is shared.
    pub fn with_audit_trail(mut self, trail: AuditTrail) -> Self {
        self.audit = Arc::new(trail);
        self
    }

    pub fn audit(&self) -> Arc<AuditTrail> {
        Arc::clone(&self.audit)
    }

    // ── Consent ─────────────────────────────────────────────────────

    /// Record a consent grant. Consent operations are not themselves
    /// gated: a revoked patient can always re-grant.
    pub fn grant_consent(
        &self,
        actor: &Actor,
        patient: PatientId,
        category: ConsentCategory,
        policy_version: &str,
    ) -> Result<(), EngineError> {
        let cell = self.cell(patient)?;
        let mut guard = self.lock_cell(&cell)?;
        guard.consent.grant(category, actor.id.clone(), policy_version);
        // Appended under the patient guard so trail order matches mutation
        // order for this patient.
        self.audit.append(audit_input(
            actor,
            AuditRecordKind::ConsentGranted,
            AuditEntityKind::Consent,
            format!("{:?}", category),
            patient,
            format!("consent granted under policy {policy_version}"),
        ))?;
        drop(guard);
        Ok(())
    }

    /// Record a consent revoke. Revoking Clinical requires the explicit
    /// acknowledgement flag from the confirming UI.
    pub fn revoke_consent(
        &self,
        actor: &Actor,
        patient: PatientId,
        category: ConsentCategory,
        reason: Option<String>,
        acknowledged: bool,
    ) -> Result<(), EngineError> {
        let cell = self.cell(patient)?;
        let mut guard = self.lock_cell(&cell)?;
        let detail = reason.clone().unwrap_or_else(|| "no reason given".into());
        guard
            .consent
            .revoke(category, actor.id.clone(), reason, acknowledged)?;
        self.audit.append(audit_input(
            actor,
            AuditRecordKind::ConsentRevoked,
            AuditEntityKind::Consent,
            format!("{:?}", category),
            patient,
            detail,
        ))?;
        drop(guard);
        Ok(())
    }

    pub fn consent_status(
        &self,
        patient: PatientId,
        category: ConsentCategory,
    ) -> Result<ConsentStatus, EngineError> {
        let cell = self.cell(patient)?;
        let guard = self.lock_cell(&cell)?;
        Ok(guard.consent.status_of(category))
    }

    pub fn consent_history(
        &self,
        patient: PatientId,
        category: ConsentCategory,
    ) -> Result<Vec<ConsentEvent>, EngineError> {
        let cell = self.cell(patient)?;
        let guard = self.lock_cell(&cell)?;
        Ok(guard.consent.history(category).into_iter().cloned().collect())
    }

    // ── Notes ───────────────────────────────────────────────────────

    pub fn create_note(
        &self,
        actor: &Actor,
        patient: PatientId,
        fields: ClinicalFields,
    ) -> Result<NoteId, EngineError> {
        self.gated(actor, patient, GateOperation::CreateNote, |cell| {
            let id = cell
                .notes
                .create(actor.id.clone(), actor.role, fields.clone());
            Ok((
                id,
                vec![audit_input(
                    actor,
                    AuditRecordKind::NoteCreated,
                    AuditEntityKind::Note,
                    id.to_string(),
                    patient,
                    format!("procedure {:?}", fields.procedure),
                )],
            ))
        })
    }

    pub fn update_note(
        &self,
        actor: &Actor,
        patient: PatientId,
        note: NoteId,
        fields: ClinicalFields,
    ) -> Result<(), EngineError> {
        self.gated(actor, patient, GateOperation::EditNote, |cell| {
            cell.notes.update_fields(note, fields)?;
            Ok((
                (),
                vec![audit_input(
                    actor,
                    AuditRecordKind::NoteUpdated,
                    AuditEntityKind::Note,
                    note.to_string(),
                    patient,
                    "clinical fields replaced".into(),
                )],
            ))
        })
    }

    pub fn seal_note(
        &self,
        actor: &Actor,
        patient: PatientId,
        note: NoteId,
    ) -> Result<NoteSeal, EngineError> {
        self.gated(actor, patient, GateOperation::SealNote, |cell| {
            let seal = cell.notes.seal(note, actor.id.clone())?.clone();
            let detail = format!("sealed with hash {}", seal.hash);
            Ok((
                seal,
                vec![audit_input(
                    actor,
                    AuditRecordKind::NoteSealed,
                    AuditEntityKind::Note,
                    note.to_string(),
                    patient,
                    detail,
                )],
            ))
        })
    }

    pub fn supersede_note(
        &self,
        actor: &Actor,
        patient: PatientId,
        note: NoteId,
        fields: ClinicalFields,
    ) -> Result<NoteId, EngineError> {
        self.gated(actor, patient, GateOperation::SupersedeNote, |cell| {
            let replacement = cell
                .notes
                .supersede(note, actor.id.clone(), actor.role, fields)?;
            let mut audits = vec![audit_input(
                actor,
                AuditRecordKind::NoteSuperseded,
                AuditEntityKind::Note,
                note.to_string(),
                patient,
                format!("superseded by {replacement}"),
            )];
            // The open replacement may reopen a computed-complete plan.
            let plan_id = cell.notes.get(replacement)?.plan;
            if let Some(plan_id) = plan_id {
                audits.extend(recompute_plan(actor, patient, cell, plan_id));
            }
            Ok((replacement, audits))
        })
    }

    pub fn set_quoted_price(
        &self,
        actor: &Actor,
        patient: PatientId,
        note: NoteId,
        amount: AmountMinor,
    ) -> Result<(), EngineError> {
        self.gated(actor, patient, GateOperation::EditNote, |cell| {
            cell.notes.set_quoted_price(note, amount)?;
            Ok((
                (),
                vec![audit_input(
                    actor,
                    AuditRecordKind::NoteUpdated,
                    AuditEntityKind::Note,
                    note.to_string(),
                    patient,
                    format!("quoted price set to {amount}"),
                )],
            ))
        })
    }

    pub fn set_actual_price(
        &self,
        actor: &Actor,
        patient: PatientId,
        note: NoteId,
        amount: AmountMinor,
    ) -> Result<(), EngineError> {
        self.gated(actor, patient, GateOperation::EditNote, |cell| {
            cell.notes.set_actual_price(note, amount)?;
            Ok((
                (),
                vec![audit_input(
                    actor,
                    AuditRecordKind::NoteUpdated,
                    AuditEntityKind::Note,
                    note.to_string(),
                    patient,
                    format!("actual price set to {amount}"),
                )],
            ))
        })
    }

    pub fn link_note_to_plan(
        &self,
        actor: &Actor,
        patient: PatientId,
        note: NoteId,
        plan: PlanId,
    ) -> Result<(), EngineError> {
        self.gated(actor, patient, GateOperation::EditNote, |cell| {
            if !cell.plans.contains_key(&plan) {
                return Err(EngineError::PlanNotFound(plan));
            }
            cell.notes.link_to_plan(note, plan)?;
            Ok((
                (),
                vec![audit_input(
                    actor,
                    AuditRecordKind::NoteUpdated,
                    AuditEntityKind::Note,
                    note.to_string(),
                    patient,
                    format!("linked to {plan}"),
                )],
            ))
        })
    }

    /// Complete a note, running the deviation and financial-variance
    /// checks. A refused check leaves the note fully intact.
    pub fn complete_note(
        &self,
        actor: &Actor,
        patient: PatientId,
        note: NoteId,
        deviation_narrative: Option<&str>,
        variance_narrative: Option<&str>,
    ) -> Result<(), EngineError> {
        let workflow = self.config.workflow;
        self.gated(actor, patient, GateOperation::CompleteNote, |cell| {
            let (checks, plan_id) = {
                let entry = cell.notes.get(note)?;
                if let Some(successor) = entry.superseded_by {
                    return Err(RecordError::Superseded(note, successor).into());
                }
                if entry.is_completed() {
                    return Err(RecordError::AlreadyCompleted(note).into());
                }
                let locked = match entry.plan {
                    Some(plan_id) => cell
                        .plans
                        .get(&plan_id)
                        .ok_or(EngineError::PlanNotFound(plan_id))?
                        .is_financially_locked(),
                    None => false,
                };
                let request = CompletionRequest {
                    procedure_at_completion: &entry.fields.procedure,
                    planned_procedure: entry.planned_procedure.as_deref(),
                    quoted_price: entry.quoted_price,
                    actual_price: entry.actual_price,
                    plan_financially_locked: locked,
                    deviation_narrative,
                    variance_narrative,
                };
                (CompletionChecks::evaluate(&request, &workflow)?, entry.plan)
            };

            let outcome = CompletionOutcome {
                deviation_narrative: checks.deviation.as_ref().map(|d| d.narrative.clone()),
                original_planned_procedure: checks
                    .deviation
                    .as_ref()
                    .map(|d| d.original_planned_procedure.clone()),
                financial_narrative: checks.variance.as_ref().map(|v| v.narrative.clone()),
            };
            cell.notes.complete(note, outcome)?;

            let mut audits = vec![audit_input(
                actor,
                AuditRecordKind::NoteCompleted,
                AuditEntityKind::Note,
                note.to_string(),
                patient,
                "note completed".into(),
            )];
            if let Some(deviation) = &checks.deviation {
                audits.push(audit_input(
                    actor,
                    AuditRecordKind::Deviation,
                    AuditEntityKind::Note,
                    note.to_string(),
                    patient,
                    format!(
                        "planned {:?}, performed differently: {}",
                        deviation.original_planned_procedure, deviation.narrative
                    ),
                ));
            }
            if let Some(variance) = &checks.variance {
                audits.push(audit_input(
                    actor,
                    AuditRecordKind::VarianceOverride,
                    AuditEntityKind::Note,
                    note.to_string(),
                    patient,
                    format!(
                        "quoted {} actual {}: {}",
                        variance.quoted, variance.actual, variance.narrative
                    ),
                ));
            }

            if let Some(plan_id) = plan_id {
                audits.extend(recompute_plan(actor, patient, cell, plan_id));
            }
            Ok(((), audits))
        })
    }

    pub fn note(&self, patient: PatientId, note: NoteId) -> Result<ClinicalNoteEntry, EngineError> {
        let cell = self.cell(patient)?;
        let guard = self.lock_cell(&cell)?;
        Ok(guard.notes.get(note)?.clone())
    }

    // ── Treatment plans ─────────────────────────────────────────────

    pub fn create_plan(
        &self,
        actor: &Actor,
        patient: PatientId,
        name: &str,
    ) -> Result<PlanId, EngineError> {
        self.gated(actor, patient, GateOperation::PlanTransition, |cell| {
            let plan = TreatmentPlan::new(patient, name, actor.id.clone());
            let id = plan.id;
            cell.plan_order.push(id);
            cell.plans.insert(id, plan);
            Ok((
                id,
                vec![audit_input(
                    actor,
                    AuditRecordKind::PlanCreated,
                    AuditEntityKind::Plan,
                    id.to_string(),
                    patient,
                    format!("plan {name:?} created"),
                )],
            ))
        })
    }

    pub fn submit_plan(
        &self,
        actor: &Actor,
        patient: PatientId,
        plan: PlanId,
    ) -> Result<(), EngineError> {
        self.plan_transition(actor, patient, plan, AuditRecordKind::PlanSubmitted, |p| {
            p.submit_for_review()
        })
    }

    /// Approve a plan, capturing financial consent. The signature and
    /// identity snapshot are opaque blobs; both must be present.
    pub fn approve_plan(
        &self,
        actor: &Actor,
        patient: PatientId,
        plan: PlanId,
        signature: &str,
        identity_snapshot: &str,
    ) -> Result<(), EngineError> {
        let consent = FinancialConsent::new(signature, identity_snapshot)?;
        self.plan_transition(actor, patient, plan, AuditRecordKind::PlanApproved, move |p| {
            p.approve(consent)
        })
    }

    pub fn reject_plan(
        &self,
        actor: &Actor,
        patient: PatientId,
        plan: PlanId,
    ) -> Result<(), EngineError> {
        self.plan_transition(actor, patient, plan, AuditRecordKind::PlanRejected, |p| {
            p.reject()
        })
    }

    pub fn revert_plan(
        &self,
        actor: &Actor,
        patient: PatientId,
        plan: PlanId,
    ) -> Result<(), EngineError> {
        self.plan_transition(actor, patient, plan, AuditRecordKind::PlanReverted, |p| {
            p.revert_to_draft()
        })
    }

    /// Delete a Draft plan. Linked notes are unlinked, never deleted.
    pub fn delete_plan(
        &self,
        actor: &Actor,
        patient: PatientId,
        plan: PlanId,
    ) -> Result<(), EngineError> {
        self.gated(actor, patient, GateOperation::PlanTransition, |cell| {
            cell.plans
                .get(&plan)
                .ok_or(EngineError::PlanNotFound(plan))?
                .ensure_deletable()?;
            let unlinked = cell.notes.unlink_plan(plan);
            cell.plans.remove(&plan);
            cell.plan_order.retain(|id| *id != plan);
            Ok((
                (),
                vec![audit_input(
                    actor,
                    AuditRecordKind::PlanDeleted,
                    AuditEntityKind::Plan,
                    plan.to_string(),
                    patient,
                    format!("deleted while draft; {} note(s) unlinked", unlinked.len()),
                )],
            ))
        })
    }

    pub fn plan(&self, patient: PatientId, plan: PlanId) -> Result<TreatmentPlan, EngineError> {
        let cell = self.cell(patient)?;
        let guard = self.lock_cell(&cell)?;
        guard
            .plans
            .get(&plan)
            .cloned()
            .ok_or(EngineError::PlanNotFound(plan))
    }

    // ── Ledger ──────────────────────────────────────────────────────

    /// Post a charge. Charges are clinical mutations and pass the gate.
    pub fn post_charge(
        &self,
        actor: &Actor,
        patient: PatientId,
        amount: AmountMinor,
        description: &str,
    ) -> Result<LedgerEntry, EngineError> {
        self.gated(actor, patient, GateOperation::PostCharge, |cell| {
            let entry = cell.ledger.post_charge(amount, description)?.clone();
            let detail = format!("charge {amount}, balance {}", entry.balance_after);
            Ok((
                entry,
                vec![audit_input(
                    actor,
                    AuditRecordKind::ChargePosted,
                    AuditEntityKind::Ledger,
                    patient.to_string(),
                    patient,
                    detail,
                )],
            ))
        })
    }

    /// Post a payment. Accepting money is not a clinical mutation, so
    /// payments are serialized and audited but not consent-gated.
    pub fn post_payment(
        &self,
        actor: &Actor,
        patient: PatientId,
        amount: AmountMinor,
        description: &str,
    ) -> Result<LedgerEntry, EngineError> {
        let cell = self.cell(patient)?;
        let mut guard = self.lock_cell(&cell)?;
        let entry = guard.ledger.post_payment(amount, description)?.clone();
        self.audit.append(audit_input(
            actor,
            AuditRecordKind::PaymentPosted,
            AuditEntityKind::Ledger,
            patient.to_string(),
            patient,
            format!("payment {amount}, balance {}", entry.balance_after),
        ))?;
        drop(guard);
        Ok(entry)
    }

    pub fn balance(&self, patient: PatientId) -> Result<AmountMinor, EngineError> {
        let cell = self.cell(patient)?;
        let guard = self.lock_cell(&cell)?;
        Ok(guard.ledger.balance())
    }

    pub fn statement(&self, patient: PatientId) -> Result<LedgerStatement, EngineError> {
        let cell = self.cell(patient)?;
        let guard = self.lock_cell(&cell)?;
        Ok(guard.ledger.statement())
    }

    /// Replay the patient's balance chain on demand. A mismatch halts the
    /// ledger exactly as a mismatch found while posting would.
    pub fn verify_ledger(&self, patient: PatientId) -> Result<(), EngineError> {
        let cell = self.cell(patient)?;
        let mut guard = self.lock_cell(&cell)?;
        guard.ledger.verify()?;
        Ok(())
    }

    // ── Snapshots & audit ───────────────────────────────────────────

    /// Point-in-time, read-only copy of the patient's whole aggregate,
    /// taken under the patient lock.
    pub fn snapshot(&self, patient: PatientId) -> Result<PatientSnapshot, EngineError> {
        let cell = self.cell(patient)?;
        let guard = self.lock_cell(&cell)?;
        Ok(PatientSnapshot {
            patient,
            taken_at: Utc::now(),
            consent_events: guard.consent.events().to_vec(),
            notes: guard
                .notes
                .all_versions()
                .into_iter()
                .cloned()
                .collect(),
            plans: guard
                .plan_order
                .iter()
                .filter_map(|id| guard.plans.get(id))
                .cloned()
                .collect(),
            ledger: guard.ledger.statement(),
        })
    }

    pub fn audit_records(&self) -> Result<Vec<AuditRecord>, EngineError> {
        Ok(self.audit.records()?)
    }

    pub fn audit_records_for(&self, patient: PatientId) -> Result<Vec<AuditRecord>, EngineError> {
        Ok(self.audit.records_for(patient)?)
    }

    pub fn verify_audit_chain(&self) -> Result<ChainVerification, EngineError> {
        Ok(self.audit.verify_chain()?)
    }

    // ── Internals ───────────────────────────────────────────────────

    fn plan_transition(
        &self,
        actor: &Actor,
        patient: PatientId,
        plan: PlanId,
        kind: AuditRecordKind,
        f: impl FnOnce(&mut TreatmentPlan) -> Result<(), chartseal_workflow::WorkflowError>,
    ) -> Result<(), EngineError> {
        self.gated(actor, patient, GateOperation::PlanTransition, |cell| {
            let entry = cell
                .plans
                .get_mut(&plan)
                .ok_or(EngineError::PlanNotFound(plan))?;
            f(entry)?;
            let status = entry.status;
            Ok((
                (),
                vec![audit_input(
                    actor,
                    kind,
                    AuditEntityKind::Plan,
                    plan.to_string(),
                    patient,
                    format!("status now {status:?}"),
                )],
            ))
        })
    }

    /// Run one gated mutation: patient lock, gate check, mutate, audit.
    ///
    /// The operation's own audit records are appended only after the
    /// mutation succeeds; an `OverrideUsed` record is appended on every
    /// override use regardless of the outcome. Appends happen while the
    /// patient guard is still held — the trail's internal lock is a leaf —
    /// so the trail's per-patient order always matches mutation order.
    fn gated<T>(
        &self,
        actor: &Actor,
        patient: PatientId,
        operation: GateOperation,
        f: impl FnOnce(&mut PatientCell) -> Result<(T, Vec<AuditRecordInput>), EngineError>,
    ) -> Result<T, EngineError> {
        let cell = self.cell(patient)?;
        let mut guard = self.lock_cell(&cell)?;

        let clinical = guard.consent.status_of(ConsentCategory::Clinical);
        let override_used = match AccessGate::check(actor.role, clinical, operation) {
            Decision::Deny(DenialReason::ClinicalConsentRevoked) => {
                return Err(EngineError::ClinicalConsentRevoked);
            }
            Decision::Allow { override_used } => override_used,
        };

        let outcome = f(&mut guard);

        if override_used {
            self.audit.append(audit_input(
                actor,
                AuditRecordKind::OverrideUsed,
                AuditEntityKind::Patient,
                patient.to_string(),
                patient,
                format!("audit-override used for {operation:?}"),
            ))?;
        }

        let (value, audits) = outcome?;
        for input in audits {
            self.audit.append(input)?;
        }
        drop(guard);
        Ok(value)
    }

    fn cell(&self, patient: PatientId) -> Result<Arc<Mutex<PatientCell>>, EngineError> {
        if let Some(cell) = self
            .cells
            .read()
            .map_err(|_| EngineError::StatePoisoned)?
            .get(&patient)
        {
            return Ok(Arc::clone(cell));
        }
        let mut cells = self.cells.write().map_err(|_| EngineError::StatePoisoned)?;
        Ok(Arc::clone(cells.entry(patient).or_insert_with(|| {
            Arc::new(Mutex::new(PatientCell::new(patient)))
        })))
    }

    /// Bounded try-lock on one patient cell. Contention past the retry
    /// budget surfaces `ConcurrentMutationConflict` instead of blocking.
    fn lock_cell<'a>(
        &self,
        cell: &'a Arc<Mutex<PatientCell>>,
    ) -> Result<MutexGuard<'a, PatientCell>, EngineError> {
        let mut attempts: u32 = 0;
        loop {
            match cell.try_lock() {
                Ok(guard) => return Ok(guard),
                Err(TryLockError::Poisoned(_)) => return Err(EngineError::StatePoisoned),
                Err(TryLockError::WouldBlock) => {
                    attempts += 1;
                    if attempts >= self.config.lock_retries {
                        warn!(attempts, "patient lock contention exhausted retry budget");
                        return Err(EngineError::ConcurrentMutationConflict { retries: attempts });
                    }
                    std::thread::yield_now();
                }
            }
        }
    }
}

impl Default for ClinicEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Recompute a plan's computed completion from its linked notes, returning
/// the audit record for the transition if one happened.
fn recompute_plan(
    actor: &Actor,
    patient: PatientId,
    cell: &mut PatientCell,
    plan_id: PlanId,
) -> Option<AuditRecordInput> {
    let flags = cell.linked_completion_flags(plan_id);
    let plan = cell.plans.get_mut(&plan_id)?;
    if !plan.recompute_completion(&flags) {
        return None;
    }
    let (kind, detail) = if plan.status == PlanStatus::Completed {
        (AuditRecordKind::PlanCompleted, "all linked notes completed")
    } else {
        (AuditRecordKind::PlanReopened, "a linked note is open again")
    };
    Some(audit_input(
        actor,
        kind,
        AuditEntityKind::Plan,
        plan_id.to_string(),
        patient,
        detail.into(),
    ))
}

fn audit_input(
    actor: &Actor,
    kind: AuditRecordKind,
    entity_kind: AuditEntityKind,
    entity_id: String,
    patient: PatientId,
    detail: String,
) -> AuditRecordInput {
    AuditRecordInput {
        actor: actor.id.clone(),
        kind,
        entity_kind,
        entity_id,
        patient,
        detail,
    }
}
