use chartseal_types::{ActorId, PatientId, PlanId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::WorkflowError;

/// Lifecycle states of a treatment plan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    #[default]
    Draft,
    PendingReview,
    Approved,
    Rejected,
    Completed,
}

/// Captured financial consent: signature, identity snapshot, timestamp.
///
/// All three exist together or not at all — the type makes a partial
/// capture unrepresentable, and the constructor refuses empty payloads.
/// The signature and snapshot are opaque base64 blobs from the capture
/// canvas; the core enforces presence, never interprets content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialConsent {
    pub signature: String,
    pub identity_snapshot: String,
    pub captured_at: DateTime<Utc>,
}

impl FinancialConsent {
    pub fn new(
        signature: impl Into<String>,
        identity_snapshot: impl Into<String>,
    ) -> Result<Self, WorkflowError> {
        let signature = signature.into();
        let identity_snapshot = identity_snapshot.into();
        if signature.trim().is_empty() {
            return Err(WorkflowError::IncompleteFinancialConsent {
                missing: "signature",
            });
        }
        if identity_snapshot.trim().is_empty() {
            return Err(WorkflowError::IncompleteFinancialConsent {
                missing: "identity snapshot",
            });
        }
        Ok(Self {
            signature,
            identity_snapshot,
            captured_at: Utc::now(),
        })
    }
}

/// One treatment plan. Mutation is always a full workflow transition; no
/// partial field patching outside the methods below.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreatmentPlan {
    pub id: PlanId,
    pub patient: PatientId,
    pub name: String,
    pub status: PlanStatus,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
    /// Present exactly while the plan is Approved or Completed.
    pub financial_consent: Option<FinancialConsent>,
    /// Captures invalidated by a revert; retained, never deleted.
    pub superseded_consents: Vec<FinancialConsent>,
}

impl TreatmentPlan {
    pub fn new(patient: PatientId, name: impl Into<String>, created_by: ActorId) -> Self {
        Self {
            id: PlanId::new(),
            patient,
            name: name.into(),
            status: PlanStatus::Draft,
            created_by,
            created_at: Utc::now(),
            financial_consent: None,
            superseded_consents: Vec::new(),
        }
    }

    /// Draft → PendingReview.
    pub fn submit_for_review(&mut self) -> Result<(), WorkflowError> {
        self.transition(PlanStatus::Draft, PlanStatus::PendingReview)
    }

    /// PendingReview → Approved. Approval is inseparable from a complete
    /// financial-consent capture; there is no signature-less approval path.
    pub fn approve(&mut self, consent: FinancialConsent) -> Result<(), WorkflowError> {
        self.transition(PlanStatus::PendingReview, PlanStatus::Approved)?;
        info!(plan = %self.id, "plan approved with financial consent");
        self.financial_consent = Some(consent);
        Ok(())
    }

    /// PendingReview → Rejected.
    pub fn reject(&mut self) -> Result<(), WorkflowError> {
        self.transition(PlanStatus::PendingReview, PlanStatus::Rejected)
    }

    /// Approved | Rejected → Draft.
    ///
    /// Reverting an approved plan invalidates its consent capture: the
    /// capture moves to history and re-approval requires a fresh one.
    pub fn revert_to_draft(&mut self) -> Result<(), WorkflowError> {
        match self.status {
            PlanStatus::Approved | PlanStatus::Rejected => {
                if let Some(consent) = self.financial_consent.take() {
                    self.superseded_consents.push(consent);
                }
                info!(plan = %self.id, from = ?self.status, "plan reverted to draft");
                self.status = PlanStatus::Draft;
                Ok(())
            }
            from => Err(WorkflowError::InvalidPlanTransition {
                from,
                to: PlanStatus::Draft,
            }),
        }
    }

    /// Recompute the computed `Completed` state from the linked notes.
    ///
    /// An approved plan with at least one linked, non-superseded note
    /// becomes `Completed` once every such note is completed — and drops
    /// back to `Approved` if a correction reopens one (a superseding note
    /// starts uncompleted). Returns whether the plan transitioned on this
    /// call.
    pub fn recompute_completion(&mut self, linked_notes_completed: &[bool]) -> bool {
        let all_done = !linked_notes_completed.is_empty()
            && linked_notes_completed.iter().all(|c| *c);
        match self.status {
            PlanStatus::Approved if all_done => {
                info!(plan = %self.id, "plan completed: all linked notes are completed");
                self.status = PlanStatus::Completed;
                true
            }
            PlanStatus::Completed if !all_done => {
                info!(plan = %self.id, "plan reopened: a linked note is no longer completed");
                self.status = PlanStatus::Approved;
                true
            }
            _ => false,
        }
    }

    /// Deletion is permitted only while Draft.
    pub fn ensure_deletable(&self) -> Result<(), WorkflowError> {
        if self.status != PlanStatus::Draft {
            return Err(WorkflowError::PlanNotDeletable {
                status: self.status,
            });
        }
        Ok(())
    }

    /// Whether the plan carries a locked financial consent (variance checks
    /// apply only then).
    pub fn is_financially_locked(&self) -> bool {
        matches!(self.status, PlanStatus::Approved | PlanStatus::Completed)
            && self.financial_consent.is_some()
    }

    fn transition(&mut self, from: PlanStatus, to: PlanStatus) -> Result<(), WorkflowError> {
        if self.status != from {
            return Err(WorkflowError::InvalidPlanTransition {
                from: self.status,
                to,
            });
        }
        info!(plan = %self.id, ?from, ?to, "plan transition");
        self.status = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn plan() -> TreatmentPlan {
        TreatmentPlan::new(PatientId::new(), "Phase 1", ActorId::new("dr-reyes"))
    }

    fn consent() -> FinancialConsent {
        FinancialConsent::new("c2lnbmF0dXJl", "c25hcHNob3Q=").unwrap()
    }

    #[test]
    fn happy_path_draft_to_completed() {
        let mut plan = plan();
        plan.submit_for_review().unwrap();
        plan.approve(consent()).unwrap();
        assert_eq!(plan.status, PlanStatus::Approved);
        assert!(plan.is_financially_locked());

        assert!(plan.recompute_completion(&[true, true]));
        assert_eq!(plan.status, PlanStatus::Completed);
    }

    #[test]
    fn approval_from_draft_is_refused() {
        let mut plan = plan();
        let error = plan.approve(consent()).unwrap_err();
        assert_eq!(
            error,
            WorkflowError::InvalidPlanTransition {
                from: PlanStatus::Draft,
                to: PlanStatus::Approved,
            }
        );
        // A refused approval captures nothing.
        assert!(plan.financial_consent.is_none());
    }

    #[test]
    fn partial_consent_is_unrepresentable() {
        assert_eq!(
            FinancialConsent::new("", "snapshot").unwrap_err(),
            WorkflowError::IncompleteFinancialConsent {
                missing: "signature"
            }
        );
        assert_eq!(
            FinancialConsent::new("sig", "   ").unwrap_err(),
            WorkflowError::IncompleteFinancialConsent {
                missing: "identity snapshot"
            }
        );
    }

    #[test]
    fn revert_from_approved_invalidates_consent() {
        let mut plan = plan();
        plan.submit_for_review().unwrap();
        plan.approve(consent()).unwrap();

        plan.revert_to_draft().unwrap();
        assert_eq!(plan.status, PlanStatus::Draft);
        assert!(plan.financial_consent.is_none());
        assert_eq!(plan.superseded_consents.len(), 1);
        assert!(!plan.is_financially_locked());
    }

    #[test]
    fn rejected_returns_to_draft() {
        let mut plan = plan();
        plan.submit_for_review().unwrap();
        plan.reject().unwrap();
        assert_eq!(plan.status, PlanStatus::Rejected);
        plan.revert_to_draft().unwrap();
        assert_eq!(plan.status, PlanStatus::Draft);
    }

    #[test]
    fn completion_is_computed_not_settable() {
        let mut plan = plan();
        // Not approved: nothing to complete.
        assert!(!plan.recompute_completion(&[true]));

        plan.submit_for_review().unwrap();
        plan.approve(consent()).unwrap();

        // No linked notes, or an incomplete one, keeps the plan Approved.
        assert!(!plan.recompute_completion(&[]));
        assert!(!plan.recompute_completion(&[true, false]));
        assert_eq!(plan.status, PlanStatus::Approved);
    }

    #[test]
    fn completion_regresses_when_a_linked_note_reopens() {
        let mut plan = plan();
        plan.submit_for_review().unwrap();
        plan.approve(consent()).unwrap();
        assert!(plan.recompute_completion(&[true]));
        assert_eq!(plan.status, PlanStatus::Completed);

        // A correction superseded the completed note with an open one.
        assert!(plan.recompute_completion(&[false]));
        assert_eq!(plan.status, PlanStatus::Approved);
        // The consent capture survives the regression.
        assert!(plan.financial_consent.is_some());
        assert!(plan.is_financially_locked());
    }

    #[test]
    fn deletable_only_while_draft() {
        let mut plan = plan();
        plan.ensure_deletable().unwrap();
        plan.submit_for_review().unwrap();
        assert_eq!(
            plan.ensure_deletable().unwrap_err(),
            WorkflowError::PlanNotDeletable {
                status: PlanStatus::PendingReview
            }
        );
    }

    #[derive(Debug, Clone)]
    enum PlanOp {
        Submit,
        Approve,
        Reject,
        Revert,
    }

    fn op_strategy() -> impl Strategy<Value = Vec<PlanOp>> {
        proptest::collection::vec(
            prop_oneof![
                Just(PlanOp::Submit),
                Just(PlanOp::Approve),
                Just(PlanOp::Reject),
                Just(PlanOp::Revert),
            ],
            0..24,
        )
    }

    proptest! {
        #[test]
        fn property_transitions_stay_inside_the_table(ops in op_strategy()) {
            let mut plan = TreatmentPlan::new(
                PatientId::new(),
                "prop plan",
                ActorId::new("prop-actor"),
            );

            for op in ops {
                let before = plan.status;
                let result = match op {
                    PlanOp::Submit => plan.submit_for_review(),
                    PlanOp::Approve => plan.approve(
                        FinancialConsent::new("sig", "snap").unwrap(),
                    ),
                    PlanOp::Reject => plan.reject(),
                    PlanOp::Revert => plan.revert_to_draft(),
                };
                if result.is_err() {
                    // A refused transition leaves the status untouched.
                    prop_assert_eq!(plan.status, before);
                }
                // Approved always implies a present consent capture.
                if plan.status == PlanStatus::Approved {
                    prop_assert!(plan.financial_consent.is_some());
                }
                if plan.status == PlanStatus::Draft {
                    prop_assert!(plan.financial_consent.is_none());
                }
            }
        }
    }
}
