use chartseal_audit::AuditError;
use chartseal_consent::ConsentError;
use chartseal_ledger::LedgerError;
use chartseal_records::RecordError;
use chartseal_types::PlanId;
use chartseal_workflow::WorkflowError;
use thiserror::Error;

/// Top-level error surface of the engine.
///
/// Everything here is a recoverable workflow refusal except
/// `Ledger(IntegrityViolation)`, which additionally halts ledger writes
/// for the affected patient.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error(
        "clinical consent for this patient is revoked; restore clinical consent \
         or use the integrity-audit role to proceed"
    )]
    ClinicalConsentRevoked,

    #[error(
        "patient record is busy: could not acquire the patient lock after {retries} attempts; \
         retry the operation"
    )]
    ConcurrentMutationConflict { retries: u32 },

    #[error("patient state lock poisoned by a prior panic")]
    StatePoisoned,

    #[error("plan {0} not found")]
    PlanNotFound(PlanId),

    #[error(transparent)]
    Consent(#[from] ConsentError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Audit(#[from] AuditError),
}
