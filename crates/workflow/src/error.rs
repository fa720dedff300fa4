use chartseal_types::AmountMinor;
use thiserror::Error;

use crate::plan::PlanStatus;

/// Errors returned by the plan workflow and the deviation protocol.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("plan cannot move from {from:?} to {to:?}")]
    InvalidPlanTransition { from: PlanStatus, to: PlanStatus },

    #[error(
        "financial consent capture is incomplete: {missing} is empty; \
         signature, identity snapshot, and timestamp must all be captured together"
    )]
    IncompleteFinancialConsent { missing: &'static str },

    #[error(
        "completed procedure {actual:?} differs from planned {planned:?}; \
         supply a deviation narrative of at least {min_len} characters to complete this note"
    )]
    DeviationNarrativeRequired {
        planned: String,
        actual: String,
        min_len: usize,
    },

    #[error(
        "actual price {actual} exceeds the quoted {quoted} by more than {tolerance_pct}%; \
         supply a variance narrative to complete this note"
    )]
    VarianceNarrativeRequired {
        quoted: AmountMinor,
        actual: AmountMinor,
        tolerance_pct: u32,
    },

    #[error("plan can only be deleted while in Draft, current status is {status:?}")]
    PlanNotDeletable { status: PlanStatus },
}
