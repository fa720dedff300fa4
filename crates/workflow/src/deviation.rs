//! The deviation/variance protocol run at note completion.
//!
//! Two independent checks:
//! - **Deviation**: the procedure completed differs from the baseline
//!   captured when the note was first linked to its plan.
//! - **Financial variance**: the plan carries a locked financial consent
//!   and the actual price exceeds the quote beyond tolerance.
//!
//! Either check failing refuses the completion outright; the caller's note
//! state stays fully intact. Both may apply to one completion event.

use chartseal_types::AmountMinor;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::WorkflowConfig;
use crate::error::WorkflowError;

/// Everything the protocol needs to evaluate one completion attempt.
#[derive(Clone, Debug)]
pub struct CompletionRequest<'a> {
    pub procedure_at_completion: &'a str,
    /// Baseline captured at first plan link; `None` means no baseline and
    /// no deviation check.
    pub planned_procedure: Option<&'a str>,
    pub quoted_price: Option<AmountMinor>,
    pub actual_price: Option<AmountMinor>,
    /// Whether the owning plan is Approved with a locked financial consent.
    pub plan_financially_locked: bool,
    pub deviation_narrative: Option<&'a str>,
    pub variance_narrative: Option<&'a str>,
}

/// An accepted deviation: what was planned, and the clinician's account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviationFinding {
    pub original_planned_procedure: String,
    pub narrative: String,
}

/// An accepted variance: the price gap and the clinician's account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarianceFinding {
    pub quoted: AmountMinor,
    pub actual: AmountMinor,
    pub narrative: String,
}

/// Outcome of a completion evaluation that passed both checks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompletionChecks {
    pub deviation: Option<DeviationFinding>,
    pub variance: Option<VarianceFinding>,
}

impl CompletionChecks {
    /// Evaluate one completion attempt against the configured protocol.
    pub fn evaluate(
        request: &CompletionRequest<'_>,
        config: &WorkflowConfig,
    ) -> Result<Self, WorkflowError> {
        let deviation = check_deviation(request, config)?;
        let variance = check_variance(request, config)?;
        Ok(Self {
            deviation,
            variance,
        })
    }
}

fn check_deviation(
    request: &CompletionRequest<'_>,
    config: &WorkflowConfig,
) -> Result<Option<DeviationFinding>, WorkflowError> {
    let Some(planned) = request.planned_procedure else {
        return Ok(None);
    };
    if planned == request.procedure_at_completion {
        return Ok(None);
    }

    let narrative = request
        .deviation_narrative
        .map(str::trim)
        .filter(|n| n.chars().count() >= config.deviation_narrative_min);

    match narrative {
        Some(narrative) => {
            debug!(planned, actual = request.procedure_at_completion, "deviation accepted");
            Ok(Some(DeviationFinding {
                original_planned_procedure: planned.to_string(),
                narrative: narrative.to_string(),
            }))
        }
        None => {
            warn!(
                planned,
                actual = request.procedure_at_completion,
                "completion refused: deviation narrative missing or too short"
            );
            Err(WorkflowError::DeviationNarrativeRequired {
                planned: planned.to_string(),
                actual: request.procedure_at_completion.to_string(),
                min_len: config.deviation_narrative_min,
            })
        }
    }
}

fn check_variance(
    request: &CompletionRequest<'_>,
    config: &WorkflowConfig,
) -> Result<Option<VarianceFinding>, WorkflowError> {
    if !request.plan_financially_locked {
        return Ok(None);
    }
    let (Some(quoted), Some(actual)) = (request.quoted_price, request.actual_price) else {
        return Ok(None);
    };
    if quoted <= 0 {
        return Ok(None);
    }
    // Integer form of: actual > quoted * (1 + tolerance/100). Widened to
    // i128 so extreme i64 prices cannot overflow the comparison.
    let within_tolerance = (actual as i128) * 100
        <= (quoted as i128) * (100 + config.variance_tolerance_pct as i128);
    if within_tolerance {
        return Ok(None);
    }

    let narrative = request
        .variance_narrative
        .map(str::trim)
        .filter(|n| !n.is_empty());

    match narrative {
        Some(narrative) => {
            debug!(quoted, actual, "variance accepted");
            Ok(Some(VarianceFinding {
                quoted,
                actual,
                narrative: narrative.to_string(),
            }))
        }
        None => {
            warn!(quoted, actual, "completion refused: variance narrative missing");
            Err(WorkflowError::VarianceNarrativeRequired {
                quoted,
                actual,
                tolerance_pct: config.variance_tolerance_pct,
            })
        }
    }
}
