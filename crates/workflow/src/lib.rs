//! Treatment-plan lifecycle and the deviation/variance protocol.
//!
//! The plan state machine is explicit: `Draft → PendingReview →
//! {Approved, Rejected} → Completed`, with `Approved` and `Rejected` able
//! to revert to `Draft`. Entering `Approved` requires a full
//! financial-consent capture — signature, identity snapshot, and timestamp
//! together; a partial capture is unrepresentable. `Completed` is computed
//! from the linked notes, never set directly.
//!
//! The deviation protocol runs when a note completes: a procedure that
//! differs from its planned baseline needs a deviation narrative, and a
//! price that exceeds the locked quote beyond tolerance needs a variance
//! narrative. Both checks are independent and may both apply.

pub mod config;
pub mod deviation;
pub mod error;
pub mod plan;

pub use config::WorkflowConfig;
pub use deviation::{CompletionChecks, CompletionRequest, DeviationFinding, VarianceFinding};
pub use error::WorkflowError;
pub use plan::{FinancialConsent, PlanStatus, TreatmentPlan};
