use serde::{Deserialize, Serialize};

/// Named, overridable protocol constants.
///
/// The defaults mirror long-standing clinic practice but are deliberately
/// not hard-coded at the check sites: a deployment may tighten or relax
/// them without touching the protocol logic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Actual price may exceed the locked quote by at most this percentage
    /// before a variance narrative is required.
    pub variance_tolerance_pct: u32,
    /// Minimum length, in non-whitespace-trimmed characters, of a
    /// deviation narrative.
    pub deviation_narrative_min: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            variance_tolerance_pct: 20,
            deviation_narrative_min: 20,
        }
    }
}
