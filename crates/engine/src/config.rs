use chartseal_workflow::WorkflowConfig;

/// Engine-level configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    pub workflow: WorkflowConfig,
    /// Bounded `try_lock` attempts on a patient cell before surfacing
    /// `ConcurrentMutationConflict`.
    pub lock_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workflow: WorkflowConfig::default(),
            lock_retries: 64,
        }
    }
}
