use thiserror::Error;

/// Errors returned by the audit trail.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuditError {
    #[error("audit trail lock poisoned")]
    LockPoisoned,
}
