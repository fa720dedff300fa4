use chartseal_types::AmountMinor;
use thiserror::Error;

/// Errors returned by the patient ledger.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("amount must be positive, got {amount}; post a reversing entry to correct a mistake")]
    NegativeOrZeroAmount { amount: AmountMinor },

    #[error("ledger integrity violation at entry {seq}: {reason}; writes for this patient are halted")]
    IntegrityViolation { seq: u64, reason: String },
}
