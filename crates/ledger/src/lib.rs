//! Append-only financial ledger per patient.
//!
//! Every entry records the running balance after itself: charges add,
//! payments subtract, and the first entry starts from zero. The sequence is
//! never mutated; corrections are made by appending a reversing entry. A
//! payment may drive the balance negative — overpayment credit is a valid
//! billing state, not an error.
//!
//! Posting replays the balance chain first. A chain that no longer
//! reconciles is a forensic-integrity failure: the ledger halts further
//! writes for the patient and every subsequent post surfaces
//! `IntegrityViolation` instead of compounding the damage.

pub mod error;
pub mod ledger;

pub use error::LedgerError;
pub use ledger::{LedgerEntry, LedgerEntryKind, LedgerStatement, PatientLedger};
