//! Consent governance: an append-only grant/revoke event log per patient.
//!
//! This crate provides:
//! - `ConsentEvent`, the immutable record of one grant or revoke action
//! - `ConsentLog`, the per-patient event sequence with derived status
//!
//! The log is append-only: no event is ever edited or removed. Current
//! status for a category is the status of the most recent event for that
//! category. Revoking the `Clinical` category is the only revoke with
//! systemic effect and must carry an explicit acknowledgement; the literal
//! confirmation token the staff member re-types is a contract on the
//! calling UI, not on this crate.

pub mod error;
pub mod event;
pub mod log;

pub use error::ConsentError;
pub use event::{ConsentEvent, ConsentEventKind};
pub use log::ConsentLog;
