//! Core type definitions shared across the chartseal workspace.
//!
//! This crate provides canonical ids, staff roles, consent categories, and
//! the minor-unit money representation. It carries no behavior beyond
//! construction and display.

pub mod consent;
pub mod ids;
pub mod money;
pub mod roles;

// Re-export primary types at crate root for ergonomic use.
pub use consent::{ConsentCategory, ConsentStatus};
pub use ids::{ActorId, NoteId, PatientId, PlanId};
pub use money::AmountMinor;
pub use roles::{Actor, ActorRole};
