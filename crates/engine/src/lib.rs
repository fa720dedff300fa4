//! The chartseal engine: the only mutation surface over patient state.
//!
//! Each patient's aggregate (notes, plans, ledger, consent) lives in one
//! mutex-guarded cell, so every read-modify-write sequence on a patient —
//! ledger balances, computed plan completion — is serialized, while
//! operations on different patients never block one another. Lock
//! acquisition is a bounded retry; exhaustion surfaces
//! `ConcurrentMutationConflict` rather than blocking indefinitely.
//!
//! Every clinical mutation passes through the access gate exactly once,
//! and every successful mutation appends its audit record afterwards —
//! never before — so the trail is ordered consistently with the state it
//! describes. The audit-override role additionally appends `OverrideUsed`
//! on every gated call it makes against a revoked record, whether or not
//! the underlying operation succeeds.

pub mod cell;
pub mod config;
pub mod engine;
pub mod error;
pub mod snapshot;

pub use config::EngineConfig;
pub use engine::ClinicEngine;
pub use error::EngineError;
pub use snapshot::PatientSnapshot;
