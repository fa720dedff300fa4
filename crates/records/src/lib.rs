//! Clinical note records: seal-then-immutable storage with
//! supersede-not-overwrite corrections.
//!
//! This crate provides:
//! - `seal` — the canonical SHA-256 content hash over a note's clinical
//!   fields (and nothing else, so non-clinical metadata can change without
//!   invalidating the seal)
//! - `ClinicalNoteEntry` — one note version in the arena
//! - `NoteStore` — the per-patient versioned arena enforcing immutability
//!
//! Once a note is sealed its clinical fields never change again; a
//! correction appends a new entry whose `supersedes` points back at the
//! sealed original, and the original is flagged superseded but kept
//! forever.

pub mod error;
pub mod note;
pub mod seal;
pub mod store;

pub use error::RecordError;
pub use note::{ClinicalFields, ClinicalNoteEntry, CompletionOutcome, NoteSeal, NoteStatus};
pub use seal::seal_fields;
pub use store::NoteStore;
