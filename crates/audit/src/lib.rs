//! Immutable audit trail for every state-changing operation in the core.
//!
//! Records are hash-chained: each record's SHA-256 hash covers its own
//! canonical fields plus the previous record's hash, so any later edit or
//! deletion is detectable by replaying the chain. The trail is never read
//! back into business logic; it exists for display, export, and forensic
//! verification.
//!
//! External collaborators (e.g. a notification service reacting to consent
//! revocations) subscribe to appended records. Fan-out is fire-and-forget:
//! a failing subscriber is logged and ignored, and never rolls back the
//! mutation the record describes.

pub mod error;
pub mod record;
pub mod trail;

pub use error::AuditError;
pub use record::{AuditEntityKind, AuditRecord, AuditRecordInput, AuditRecordKind};
pub use trail::{AuditSubscriber, AuditTrail, ChainVerification};
