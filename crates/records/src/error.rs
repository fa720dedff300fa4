use chartseal_types::{AmountMinor, NoteId};
use thiserror::Error;

/// Errors returned by the note store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("note {0} not found")]
    NoteNotFound(NoteId),

    #[error(
        "note {0} is sealed and its clinical fields are immutable; \
         record a correction as a superseding note instead"
    )]
    AlreadySealed(NoteId),

    #[error("note {0} is not sealed; edit it directly instead of superseding")]
    NotSealed(NoteId),

    #[error("note {0} has been superseded by {1}; act on the current version")]
    Superseded(NoteId, NoteId),

    #[error("note {0} is already completed")]
    AlreadyCompleted(NoteId),

    #[error("note price must be positive, got {amount}; supply a positive minor-unit amount")]
    NonPositivePrice { amount: AmountMinor },
}
