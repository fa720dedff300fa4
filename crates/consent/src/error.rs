use chartseal_types::ConsentCategory;
use thiserror::Error;

/// Errors returned by the consent log.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConsentError {
    #[error(
        "revoking {category:?} consent requires an explicit confirmation acknowledgement; \
         re-submit with the confirmation flag set"
    )]
    InvalidConsentConfirmation { category: ConsentCategory },
}
