use thiserror::Error;

use crate::database::StorageError;

/// Failure of a member directory lookup.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("member lookup failed: {0}")]
    Storage(#[from] StorageError),
    #[error("member lookup failed: {0}")]
    Backend(String),
}

/// Errors that abort a single emote interaction.
#[derive(Debug, Error)]
pub enum EmoteError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error("invalid emote operation: {0}")]
    Validation(String),
}

