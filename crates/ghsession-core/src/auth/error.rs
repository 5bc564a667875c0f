use thiserror::Error;

use crate::api::ApiError;
use crate::oauth::AuthorizationError;
use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    #[error("Code exchange failed: {0}")]
    Exchange(#[from] ApiError),

    #[error("Session storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to serialize user: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Authorization succeeded without a code")]
    MissingCode,

    #[error("Backend returned a token without a user")]
    MissingUser,
}
