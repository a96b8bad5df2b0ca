//! Authentication error types.

use thiserror::Error;

use crate::backend::BackendError;
use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong email or password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// An account with the email already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// The access token was rejected.
    #[error("session expired")]
    SessionExpired,

    /// The auth provider returned an identity without a usable email.
    #[error("auth provider returned an invalid email")]
    InvalidEmail(#[from] golzar_core::EmailError),

    /// Session state missing or invalid.
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Auth provider call failed.
    #[error("auth provider error: {0}")]
    Provider(BackendError),

    /// Role or profile lookup failed.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<BackendError> for AuthError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unauthorized(_) => Self::SessionExpired,
            BackendError::Api { status: 400, .. } => Self::InvalidCredentials,
            BackendError::Api { status: 422, ref message }
                if message.to_lowercase().contains("already registered") =>
            {
                Self::UserAlreadyExists
            }
            BackendError::Conflict(_) => Self::UserAlreadyExists,
            other => Self::Provider(other),
        }
    }
}
