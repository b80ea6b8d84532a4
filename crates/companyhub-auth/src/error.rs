use companyhub_storage::StorageError;

use crate::jwt::JwtError;

/// Errors returned by the authentication service.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Username already taken: {0}")]
    UsernameTaken(String),

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Refresh session expired")]
    SessionExpired,

    #[error("Access token error: {0}")]
    Jwt(#[from] JwtError),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error("Authentication configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AuthError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// True when the caller failed to authenticate (maps to 401).
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials
                | Self::InvalidRefreshToken
                | Self::SessionExpired
                | Self::Jwt(_)
        )
    }
}

pub type AuthResult<T> = Result<T, AuthError>;
