use thiserror::Error;

/// Failures surfaced by the credential store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique constraint on email rejected the write
    #[error("email is already registered")]
    DuplicateEmail,

    #[error("user not found")]
    NotFound,

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Typed failures returned by the auth core. The HTTP layer owns the mapping
/// to status codes and user-facing messages.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("an account with this email already exists")]
    Conflict,

    /// Bad credentials, or a refresh/access token that can no longer be used.
    /// Unknown email and wrong password both produce this exact value.
    #[error("invalid credentials")]
    Authentication,

    /// Malformed, expired, wrongly signed or wrong-kind token
    #[error("invalid or expired token")]
    InvalidToken,

    #[error("user not found")]
    NotFound,

    #[error("credential store failure: {0}")]
    Store(#[source] StoreError),

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("token signing failed: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => AuthError::Conflict,
            StoreError::NotFound => AuthError::NotFound,
            other => AuthError::Store(other),
        }
    }
}

impl AuthError {
    /// Whether the error comes from infrastructure rather than from the caller
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            AuthError::Store(_) | AuthError::Hashing(_) | AuthError::Signing(_) | AuthError::Internal(_)
        )
    }
}
