use thiserror::Error;

use crate::store::StoreError;

/// Failure kinds of the auth core.
///
/// The first six variants are the client-facing taxonomy; the rest are
/// infrastructure failures that the HTTP layer reports as 500.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown username or wrong password; the two are never distinguished.
    #[error("invalid username or password")]
    AuthenticationFailed,
    #[error("username already registered")]
    UsernameTaken,
    /// Bad signature, malformed token or missing subject.
    #[error("invalid token")]
    InvalidToken,
    /// Signature is valid but the expiry has passed.
    #[error("token expired")]
    ExpiredToken,
    /// Token is valid but its subject no longer resolves.
    #[error("user not found")]
    UserNotFound,
    #[error("forbidden")]
    Forbidden,
    /// The validity window pushes the expiry past the timestamp range.
    #[error("token expiry out of range")]
    ExpiryOutOfRange,
    #[error("token signing failed")]
    Signing(#[source] jsonwebtoken::errors::Error),
    #[error("password worker failed")]
    Worker(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthError {
    /// True for failures that mean "the caller is not authenticated".
    #[must_use]
    pub const fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed | Self::InvalidToken | Self::ExpiredToken | Self::UserNotFound
        )
    }
}
