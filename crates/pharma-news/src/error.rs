//! Error types shared by the content, comment and session clients.

use reqwest::StatusCode;

/// Convenience alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by operations that surface failures to the caller.
///
/// Listing operations on [`crate::ContentClient`] never return these; they
/// degrade to placeholder data instead. Mutations and session actions do.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The request could not be sent or the response body could not be read.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered 401 or 403.
    #[error("access denied by the API (status {})", .0.as_u16())]
    AccessDenied(StatusCode),

    /// The requested resource does not exist.
    #[error("resource not found")]
    NotFound,

    /// The API answered with a non-success status.
    #[error("API request failed with status {}: {message}", .status.as_u16())]
    Status {
        status: StatusCode,
        message: String,
    },

    /// The response body did not match the expected schema.
    #[error("unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),

    /// The caller supplied an argument the API would reject.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The identity provider refused to issue a token.
    #[error("login failed: {0}")]
    Login(String),

    /// An action needing an authenticated session was attempted without one.
    #[error("not logged in")]
    NotLoggedIn,

    /// Persisting or loading session tokens failed.
    #[error("token store error: {0}")]
    TokenStore(String),

    /// A source backing a post query failed.
    #[error("{0}")]
    Source(String),
}

impl Error {
    /// Maps a non-success status to the matching error variant.
    pub(crate) fn from_status(status: StatusCode, message: impl Into<String>) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::AccessDenied(status),
            StatusCode::NOT_FOUND => Self::NotFound,
            _ => Self::Status {
                status,
                message: message.into(),
            },
        }
    }

    /// Returns `true` for 401/403 responses, which latch the content API as
    /// unavailable.
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied(_))
    }
}
