use thiserror::Error;

use crate::api::ApiError;

/// Shown when the request timed out on the client side
pub const TIMEOUT_MESSAGE: &str = "Request timed out. Please try again.";

/// Shown when no response reached the client at all
pub const NETWORK_MESSAGE: &str = "Network error. Please check your connection.";

/// Shown for a 401 without a server message
pub const UNAUTHORIZED_MESSAGE: &str = "Authentication failed. Please check your credentials.";

/// Outcome of a failed session operation.
///
/// The `Display` text is what ends up in `Session::last_error`.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The server answered, but not with something usable.
    #[error("Invalid response: {0}")]
    Validation(String),

    /// The server rejected the request.
    #[error("{0}")]
    Auth(String),

    /// No usable response reached the client.
    #[error("{0}")]
    Network(String),

    /// Local persistence failed.
    #[error("Could not save session: {0:#}")]
    Storage(#[source] anyhow::Error),

    #[error("Not signed in")]
    NotAuthenticated,

    /// Sign-in attempted on top of a live session.
    #[error("Already signed in. Sign out first.")]
    AlreadyAuthenticated,
}

impl SessionError {
    /// Map a client error to the message a user should see.
    ///
    /// `fallback` is used when the server rejected the request without
    /// saying why.
    pub fn from_api(err: &ApiError, fallback: &str) -> Self {
        match err {
            ApiError::Timeout => SessionError::Network(TIMEOUT_MESSAGE.to_string()),
            ApiError::Network(_) => SessionError::Network(NETWORK_MESSAGE.to_string()),
            ApiError::InvalidResponse(detail) => SessionError::Validation(detail.clone()),
            ApiError::Unauthorized(message) => SessionError::Auth(
                message.clone().unwrap_or_else(|| UNAUTHORIZED_MESSAGE.to_string()),
            ),
            ApiError::RateLimited => SessionError::Auth(err.to_string()),
            ApiError::ServerError(_) => SessionError::Auth(fallback.to_string()),
            _ => SessionError::Auth(
                err.server_message()
                    .map(str::to_string)
                    .unwrap_or_else(|| fallback.to_string()),
            ),
        }
    }
}
