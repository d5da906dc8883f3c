use thiserror::Error;

use crate::api::ApiError;

/// Failure surfaced by the session manager.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The provider could not be reached.
    #[error("Network error: {0}")]
    Network(String),

    /// The provider answered with an error, or with something unusable.
    #[error("{0}")]
    Provider(String),

    /// The provider rejected the current access token.
    #[error("Session is no longer valid: {0}")]
    InvalidSession(String),

    /// A login or refresh is already in flight.
    #[error("Another sign-in request is already in progress")]
    Busy,
}

impl AuthError {
    /// Text for the UI's error banner.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Network(detail) => {
                let detail = detail.to_lowercase();
                if detail.contains("timed out") || detail.contains("timeout") {
                    "Connection timed out. Please try again.".to_string()
                } else {
                    "Unable to connect to server. Check your internet connection.".to_string()
                }
            }
            AuthError::Provider(message) => message.clone(),
            AuthError::InvalidSession(_) => "Session expired. Please sign in again.".to_string(),
            AuthError::Busy => self.to_string(),
        }
    }

    /// Classify a failed refresh. Any failure there means the token can no
    /// longer be trusted.
    pub(crate) fn invalid_session(err: ApiError) -> Self {
        AuthError::InvalidSession(err.to_string())
    }
}

impl From<ApiError> for AuthError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::NetworkError(e) if e.is_timeout() => {
                AuthError::Network(format!("request timed out: {}", e))
            }
            ApiError::NetworkError(e) => AuthError::Network(e.to_string()),
            ApiError::Unauthorized => {
                AuthError::Provider("Failed to authenticate with Google".to_string())
            }
            other => AuthError::Provider(other.to_string()),
        }
    }
}
