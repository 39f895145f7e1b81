use thiserror::Error;

use crate::session::StorageError;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Sign-in was cancelled")]
    Cancelled,

    #[error("Could not open the sign-in window: {0}")]
    PopupBlocked(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Sign-in rejected by provider: {0}")]
    Rejected(String),

    #[error("Provider returned no usable token")]
    MissingToken,

    #[error("A sign-in is already in progress")]
    AlreadyInProgress,

    #[error("Sign-in is not configured: {0}")]
    NotConfigured(String),

    #[error("Could not store the session token: {0}")]
    Storage(#[from] StorageError),
}

impl AuthError {
    /// Message for the blocking notice shown to the user
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Cancelled => "Google sign-in was cancelled.".to_string(),
            AuthError::PopupBlocked(detail) => {
                format!("Could not open the Google sign-in page ({}).", detail)
            }
            AuthError::Network(e) if e.is_timeout() => {
                "Connection timed out. Please try again.".to_string()
            }
            AuthError::Network(_) => {
                "Unable to reach Google. Check your internet connection.".to_string()
            }
            AuthError::Rejected(reason) => format!("Google rejected the sign-in: {}", reason),
            AuthError::MissingToken => {
                "Google did not return a token. Please try again.".to_string()
            }
            AuthError::AlreadyInProgress => "Google sign-in is already in progress.".to_string(),
            AuthError::NotConfigured(detail) => {
                format!("Google sign-in is not configured. {}", detail)
            }
            AuthError::Storage(_) => "Could not save the session token.".to_string(),
        }
    }

    /// True for outcomes the user chose, which are logged below error level
    pub fn is_user_cancelled(&self) -> bool {
        matches!(self, AuthError::Cancelled)
    }
}
