//! Error types for planner turns and configuration
//!
//! Turn errors are classified by recoverability:
//! - Retryable: network issues, model server hiccups, calendar 5xx
//! - RequiresUserAction: expired Google auth, missing model
//! - NonRetryable: everything else
//!
//! None of them are fatal; the chat shell renders them and the user may try again.

use std::path::PathBuf;
use thiserror::Error;

use crate::google_api::GoogleApiError;

/// Model backend failures (transport, HTTP status, or unusable payload).
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Model server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),
}

/// Error surfaced by a single chat / generate / condense turn.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("Calendar fetch failed: {0}")]
    ContextFetch(#[from] GoogleApiError),

    #[error("Model call failed: {0}")]
    Backend(#[from] BackendError),

    #[error("Turn aborted: {0}")]
    Aborted(String),
}

impl PlannerError {
    /// Returns true if trying the same turn again may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            PlannerError::ContextFetch(GoogleApiError::Http(e)) => e.is_timeout() || e.is_connect(),
            PlannerError::ContextFetch(GoogleApiError::ApiError { status, .. }) => {
                *status == 429 || *status >= 500
            }
            PlannerError::ContextFetch(_) => false,
            PlannerError::Backend(BackendError::Http(_)) => true,
            PlannerError::Backend(BackendError::Status { status, .. }) => *status >= 500,
            PlannerError::Backend(BackendError::MalformedResponse(_)) => false,
            PlannerError::Aborted(_) => true,
        }
    }

    /// Returns true if this error requires user action to resolve
    pub fn requires_user_action(&self) -> bool {
        matches!(
            self,
            PlannerError::ContextFetch(GoogleApiError::AuthExpired)
                | PlannerError::ContextFetch(GoogleApiError::TokenNotFound(_))
                | PlannerError::ContextFetch(GoogleApiError::CredentialsNotFound(_))
                | PlannerError::Backend(BackendError::Status { status: 404, .. })
        )
    }

    /// Get a user-friendly recovery suggestion
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            PlannerError::ContextFetch(GoogleApiError::AuthExpired)
            | PlannerError::ContextFetch(GoogleApiError::TokenNotFound(_)) => {
                "Run 'obsidian-planner auth' to reconnect Google Calendar."
            }
            PlannerError::ContextFetch(GoogleApiError::CredentialsNotFound(_)) => {
                "Place your OAuth client credentials.json in ~/.obsidian-planner/google/."
            }
            PlannerError::ContextFetch(_) => "Check your internet connection and try again.",
            PlannerError::Backend(BackendError::Http(_)) => {
                "Make sure Ollama is running ('ollama serve') and try again."
            }
            PlannerError::Backend(BackendError::Status { status: 404, .. }) => {
                "Pull the configured model first, e.g. 'ollama pull gemma3'."
            }
            PlannerError::Backend(_) => "Try again, or /condense if the conversation is long.",
            PlannerError::Aborted(_) => "Try again; details are in ~/.obsidian-planner/planner.log.",
        }
    }
}

/// Configuration file errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found at {0}")]
    NotFound(PathBuf),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Could not find home directory")]
    NoHomeDir,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_expired_requires_user_action() {
        let err = PlannerError::from(GoogleApiError::AuthExpired);
        assert!(err.requires_user_action());
        assert!(!err.is_retryable());
        assert!(err.recovery_suggestion().contains("auth"));
    }

    #[test]
    fn test_calendar_server_error_is_retryable() {
        let err = PlannerError::from(GoogleApiError::ApiError {
            status: 503,
            message: "backend unavailable".to_string(),
        });
        assert!(err.is_retryable());
        assert!(!err.requires_user_action());
    }

    #[test]
    fn test_missing_model_requires_user_action() {
        let err = PlannerError::from(BackendError::Status {
            status: 404,
            body: "model 'gemma3' not found".to_string(),
        });
        assert!(err.requires_user_action());
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("model 'gemma3' not found"));
    }

    #[test]
    fn test_aborted_turn_is_retryable() {
        let err = PlannerError::Aborted("backend panicked".into());
        assert!(err.is_retryable());
        assert!(!err.requires_user_action());
        assert_eq!(err.to_string(), "Turn aborted: backend panicked");
    }

    #[test]
    fn test_malformed_response_message() {
        let err = PlannerError::from(BackendError::MalformedResponse("no content".into()));
        assert_eq!(err.to_string(), "Model call failed: Malformed model response: no content");
    }
}
