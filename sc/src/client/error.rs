//! Client error types

use thiserror::Error;

/// Errors that can occur while talking to the backend
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Api {
        status: u16,
        message: String,
        data: Option<serde_json::Value>,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Run stream terminated after {chunks} chunk(s): {reason}")]
    StreamTerminated { chunks: usize, reason: String },

    #[error("Run stream already failed")]
    StreamFailed,

    #[error("Validation rejected: {}", reasons.join("; "))]
    RemoteValidation { reasons: Vec<String> },

    #[error("Invalid base URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid run id: {0}")]
    InvalidRunId(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// True when the request itself failed, as opposed to the backend answering "no"
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ClientError::Transport(_) | ClientError::StreamTerminated { .. } | ClientError::StreamFailed
        )
    }

    /// Backend-supplied reasons for a rejected validation
    pub fn validation_reasons(&self) -> Option<&[String]> {
        match self {
            ClientError::RemoteValidation { reasons } => Some(reasons),
            _ => None,
        }
    }

    /// HTTP status of an API error
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
