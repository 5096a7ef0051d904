//! Exoscale API error types

use thiserror::Error;

/// Errors returned by every API call.
///
/// The variants are the error kinds reconcilers branch on; everything else is
/// folded into [`ApiError::Transport`] with the server message attached.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    Invalid(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("{kind} {name:?} matches {count} resources, use an ID instead")]
    Ambiguous {
        kind: &'static str,
        name: String,
        count: usize,
    },

    #[error("Async job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },

    #[error("Operation {id} ended in state {state}: {message}")]
    OperationFailed {
        id: String,
        state: String,
        message: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }

    /// Map a non-2xx HTTP status of the v2 and DNS APIs to an error kind.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let message = extract_message(body.into());
        match status {
            404 => ApiError::NotFound(message),
            400 | 422 => ApiError::Invalid(message),
            409 => ApiError::Conflict(message),
            401 | 403 => ApiError::Unauthorized(message),
            504 => ApiError::Timeout(message),
            _ => ApiError::Transport(format!("HTTP {}: {}", status, message)),
        }
    }

    /// Map a legacy v1 `errorcode` to an error kind.
    pub fn from_v1(code: u64, text: impl Into<String>) -> Self {
        let text = text.into();
        let lowered = text.to_lowercase();
        match code {
            431 if lowered.contains("does not exist") || lowered.contains("not found") => {
                ApiError::NotFound(text)
            }
            431 => ApiError::Invalid(text),
            530 if lowered.contains("does not exist") || lowered.contains("not found") => {
                ApiError::NotFound(text)
            }
            401 | 432 => ApiError::Unauthorized(text),
            537 => ApiError::Conflict(text),
            _ => ApiError::Transport(format!("errorcode {}: {}", code, text)),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

/// Pull the `message` field out of a JSON error body, falling back to the raw text.
fn extract_message(body: String) -> String {
    serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or(body)
}

pub type Result<T> = std::result::Result<T, ApiError>;
