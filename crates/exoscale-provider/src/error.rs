//! Provider error types

use exoscale_client::ApiError;
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced to the engine
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Invalid: {0}")]
    Invalid(String),

    #[error("{op} of {kind} {id:?} timed out")]
    Timeout {
        op: &'static str,
        kind: String,
        id: String,
    },

    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    #[error("Provider configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Concept-level error kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Invalid,
    Conflict,
    Transport,
    Timeout,
    Ambiguous,
}

impl ProviderError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ProviderError::Invalid(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::Api(e) if e.is_not_found())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::Api(e) => match e {
                ApiError::NotFound(_) => ErrorKind::NotFound,
                ApiError::Invalid(_) => ErrorKind::Invalid,
                ApiError::Conflict(_) => ErrorKind::Conflict,
                ApiError::Timeout(_) => ErrorKind::Timeout,
                ApiError::Ambiguous { .. } => ErrorKind::Ambiguous,
                ApiError::Unauthorized(_)
                | ApiError::Transport(_)
                | ApiError::JobFailed { .. }
                | ApiError::OperationFailed { .. }
                | ApiError::Json(_) => ErrorKind::Transport,
            },
            ProviderError::Invalid(_)
            | ProviderError::UnknownResource(_)
            | ProviderError::Config(_)
            | ProviderError::Json(_) => ErrorKind::Invalid,
            ProviderError::Timeout { .. } => ErrorKind::Timeout,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;
