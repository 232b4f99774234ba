use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Provider failure classes, derived from the HTTP status of a rejected request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    Validation,
    RateLimited,
    Upstream,
    Internal,
}

impl ErrorCode {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            402 | 403 => Self::Forbidden,
            400 | 404 | 413 | 422 => Self::Validation,
            429 => Self::RateLimited,
            500..=599 => Self::Upstream,
            _ => Self::Internal,
        }
    }

    /// Worth trying again later without changing the request or the key.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::RateLimited | Self::Upstream)
    }
}

/// What the provider said when it refused a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::from_status(status), message)
    }
}
