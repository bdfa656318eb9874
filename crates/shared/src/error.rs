use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Shown when an oversize file is picked; the previous selection is kept.
pub const OVERSIZE_IMAGE_MESSAGE: &str = "Image size must be less than 10MB";

/// Shown when the request never reached the boundary or got no response.
pub const NETWORK_FAILURE_MESSAGE: &str =
    "Unable to reach the analysis service. Check your connection and try again.";

/// Fallback for error responses without a message and unparseable successes.
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to analyze image. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Rejected client-side before any network call.
    Validation,
    /// No response received from the boundary.
    Network,
    /// The boundary answered with a non-success status.
    Server,
    /// Success status but the body did not match the contract.
    UnexpectedResponse,
}

/// Terminal failure of one submission, surfaced to the user as text.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct AnalysisFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl AnalysisFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network() -> Self {
        Self::new(FailureKind::Network, NETWORK_FAILURE_MESSAGE)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Server, message)
    }

    pub fn unexpected_response() -> Self {
        Self::new(FailureKind::UnexpectedResponse, GENERIC_FAILURE_MESSAGE)
    }
}
