use std::path::PathBuf;
use thiserror::Error;

use crate::backend::BackendError;
use crate::submit::SubmissionError;
use crate::validation::ValidationError;

/// The main error type for smearscope operations.
#[derive(Debug, Error)]
pub enum SmearscopeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read image {path}: {source}")]
    ImageRead {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to decode image: {0}")]
    ImageDecode(#[source] image::ImageError),

    #[error("Failed to encode annotated image: {0}")]
    ImageEncode(#[source] image::ImageError),

    #[error("Failed to parse detections from {path}: {source}")]
    DetectionsParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write JSON output: {0}")]
    JsonWrite(#[source] serde_json::Error),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("{0}")]
    Submission(#[from] SubmissionError),

    /// The backend refused an operation; the payload is the operator message.
    #[error("{0}")]
    Rejected(String),

    /// The camera preview gave up; the payload is the operator message.
    #[error("{0}")]
    PreviewTripped(String),

    #[error("Session expired, please sign in again")]
    SessionExpired,

    #[error("Invalid server URL '{url}': {source}")]
    InvalidServerUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Workflow ended before {0}")]
    WorkflowEnded(&'static str),
}
