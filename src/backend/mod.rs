//! The backend render/analysis service and the session authority.
//!
//! The workflow only talks to the server through the [`Backend`] trait, so
//! tests can drive it with an in-memory fake. [`HttpBackend`] is the real
//! implementation.

mod auth;
mod http;

pub use auth::{Authority, StaticToken};
pub use http::HttpBackend;

use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;

use crate::capture::CapturedArtifact;
use crate::model::{AnalysisResult, Confirmation, ConfirmationReceipt, ResultId, UserProfile};

/// Failure talking to the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The bearer credential was rejected (HTTP 401).
    #[error("session expired")]
    Unauthorized,

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("server returned status {status}{}", .detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default())]
    Status { status: u16, detail: Option<String> },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl BackendError {
    /// The server-supplied explanation, when there is one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            BackendError::Status { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }
}

/// Everything the analyze endpoint needs, owned so it can outlive the form.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisRequest {
    pub image: CapturedArtifact,
    pub patient_id: String,
    pub clinic_id: String,
    pub symptoms: Option<String>,
    pub notes: Option<String>,
}

/// Contract of the backend service.
///
/// Futures are driven on the single-threaded workflow loop and need not be
/// `Send`.
#[allow(async_fn_in_trait)]
pub trait Backend {
    /// Reads the signed-in operator; fails with `Unauthorized` when the
    /// session is gone.
    async fn current_user(&self) -> Result<UserProfile, BackendError>;

    async fn start_preview(&self) -> Result<(), BackendError>;

    async fn stop_preview(&self) -> Result<(), BackendError>;

    /// One still frame of the current camera view.
    async fn preview_frame(&self) -> Result<Bytes, BackendError>;

    async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResult, BackendError>;

    async fn confirm(
        &self,
        result_id: ResultId,
        confirmation: Confirmation,
    ) -> Result<ConfirmationReceipt, BackendError>;
}

/// Runs `call`, converting an elapsed `timeout` into [`BackendError::Timeout`].
pub async fn with_timeout<T>(
    timeout: Duration,
    call: impl std::future::Future<Output = Result<T, BackendError>>,
) -> Result<T, BackendError> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::Timeout(timeout)),
    }
}
