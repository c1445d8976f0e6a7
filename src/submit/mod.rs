//! Analysis submission and result confirmation.
//!
//! Each operation is guarded by a [`RequestLock`]: preparing a request takes
//! the lock, and the returned pending request owns the guard until it is
//! finished, fails, panics or is dropped unfinished. There is no path that
//! leaves the control locked.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use thiserror::Error;

use crate::acquisition::AcquisitionMode;
use crate::backend::{with_timeout, AnalysisRequest, Backend, BackendError};
use crate::capture::CapturedArtifact;
use crate::model::{AnalysisResult, Confirmation, ConfirmationReceipt, ResultId, ResultLabel};
use crate::validation::{self, IssueCode, ValidationError};

/// Fallback shown when the server refuses an analysis without a message.
pub const ANALYSIS_FAILED: &str = "Analysis failed";
/// Shown when an analysis never got an answer.
pub const ANALYSIS_UNREACHABLE: &str = "Failed to analyze image";
/// Fallback shown when a confirmation fails without a server message.
pub const CONFIRMATION_FAILED: &str = "Failed to confirm result";
/// Clinic used when neither the form nor the operator profile names one.
pub const UNASSIGNED_CLINIC: &str = "00000000-0000-0000-0000-000000000000";

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// A 401 was returned; the flow is aborted.
    #[error("session expired")]
    SessionExpired,

    /// The backend refused or could not complete the request. `message` is
    /// the server explanation or the operation's fallback text.
    #[error("{message}")]
    Rejected {
        message: String,
        #[source]
        source: BackendError,
    },
}

/// Operator texts for one operation: `refused` when the server answered
/// without a detail, `unreachable` when it never answered.
#[derive(Clone, Copy, Debug)]
struct Fallbacks {
    refused: &'static str,
    unreachable: &'static str,
}

const ANALYZE: Fallbacks = Fallbacks {
    refused: ANALYSIS_FAILED,
    unreachable: ANALYSIS_UNREACHABLE,
};

const CONFIRM: Fallbacks = Fallbacks {
    refused: CONFIRMATION_FAILED,
    unreachable: CONFIRMATION_FAILED,
};

impl SubmissionError {
    fn from_backend(source: BackendError, fallbacks: Fallbacks) -> Self {
        let fallback = match source {
            BackendError::Unauthorized => return SubmissionError::SessionExpired,
            BackendError::Transport(_) | BackendError::Timeout(_) => fallbacks.unreachable,
            BackendError::Status { .. } | BackendError::Decode(_) => fallbacks.refused,
        };
        SubmissionError::Rejected {
            message: source.detail().unwrap_or(fallback).to_string(),
            source,
        }
    }
}

/// Re-entrancy lock for one submit control.
#[derive(Clone, Debug, Default)]
pub struct RequestLock {
    locked: Rc<Cell<bool>>,
}

impl RequestLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_locked(&self) -> bool {
        self.locked.get()
    }

    /// Locks the control, or returns `None` if a request is outstanding.
    pub fn try_acquire(&self) -> Option<LockGuard> {
        if self.locked.replace(true) {
            return None;
        }
        Some(LockGuard {
            locked: Rc::clone(&self.locked),
        })
    }
}

/// Holds a [`RequestLock`] until dropped.
#[derive(Debug)]
pub struct LockGuard {
    locked: Rc<Cell<bool>>,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.locked.set(false);
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// What the operator filled in on the analysis form.
#[derive(Clone, Debug, Default)]
pub struct SubmissionForm {
    pub patient_id: String,
    /// Falls back to the operator's clinic when absent.
    pub clinic_id: Option<String>,
    /// The chosen file; only consulted in upload mode.
    pub upload: Option<CapturedArtifact>,
    pub symptoms: Option<String>,
    pub notes: Option<String>,
}

/// Validates and sends analysis requests and confirmations, one at a time
/// per control.
#[derive(Debug)]
pub struct AnalysisSubmitter {
    analyze_lock: RequestLock,
    confirm_lock: RequestLock,
    timeout: Duration,
    max_upload_bytes: usize,
}

impl AnalysisSubmitter {
    pub fn new(timeout: Duration, max_upload_bytes: usize) -> Self {
        Self {
            analyze_lock: RequestLock::new(),
            confirm_lock: RequestLock::new(),
            timeout,
            max_upload_bytes,
        }
    }

    pub fn is_submitting(&self) -> bool {
        self.analyze_lock.is_locked()
    }

    pub fn is_confirming(&self) -> bool {
        self.confirm_lock.is_locked()
    }

    /// Validates `form` for `mode` and locks the submit control.
    ///
    /// Nothing is locked when validation fails.
    pub fn prepare(
        &self,
        mode: AcquisitionMode,
        form: SubmissionForm,
        captured: Option<&CapturedArtifact>,
    ) -> Result<PendingSubmission, SubmissionError> {
        let image = validation::validate_submission(
            mode,
            &form.patient_id,
            form.upload.as_ref(),
            captured,
            self.max_upload_bytes,
        )?
        .clone();

        let guard = self
            .analyze_lock
            .try_acquire()
            .ok_or_else(|| ValidationError::new(IssueCode::RequestInFlight))?;

        Ok(PendingSubmission {
            _guard: guard,
            image,
            patient_id: form.patient_id.trim().to_string(),
            clinic_id: non_blank(form.clinic_id),
            symptoms: non_blank(form.symptoms),
            notes: non_blank(form.notes),
            timeout: self.timeout,
        })
    }

    /// Validates a confirmation for the displayed result and locks the
    /// confirm control.
    pub fn prepare_confirmation(
        &self,
        displayed: Option<ResultId>,
        confirmed: Option<ResultLabel>,
        notes: Option<String>,
    ) -> Result<PendingConfirmation, SubmissionError> {
        let label = validation::validate_confirmation(confirmed, displayed.is_some())?;
        let result_id =
            displayed.ok_or_else(|| ValidationError::new(IssueCode::NoResultToConfirm))?;

        let guard = self
            .confirm_lock
            .try_acquire()
            .ok_or_else(|| ValidationError::new(IssueCode::RequestInFlight))?;

        Ok(PendingConfirmation {
            _guard: guard,
            result_id,
            confirmation: Confirmation {
                confirmed_result: label,
                confirmation_notes: non_blank(notes),
            },
            timeout: self.timeout,
        })
    }
}

/// A validated analysis request holding the submit lock.
#[derive(Debug)]
pub struct PendingSubmission {
    _guard: LockGuard,
    image: CapturedArtifact,
    patient_id: String,
    clinic_id: Option<String>,
    symptoms: Option<String>,
    notes: Option<String>,
    timeout: Duration,
}

impl PendingSubmission {
    pub fn image(&self) -> &CapturedArtifact {
        &self.image
    }

    /// Sends the request. The lock is released when this future completes
    /// or is dropped.
    pub async fn send<B: Backend>(self, backend: &B) -> Result<AnalysisResult, SubmissionError> {
        let clinic_id = match self.clinic_id {
            Some(clinic_id) => clinic_id,
            None => {
                let profile = with_timeout(self.timeout, backend.current_user())
                    .await
                    .map_err(|source| SubmissionError::from_backend(source, ANALYZE))?;
                profile
                    .clinic_id
                    .filter(|id| !id.trim().is_empty())
                    .unwrap_or_else(|| UNASSIGNED_CLINIC.to_string())
            }
        };

        let request = AnalysisRequest {
            image: self.image,
            patient_id: self.patient_id,
            clinic_id,
            symptoms: self.symptoms,
            notes: self.notes,
        };

        let result = with_timeout(self.timeout, backend.analyze(request))
            .await
            .map_err(|source| SubmissionError::from_backend(source, ANALYZE))?;
        tracing::info!(
            result_id = %result.result_id,
            label = %result.label,
            detections = result.detections.len(),
            "analysis complete"
        );
        Ok(result)
    }
}

/// A validated confirmation holding the confirm lock.
#[derive(Debug)]
pub struct PendingConfirmation {
    _guard: LockGuard,
    result_id: ResultId,
    confirmation: Confirmation,
    timeout: Duration,
}

impl PendingConfirmation {
    pub async fn send<B: Backend>(
        self,
        backend: &B,
    ) -> Result<ConfirmationReceipt, SubmissionError> {
        with_timeout(
            self.timeout,
            backend.confirm(self.result_id, self.confirmation),
        )
        .await
        .map_err(|source| SubmissionError::from_backend(source, CONFIRM))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::Utc;

    fn submitter() -> AnalysisSubmitter {
        AnalysisSubmitter::new(Duration::from_secs(10), 20 * 1024 * 1024)
    }

    fn jpeg() -> CapturedArtifact {
        CapturedArtifact::new(
            Bytes::from_static(b"\xff\xd8\xff\xe0jpeg"),
            "image/jpeg",
            "slide.jpg",
            Utc::now(),
        )
    }

    fn form() -> SubmissionForm {
        SubmissionForm {
            patient_id: " p-17 ".into(),
            upload: Some(jpeg()),
            symptoms: Some("  ".into()),
            notes: Some("fever 3 days".into()),
            ..SubmissionForm::default()
        }
    }

    #[test]
    fn lock_is_exclusive_and_released_on_drop() {
        let lock = RequestLock::new();
        let guard = lock.try_acquire().unwrap();
        assert!(lock.is_locked());
        assert!(lock.try_acquire().is_none());
        drop(guard);
        assert!(!lock.is_locked());
        assert!(lock.try_acquire().is_some());
    }

    #[test]
    fn lock_is_released_when_a_holder_panics() {
        let lock = RequestLock::new();
        let inner = lock.clone();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = inner.try_acquire().unwrap();
            panic!("unexpected fault");
        }));
        assert!(outcome.is_err());
        assert!(!lock.is_locked());
    }

    #[test]
    fn prepare_normalises_the_form() {
        let submitter = submitter();
        let pending = submitter
            .prepare(AcquisitionMode::Upload, form(), None)
            .unwrap();
        assert_eq!(pending.patient_id, "p-17");
        assert_eq!(pending.symptoms, None);
        assert_eq!(pending.notes.as_deref(), Some("fever 3 days"));
        assert!(submitter.is_submitting());
        drop(pending);
        assert!(!submitter.is_submitting());
    }

    #[test]
    fn invalid_form_does_not_lock() {
        let submitter = submitter();
        let mut empty = form();
        empty.upload = Some(CapturedArtifact::new(
            Bytes::new(),
            "image/jpeg",
            "empty.jpg",
            Utc::now(),
        ));
        let err = submitter
            .prepare(AcquisitionMode::Upload, empty, None)
            .unwrap_err();
        assert_eq!(err.to_string(), "Please select an image");
        assert!(!submitter.is_submitting());
    }

    #[test]
    fn second_submission_is_refused_while_one_is_pending() {
        let submitter = submitter();
        let _pending = submitter
            .prepare(AcquisitionMode::Upload, form(), None)
            .unwrap();
        let err = submitter
            .prepare(AcquisitionMode::Upload, form(), None)
            .unwrap_err();
        assert!(matches!(
            err,
            SubmissionError::Invalid(ValidationError {
                code: IssueCode::RequestInFlight,
                ..
            })
        ));
    }

    #[test]
    fn camera_mode_sends_the_capture() {
        let submitter = submitter();
        let capture = CapturedArtifact::new(
            Bytes::from_static(b"captured"),
            "image/jpeg",
            "capture_1.jpg",
            Utc::now(),
        );
        let pending = submitter
            .prepare(
                AcquisitionMode::Camera,
                SubmissionForm {
                    patient_id: "p-1".into(),
                    ..SubmissionForm::default()
                },
                Some(&capture),
            )
            .unwrap();
        assert_eq!(pending.image().file_name(), "capture_1.jpg");
    }

    #[test]
    fn backend_errors_become_operator_messages() {
        let err = SubmissionError::from_backend(
            BackendError::Status {
                status: 400,
                detail: Some("Image too blurry".into()),
            },
            ANALYZE,
        );
        assert_eq!(err.to_string(), "Image too blurry");

        let err = SubmissionError::from_backend(
            BackendError::Status {
                status: 500,
                detail: None,
            },
            ANALYZE,
        );
        assert_eq!(err.to_string(), "Analysis failed");

        let err = SubmissionError::from_backend(BackendError::Unauthorized, CONFIRM);
        assert!(matches!(err, SubmissionError::SessionExpired));
    }

    #[test]
    fn unanswered_requests_use_their_own_fallback() {
        let err = SubmissionError::from_backend(
            BackendError::Transport("connection refused".into()),
            ANALYZE,
        );
        assert_eq!(err.to_string(), "Failed to analyze image");

        let err =
            SubmissionError::from_backend(BackendError::Timeout(Duration::from_secs(10)), ANALYZE);
        assert_eq!(err.to_string(), ANALYSIS_UNREACHABLE);

        let err = SubmissionError::from_backend(
            BackendError::Transport("connection reset".into()),
            CONFIRM,
        );
        assert_eq!(err.to_string(), "Failed to confirm result");
    }

    #[test]
    fn confirmation_requires_a_displayed_result() {
        let submitter = submitter();
        let err = submitter
            .prepare_confirmation(None, Some(ResultLabel::Positive), None)
            .unwrap_err();
        assert_eq!(err.to_string(), "No test result to confirm");
        assert!(!submitter.is_confirming());
    }
}
