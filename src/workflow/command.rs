use crate::acquisition::AcquisitionMode;
use crate::annotate::AnnotatedImage;
use crate::capture::CapturedArtifact;
use crate::model::{AnalysisResult, ConfirmationReceipt, ResultLabel};
use crate::submit::SubmissionForm;
use crate::validation::ValidationError;
use crate::viewport::{PointerInput, ViewportState};

/// Where the operator is sent when the session is gone.
pub const SIGN_IN_PATH: &str = "/";

pub const SWITCHED_TO_UPLOAD: &str = "Switched to image upload mode";
pub const CAMERA_START_FAILED: &str = "Failed to start camera preview";
pub const ANALYSIS_COMPLETE: &str = "Analysis complete! Please confirm the result.";
pub const RESULT_CONFIRMED: &str = "Result confirmed successfully!";

/// Operator and page input delivered to a running workstation.
#[derive(Debug)]
pub enum Command {
    SelectMode(AcquisitionMode),
    /// Remediation after the preview tripped.
    SwitchToUpload,
    /// A file was chosen in the upload field.
    ChooseUpload(CapturedArtifact),
    Capture,
    /// `form.upload` falls back to the chosen file when empty.
    Submit(SubmissionForm),
    Confirm {
        result: Option<ResultLabel>,
        notes: Option<String>,
    },
    VisibilityChanged {
        hidden: bool,
    },
    Pointer(PointerInput),
    Reset,
    Unload,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// Everything the presentation layer needs to react to.
#[derive(Debug)]
pub enum Event {
    ModeChanged(AcquisitionMode),
    PreviewStarted,
    PreviewStopped,
    FrameDisplayed {
        byte_size: usize,
    },
    /// The preview gave up after repeated failures.
    PreviewTripped {
        message: &'static str,
    },
    SessionExpired {
        redirect: &'static str,
    },
    UploadAccepted {
        file_name: String,
    },
    Captured {
        file_name: String,
        byte_size: usize,
    },
    ValidationFailed(ValidationError),
    SubmissionStarted,
    ResultReady {
        result: Box<AnalysisResult>,
        /// Absent when the submitted image could not be decoded locally.
        annotated: Option<Box<AnnotatedImage>>,
    },
    AnalysisFailed {
        message: String,
    },
    Confirmed(ConfirmationReceipt),
    ConfirmationFailed {
        message: String,
    },
    ViewportChanged(ViewportState),
    Notice {
        level: NoticeLevel,
        message: String,
    },
    Reset,
}
