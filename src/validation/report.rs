//! Validation error types.
//!
//! Each failure carries a stable [`IssueCode`] for programmatic handling and
//! the operator-facing message for that code.

use std::fmt;

/// A client-side validation failure. No network call is made once one of
/// these is raised.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationError {
    /// A stable code for the failure type.
    pub code: IssueCode,

    /// The message shown to the operator.
    pub message: String,
}

impl ValidationError {
    /// Creates an error carrying the default message for `code`.
    pub fn new(code: IssueCode) -> Self {
        Self {
            code,
            message: code.message().to_string(),
        }
    }

    pub fn with_message(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}

/// A stable code identifying the type of validation failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IssueCode {
    // Submission form
    /// No patient was selected.
    MissingPatient,
    /// Upload mode without a chosen file.
    MissingImage,
    /// The chosen file is zero bytes long.
    EmptyImage,
    /// The chosen file exceeds the upload limit.
    ImageTooLarge,
    /// The chosen file is not an image.
    NotAnImage,
    /// Camera mode without a captured artifact.
    MissingCapture,

    // Capture
    /// Capture was requested before any preview frame arrived.
    NoPreviewFrame,

    // Confirmation
    /// No confirmed label was chosen.
    MissingConfirmedResult,
    /// There is no analysed result on display to confirm.
    NoResultToConfirm,

    // Concurrency
    /// The control is locked by an outstanding request.
    RequestInFlight,
}

impl IssueCode {
    pub fn message(&self) -> &'static str {
        match self {
            IssueCode::MissingPatient => "Please select a patient",
            IssueCode::MissingImage | IssueCode::EmptyImage => "Please select an image",
            IssueCode::ImageTooLarge => "File size must be less than 20MB",
            IssueCode::NotAnImage => "Please select an image file",
            IssueCode::MissingCapture => "Please capture an image first",
            IssueCode::NoPreviewFrame => "Camera preview is not ready yet",
            IssueCode::MissingConfirmedResult => "Please select a confirmed result",
            IssueCode::NoResultToConfirm => "No test result to confirm",
            IssueCode::RequestInFlight => "A request is already in progress",
        }
    }
}
