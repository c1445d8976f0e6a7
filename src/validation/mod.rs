//! Client-side checks run before any request leaves the workstation.
//!
//! - Upload pre-check when a file is chosen (size, type)
//! - Submission form checks (patient, image presence per acquisition mode)
//! - Confirmation checks

mod report;

pub use report::{IssueCode, ValidationError};

use crate::acquisition::AcquisitionMode;
use crate::capture::CapturedArtifact;
use crate::model::ResultLabel;

/// Rejects files that could never be analysed: too large or not an image.
pub fn check_upload(upload: &CapturedArtifact, max_bytes: usize) -> Result<(), ValidationError> {
    if upload.byte_size() > max_bytes {
        let limit_mb = max_bytes / (1024 * 1024);
        return Err(ValidationError::with_message(
            IssueCode::ImageTooLarge,
            format!("File size must be less than {}MB", limit_mb),
        ));
    }

    if !upload.is_image() {
        return Err(ValidationError::new(IssueCode::NotAnImage));
    }

    Ok(())
}

/// Checks a submission and picks the image to send.
///
/// The patient is checked first. In upload mode the operator's file must be
/// present, non-empty and pass [`check_upload`]; in camera mode the live
/// capture must exist. Either way the returned artifact fills the `image`
/// field of the request.
pub fn validate_submission<'a>(
    mode: AcquisitionMode,
    patient_id: &str,
    upload: Option<&'a CapturedArtifact>,
    captured: Option<&'a CapturedArtifact>,
    max_bytes: usize,
) -> Result<&'a CapturedArtifact, ValidationError> {
    if patient_id.trim().is_empty() {
        return Err(ValidationError::new(IssueCode::MissingPatient));
    }

    match mode {
        AcquisitionMode::Upload => {
            let upload = upload.ok_or_else(|| ValidationError::new(IssueCode::MissingImage))?;
            if upload.byte_size() == 0 {
                return Err(ValidationError::new(IssueCode::EmptyImage));
            }
            check_upload(upload, max_bytes)?;
            Ok(upload)
        }
        AcquisitionMode::Camera => {
            captured.ok_or_else(|| ValidationError::new(IssueCode::MissingCapture))
        }
    }
}

/// Checks that a confirmation names a verdict and targets a displayed result.
pub fn validate_confirmation(
    confirmed: Option<ResultLabel>,
    has_result: bool,
) -> Result<ResultLabel, ValidationError> {
    let label = confirmed.ok_or_else(|| ValidationError::new(IssueCode::MissingConfirmedResult))?;
    if !has_result {
        return Err(ValidationError::new(IssueCode::NoResultToConfirm));
    }
    Ok(label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::Utc;

    const MAX: usize = 20 * 1024 * 1024;

    fn png(len: usize) -> CapturedArtifact {
        let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
        bytes.resize(len.max(8), 0);
        CapturedArtifact::new(Bytes::from(bytes), "image/png", "slide.png", Utc::now())
    }

    fn empty_upload() -> CapturedArtifact {
        CapturedArtifact::new(Bytes::new(), "image/jpeg", "empty.jpg", Utc::now())
    }

    #[test]
    fn missing_patient_is_reported_first() {
        let err = validate_submission(AcquisitionMode::Upload, "  ", None, None, MAX).unwrap_err();
        assert_eq!(err.code, IssueCode::MissingPatient);
        assert_eq!(err.message, "Please select a patient");
    }

    #[test]
    fn upload_mode_requires_a_non_empty_file() {
        let err = validate_submission(AcquisitionMode::Upload, "p-1", None, None, MAX).unwrap_err();
        assert_eq!(err.code, IssueCode::MissingImage);

        let empty = empty_upload();
        let err =
            validate_submission(AcquisitionMode::Upload, "p-1", Some(&empty), None, MAX).unwrap_err();
        assert_eq!(err.code, IssueCode::EmptyImage);
        assert_eq!(err.message, "Please select an image");
    }

    #[test]
    fn upload_mode_ignores_the_camera_capture() {
        let capture = png(64);
        let err = validate_submission(AcquisitionMode::Upload, "p-1", None, Some(&capture), MAX)
            .unwrap_err();
        assert_eq!(err.code, IssueCode::MissingImage);
    }

    #[test]
    fn camera_mode_requires_a_capture() {
        let upload = png(64);
        let err = validate_submission(AcquisitionMode::Camera, "p-1", Some(&upload), None, MAX)
            .unwrap_err();
        assert_eq!(err.code, IssueCode::MissingCapture);

        let capture = png(128);
        let chosen =
            validate_submission(AcquisitionMode::Camera, "p-1", None, Some(&capture), MAX).unwrap();
        assert_eq!(chosen.byte_size(), 128);
    }

    #[test]
    fn oversized_upload_is_rejected() {
        let big = png(2048);
        let err = check_upload(&big, 1024).unwrap_err();
        assert_eq!(err.code, IssueCode::ImageTooLarge);

        let ok = png(2048);
        assert!(check_upload(&ok, MAX).is_ok());
    }

    #[test]
    fn default_limit_message_matches_twenty_megabytes() {
        let mut bytes = b"\xff\xd8\xff".to_vec();
        bytes.resize(MAX + 1, 0);
        let big = CapturedArtifact::new(Bytes::from(bytes), "image/jpeg", "big.jpg", Utc::now());
        let err = check_upload(&big, MAX).unwrap_err();
        assert_eq!(err.message, "File size must be less than 20MB");
    }

    #[test]
    fn non_image_upload_is_rejected() {
        let text = CapturedArtifact::new(Bytes::from_static(b"hi"), "text/plain", "a.txt", Utc::now());
        let err = check_upload(&text, MAX).unwrap_err();
        assert_eq!(err.code, IssueCode::NotAnImage);
    }

    #[test]
    fn confirmation_requires_label_then_result() {
        let err = validate_confirmation(None, true).unwrap_err();
        assert_eq!(err.code, IssueCode::MissingConfirmedResult);

        let err = validate_confirmation(Some(ResultLabel::Positive), false).unwrap_err();
        assert_eq!(err.code, IssueCode::NoResultToConfirm);

        assert_eq!(
            validate_confirmation(Some(ResultLabel::Negative), true),
            Ok(ResultLabel::Negative)
        );
    }
}
