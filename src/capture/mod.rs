//! Frozen image payloads and the manager that owns the live one.
//!
//! The preview surface always shows the most recently resolved frame.
//! [`CaptureManager::capture`] copies that frame into an immutable
//! [`CapturedArtifact`]; at most one artifact is alive at a time and a new
//! capture drops the previous one wholesale.

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::validation::{IssueCode, ValidationError};

const FALLBACK_MIME: &str = "application/octet-stream";

/// Best-effort MIME type for raw image bytes, from their magic number.
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or(FALLBACK_MIME)
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => "png",
        "image/bmp" => "bmp",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/tiff" => "tiff",
        _ => "jpg",
    }
}

/// An immutable in-memory image ready for submission.
///
/// Cloning is cheap (the payload is reference counted) but there is no way
/// to mutate one after construction.
#[derive(Clone, Debug, PartialEq)]
pub struct CapturedArtifact {
    bytes: Bytes,
    mime_type: String,
    file_name: String,
    created_at: DateTime<Utc>,
}

impl CapturedArtifact {
    pub fn new(
        bytes: impl Into<Bytes>,
        mime_type: impl Into<String>,
        file_name: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
            file_name: file_name.into(),
            created_at,
        }
    }

    /// Wraps a file chosen by the operator, sniffing the MIME type.
    pub fn from_upload(bytes: impl Into<Bytes>, file_name: impl Into<String>) -> Self {
        let bytes = bytes.into();
        let mime_type = sniff_mime(&bytes);
        Self::new(bytes, mime_type, file_name, Utc::now())
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn byte_size(&self) -> usize {
        self.bytes.len()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// A frame received from the preview endpoint.
#[derive(Clone, Debug, PartialEq)]
pub struct PreviewFrame {
    pub bytes: Bytes,
    pub received_at: DateTime<Utc>,
}

/// What the operator currently sees in the camera preview.
///
/// Every successful fetch overwrites the frame, in resolution order.
#[derive(Debug, Default)]
pub struct PreviewSurface {
    frame: Option<PreviewFrame>,
    frames_shown: u64,
}

impl PreviewSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&mut self, bytes: Bytes) {
        self.frame = Some(PreviewFrame {
            bytes,
            received_at: Utc::now(),
        });
        self.frames_shown += 1;
    }

    pub fn frame(&self) -> Option<&PreviewFrame> {
        self.frame.as_ref()
    }

    pub fn frames_shown(&self) -> u64 {
        self.frames_shown
    }

    /// Forgets the displayed frame, e.g. when leaving camera mode.
    pub fn blank(&mut self) {
        self.frame = None;
    }
}

/// Owner of the single live [`CapturedArtifact`].
#[derive(Debug, Default)]
pub struct CaptureManager {
    artifact: Option<CapturedArtifact>,
}

impl CaptureManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Freezes the frame currently on `surface` into a new artifact.
    ///
    /// Fails with [`IssueCode::NoPreviewFrame`] and leaves any existing
    /// artifact untouched when nothing has been previewed yet.
    pub fn capture(&mut self, surface: &PreviewSurface) -> Result<&CapturedArtifact, ValidationError> {
        self.capture_at(surface, Utc::now())
    }

    pub fn capture_at(
        &mut self,
        surface: &PreviewSurface,
        now: DateTime<Utc>,
    ) -> Result<&CapturedArtifact, ValidationError> {
        let frame = surface
            .frame()
            .ok_or_else(|| ValidationError::new(IssueCode::NoPreviewFrame))?;

        let mime_type = match sniff_mime(&frame.bytes) {
            FALLBACK_MIME => "image/jpeg",
            sniffed => sniffed,
        };
        let file_name = format!(
            "capture_{}.{}",
            now.format("%Y%m%d_%H%M%S_%3f"),
            extension_for(mime_type)
        );

        let artifact = CapturedArtifact::new(frame.bytes.clone(), mime_type, file_name, now);
        tracing::debug!(
            file_name = artifact.file_name(),
            bytes = artifact.byte_size(),
            "captured preview frame"
        );
        Ok(&*self.artifact.insert(artifact))
    }

    pub fn artifact(&self) -> Option<&CapturedArtifact> {
        self.artifact.as_ref()
    }

    /// Drops the live artifact, if any. Calling it twice is harmless.
    pub fn clear(&mut self) {
        if self.artifact.take().is_some() {
            tracing::debug!("discarded captured artifact");
        }
    }
}
