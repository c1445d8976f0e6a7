//! Upload/Camera acquisition mode.
//!
//! Transitions are explicit operator commands. The controller only decides
//! what a request implies; the workstation performs the side effects
//! (session check, starting or stopping the preview) and then commits.

use std::fmt;

/// Where the image for the next analysis comes from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AcquisitionMode {
    /// A file chosen by the operator.
    #[default]
    Upload,
    /// A frame captured from the live camera preview.
    Camera,
}

impl fmt::Display for AcquisitionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquisitionMode::Upload => f.write_str("upload"),
            AcquisitionMode::Camera => f.write_str("camera"),
        }
    }
}

/// Side effects implied by a mode request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Already in the requested mode; nothing to do.
    Unchanged,
    /// Upload -> Camera: verify the session, then start the preview.
    EnterCamera,
    /// Camera -> Upload: stop the preview and discard the capture.
    LeaveCamera,
}

#[derive(Debug, Default)]
pub struct ModeController {
    mode: AcquisitionMode,
}

impl ModeController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> AcquisitionMode {
        self.mode
    }

    pub fn is_camera(&self) -> bool {
        self.mode == AcquisitionMode::Camera
    }

    /// Works out what moving to `target` requires, without committing.
    pub fn plan(&self, target: AcquisitionMode) -> Transition {
        match (self.mode, target) {
            (AcquisitionMode::Upload, AcquisitionMode::Camera) => Transition::EnterCamera,
            (AcquisitionMode::Camera, AcquisitionMode::Upload) => Transition::LeaveCamera,
            _ => Transition::Unchanged,
        }
    }

    /// Records that the mode is now `target`.
    pub fn commit(&mut self, target: AcquisitionMode) {
        if self.mode != target {
            tracing::info!(from = %self.mode, to = %target, "acquisition mode changed");
        }
        self.mode = target;
    }
}
