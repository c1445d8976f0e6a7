//! Zoom and pan inspection of an annotated result.
//!
//! All input devices are reduced to a [`PointerDelta`] by the adapters in
//! [`input`] and applied through [`ViewportController::apply`], the single
//! place where the transform changes.
//!
//! The transform follows the usual `scale(s) translate(t)` convention with
//! the origin at the centre of the view: translate is kept in image pixels,
//! so a screen-space drag is divided by the current scale before it is
//! accumulated.

pub mod input;
mod surface;

pub use input::{
    MouseAdapter, PointerDelta, PointerInput, TouchAdapter, WheelAdapter, ZoomDirection,
};
pub use surface::{render_view, ResultSurface, BACKGROUND};

use crate::model::{Coord, Pixel, Screen};

/// Bounds and step of the zoom scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ZoomLimits {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl Default for ZoomLimits {
    fn default() -> Self {
        Self {
            min: 0.5,
            max: 4.0,
            step: 0.25,
        }
    }
}

impl ZoomLimits {
    fn clamp(&self, scale: f64) -> f64 {
        scale.clamp(self.min, self.max)
    }
}

/// Scale plus scale-compensated translation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportState {
    pub scale: f64,
    pub translate: Coord<Pixel>,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            scale: 1.0,
            translate: Coord::zero(),
        }
    }
}

impl ViewportState {
    /// Maps a point of a `width` x `height` view to source-image pixels.
    pub fn screen_to_image(&self, point: Coord<Screen>, width: u32, height: u32) -> Coord<Pixel> {
        let centre = Coord::<Screen>::new(f64::from(width) / 2.0, f64::from(height) / 2.0);
        let unscaled = (point - centre).scaled_down(self.scale) + centre;
        unscaled.cast::<Pixel>() - self.translate
    }

    /// Inverse of [`screen_to_image`](Self::screen_to_image).
    pub fn image_to_screen(&self, point: Coord<Pixel>, width: u32, height: u32) -> Coord<Screen> {
        let centre = Coord::<Pixel>::new(f64::from(width) / 2.0, f64::from(height) / 2.0);
        let shifted = point + self.translate - centre;
        Coord::new(
            shifted.x * self.scale + centre.x,
            shifted.y * self.scale + centre.y,
        )
    }
}

/// Owns the [`ViewportState`] of the displayed result.
#[derive(Clone, Debug, Default)]
pub struct ViewportController {
    limits: ZoomLimits,
    state: ViewportState,
}

impl ViewportController {
    pub fn new(limits: ZoomLimits) -> Self {
        Self {
            limits,
            state: ViewportState::default(),
        }
    }

    pub fn state(&self) -> ViewportState {
        self.state
    }

    pub fn scale(&self) -> f64 {
        self.state.scale
    }

    pub fn limits(&self) -> ZoomLimits {
        self.limits
    }

    /// Panning is only meaningful once the image is enlarged.
    pub fn can_pan(&self) -> bool {
        self.state.scale > 1.0
    }

    pub fn zoom_in(&mut self) -> bool {
        self.apply(PointerDelta::Zoom(ZoomDirection::In))
    }

    pub fn zoom_out(&mut self) -> bool {
        self.apply(PointerDelta::Zoom(ZoomDirection::Out))
    }

    /// Back to scale 1 with no translation.
    pub fn reset_zoom(&mut self) {
        self.state = ViewportState::default();
    }

    /// Applies one input step. Returns true if the transform changed.
    pub fn apply(&mut self, delta: PointerDelta) -> bool {
        let before = self.state;
        match delta {
            PointerDelta::Zoom(direction) => {
                let step = match direction {
                    ZoomDirection::In => self.limits.step,
                    ZoomDirection::Out => -self.limits.step,
                };
                self.state.scale = self.limits.clamp(self.state.scale + step);
            }
            PointerDelta::Pan(movement) => {
                if !self.can_pan() || !movement.is_finite() {
                    return false;
                }
                self.state.translate += movement.scaled_down(self.state.scale).cast::<Pixel>();
            }
        }
        if self.state != before {
            tracing::trace!(
                scale = self.state.scale,
                x = self.state.translate.x,
                y = self.state.translate.y,
                "viewport updated"
            );
        }
        self.state != before
    }
}
