use image::{Rgb, RgbImage};

use super::input::{MouseAdapter, PointerInput, TouchAdapter, WheelAdapter};
use super::{ViewportController, ViewportState, ZoomLimits};
use crate::model::{Coord, ResultId, Screen};

/// Fill for view pixels that fall outside the image.
pub const BACKGROUND: Rgb<u8> = Rgb([17, 17, 17]);

/// Renders what a `raster.width()` x `raster.height()` view shows under
/// `state`, sampling the nearest source pixel.
pub fn render_view(raster: &RgbImage, state: &ViewportState) -> RgbImage {
    let (width, height) = raster.dimensions();
    RgbImage::from_fn(width, height, |x, y| {
        let screen = Coord::<Screen>::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
        let source = state.screen_to_image(screen, width, height);
        let (sx, sy) = (source.x.floor(), source.y.floor());
        if sx < 0.0 || sy < 0.0 || sx >= f64::from(width) || sy >= f64::from(height) {
            BACKGROUND
        } else {
            *raster.get_pixel(sx as u32, sy as u32)
        }
    })
}

/// The area where an annotated result is inspected.
///
/// Input is only handled once [`initialize`](Self::initialize) has attached
/// the surface; attaching twice is a no-op.
#[derive(Debug, Default)]
pub struct ResultSurface {
    raster: Option<RgbImage>,
    result_id: Option<ResultId>,
    viewport: ViewportController,
    initialized: bool,
    mouse: MouseAdapter,
    touch: TouchAdapter,
    wheel: WheelAdapter,
}

impl ResultSurface {
    pub fn new(limits: ZoomLimits) -> Self {
        Self {
            viewport: ViewportController::new(limits),
            ..Self::default()
        }
    }

    /// Attaches input handling. Returns false if already attached.
    pub fn initialize(&mut self) -> bool {
        if self.initialized {
            return false;
        }
        self.initialized = true;
        true
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Displays a new annotated result with a fresh viewport.
    pub fn show(&mut self, result_id: ResultId, raster: RgbImage) {
        self.reset_input();
        self.raster = Some(raster);
        self.result_id = Some(result_id);
        self.initialize();
    }

    /// Displays a result whose image could not be drawn. It can still be
    /// confirmed; there is just nothing to inspect.
    pub fn show_unrendered(&mut self, result_id: ResultId) {
        self.reset_input();
        self.raster = None;
        self.result_id = Some(result_id);
    }

    /// Drops the displayed result and its viewport.
    pub fn clear(&mut self) {
        self.reset_input();
        self.raster = None;
        self.result_id = None;
    }

    fn reset_input(&mut self) {
        self.viewport.reset_zoom();
        self.mouse = MouseAdapter::default();
        self.touch = TouchAdapter::default();
    }

    pub fn raster(&self) -> Option<&RgbImage> {
        self.raster.as_ref()
    }

    pub fn result_id(&self) -> Option<ResultId> {
        self.result_id
    }

    pub fn viewport(&self) -> &ViewportController {
        &self.viewport
    }

    /// Feeds one raw event through its adapter. Returns true if the view
    /// transform changed.
    pub fn handle(&mut self, input: PointerInput) -> bool {
        if !self.initialized || self.raster.is_none() {
            return false;
        }
        let can_pan = self.viewport.can_pan();
        let delta = match input {
            PointerInput::MouseDown(position) => {
                self.mouse.press(position, can_pan);
                None
            }
            PointerInput::MouseMove(position) => self.mouse.move_to(position),
            PointerInput::MouseUp => {
                self.mouse.release();
                None
            }
            PointerInput::TouchStart(touches) => {
                self.touch.start(&touches, can_pan);
                None
            }
            PointerInput::TouchMove(touches) => self.touch.move_to(&touches),
            PointerInput::TouchEnd(remaining) => {
                self.touch.end(&remaining);
                None
            }
            PointerInput::Wheel(delta_y) => self.wheel.scroll(delta_y),
            PointerInput::ZoomIn => return self.viewport.zoom_in(),
            PointerInput::ZoomOut => return self.viewport.zoom_out(),
            PointerInput::ResetZoom => {
                let before = self.viewport.state();
                self.viewport.reset_zoom();
                return before != self.viewport.state();
            }
        };
        delta.is_some_and(|delta| self.viewport.apply(delta))
    }

    /// The current view of the displayed result.
    pub fn render(&self) -> Option<RgbImage> {
        self.raster
            .as_ref()
            .map(|raster| render_view(raster, &self.viewport.state()))
    }
}
