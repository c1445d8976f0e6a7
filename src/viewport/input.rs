//! Device adapters that turn raw mouse, touch and wheel events into
//! [`PointerDelta`] steps.

use crate::model::{Coord, Screen};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZoomDirection {
    In,
    Out,
}

/// One unit of viewport input, independent of the device that produced it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerDelta {
    /// Screen-space movement since the previous sample.
    Pan(Coord<Screen>),
    /// One discrete zoom step.
    Zoom(ZoomDirection),
}

/// Raw input delivered to a result surface.
#[derive(Clone, Debug, PartialEq)]
pub enum PointerInput {
    MouseDown(Coord<Screen>),
    MouseMove(Coord<Screen>),
    MouseUp,
    TouchStart(Vec<Coord<Screen>>),
    TouchMove(Vec<Coord<Screen>>),
    TouchEnd(Vec<Coord<Screen>>),
    /// Vertical wheel delta; negative scrolls up.
    Wheel(f64),
    ZoomIn,
    ZoomOut,
    ResetZoom,
}

/// Single-button drag.
#[derive(Clone, Debug, Default)]
pub struct MouseAdapter {
    last: Option<Coord<Screen>>,
}

impl MouseAdapter {
    /// Starts a drag session; only when panning is currently allowed.
    pub fn press(&mut self, position: Coord<Screen>, can_pan: bool) {
        self.last = can_pan.then_some(position);
    }

    /// Movement is measured against the previous sample, not the press.
    pub fn move_to(&mut self, position: Coord<Screen>) -> Option<PointerDelta> {
        let last = self.last.replace(position)?;
        Some(PointerDelta::Pan(position - last))
    }

    pub fn release(&mut self) {
        self.last = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.last.is_some()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
enum Gesture {
    #[default]
    None,
    Drag {
        last: Coord<Screen>,
    },
    Pinch {
        last_distance: f64,
    },
}

/// One-finger drag and quantized two-finger pinch.
///
/// A pinch emits one zoom step per move sample whose finger distance grew
/// or shrank against the previous sample.
#[derive(Clone, Debug, Default)]
pub struct TouchAdapter {
    gesture: Gesture,
}

impl TouchAdapter {
    pub fn start(&mut self, touches: &[Coord<Screen>], can_pan: bool) {
        self.gesture = match touches {
            [first, second] => Gesture::Pinch {
                last_distance: first.distance(second),
            },
            [only] if can_pan => Gesture::Drag { last: *only },
            _ => Gesture::None,
        };
    }

    pub fn move_to(&mut self, touches: &[Coord<Screen>]) -> Option<PointerDelta> {
        match (self.gesture, touches) {
            (Gesture::Drag { last }, [only]) => {
                self.gesture = Gesture::Drag { last: *only };
                Some(PointerDelta::Pan(*only - last))
            }
            (Gesture::Pinch { last_distance }, [first, second]) => {
                let distance = first.distance(second);
                self.gesture = Gesture::Pinch {
                    last_distance: distance,
                };
                if distance > last_distance {
                    Some(PointerDelta::Zoom(ZoomDirection::In))
                } else if distance < last_distance {
                    Some(PointerDelta::Zoom(ZoomDirection::Out))
                } else {
                    None
                }
            }
            // A second finger landed mid-drag.
            (_, [first, second]) => {
                self.gesture = Gesture::Pinch {
                    last_distance: first.distance(second),
                };
                None
            }
            _ => None,
        }
    }

    /// `remaining` are the touches still on the surface.
    pub fn end(&mut self, remaining: &[Coord<Screen>]) {
        if remaining.len() < 2 {
            self.gesture = Gesture::None;
        }
    }
}

/// Exactly one zoom step per wheel event.
#[derive(Clone, Copy, Debug, Default)]
pub struct WheelAdapter;

impl WheelAdapter {
    pub fn scroll(&self, delta_y: f64) -> Option<PointerDelta> {
        if delta_y < 0.0 {
            Some(PointerDelta::Zoom(ZoomDirection::In))
        } else if delta_y > 0.0 {
            Some(PointerDelta::Zoom(ZoomDirection::Out))
        } else {
            None
        }
    }
}
