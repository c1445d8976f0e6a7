//! Coordinate space marker types.
//!
//! Zero-sized markers used as type parameters so that source-image pixels
//! and on-screen viewport pixels cannot be mixed up at compile time.

use std::fmt;

/// Marker for source-image pixel space.
///
/// (0, 0) is the top-left corner of the analysed image at native
/// resolution. Detection boxes returned by the backend live here.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pixel {}

/// Marker for viewport (screen) space.
///
/// Pointer, touch and wheel positions arrive in this space, before the
/// zoom/pan transform is undone.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Screen {}

impl fmt::Debug for Pixel {
    fn fmt(&self, _: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {}
    }
}

impl fmt::Debug for Screen {
    fn fmt(&self, _: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {}
    }
}
