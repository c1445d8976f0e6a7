//! Fuzz target for overlay drawing.
//!
//! Parsed detections are drawn onto a small fixed raster; any box, however
//! malformed, must be clamped or skipped without panicking.

#![no_main]

use image::{Rgb, RgbImage};
use libfuzzer_sys::fuzz_target;
use smearscope::annotate::{parse_detections, render};

fuzz_target!(|data: &[u8]| {
    if data.len() > 64 * 1024 {
        return;
    }

    let Ok(detections) = parse_detections(data) else {
        return;
    };
    let source = RgbImage::from_pixel(48, 32, Rgb([0, 0, 0]));
    let _ = render(&source, &detections);
});
