//! Overlay rendering of detections onto the analysed image.
//!
//! [`annotate`] is a pure function of its inputs: the same image and
//! detections always produce the same raster and the same JPEG bytes.

mod draw;

pub use draw::{draw_text, fill_rect, stroke_rect, text_size};

use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use serde::Deserialize;

use crate::error::SmearscopeError;
use crate::model::{BBoxXYXY, Detection, Pixel};

/// Box colours, assigned by detection index modulo six.
pub const PALETTE: [Rgb<u8>; 6] = [
    Rgb([239, 68, 68]),
    Rgb([34, 197, 94]),
    Rgb([59, 130, 246]),
    Rgb([245, 158, 11]),
    Rgb([168, 85, 247]),
    Rgb([236, 72, 153]),
];
pub const LABEL_TEXT: Rgb<u8> = Rgb([255, 255, 255]);
pub const JPEG_QUALITY: u8 = 95;
pub const STROKE_WIDTH: u32 = 3;

/// Glyph scale for an image: one step per 400 px of the shorter side.
pub fn glyph_scale(width: u32, height: u32) -> u32 {
    (width.min(height) / 400).clamp(1, 4)
}

/// Where a label tag was drawn relative to its box.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagPlacement {
    Above,
    /// The box is too close to the top edge; the tag hangs inside it.
    Inside,
}

/// One detection as it was drawn.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedBox {
    pub index: usize,
    /// Clamped to the image.
    pub bbox: BBoxXYXY<Pixel>,
    pub color: Rgb<u8>,
    pub caption: String,
    pub tag: TagPlacement,
}

#[derive(Clone, Debug)]
pub struct AnnotatedImage {
    pub raster: RgbImage,
    pub jpeg: Vec<u8>,
    pub boxes: Vec<RenderedBox>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DetectionsFile {
    List(Vec<Detection>),
    Result { detections: Vec<Detection> },
}

/// Reads detections from either a bare JSON array or an analysis response
/// object carrying a `detections` field.
pub fn parse_detections(bytes: &[u8]) -> Result<Vec<Detection>, serde_json::Error> {
    match serde_json::from_slice(bytes)? {
        DetectionsFile::List(detections) | DetectionsFile::Result { detections } => Ok(detections),
    }
}

/// Decodes any supported image into an RGB raster.
pub fn decode(bytes: &[u8]) -> Result<RgbImage, image::ImageError> {
    Ok(image::load_from_memory(bytes)?.to_rgb8())
}

pub fn encode_jpeg(raster: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY).encode_image(raster)?;
    Ok(out)
}

/// Draws `detections` over a copy of `source`, in order, and encodes it.
pub fn annotate(
    source: &RgbImage,
    detections: &[Detection],
) -> Result<AnnotatedImage, SmearscopeError> {
    let (raster, boxes) = render(source, detections);
    let jpeg = encode_jpeg(&raster).map_err(SmearscopeError::ImageEncode)?;
    Ok(AnnotatedImage {
        raster,
        jpeg,
        boxes,
    })
}

/// The drawing half of [`annotate`], without encoding.
pub fn render(source: &RgbImage, detections: &[Detection]) -> (RgbImage, Vec<RenderedBox>) {
    let mut raster = source.clone();
    let (width, height) = raster.dimensions();
    let scale = glyph_scale(width, height);
    let padding = i64::from(2 * scale);
    let mut boxes = Vec::with_capacity(detections.len());

    for (index, detection) in detections.iter().enumerate() {
        let bbox = detection.bbox.clamped(width, height);
        if !bbox.has_area() {
            tracing::debug!(
                index,
                label = %detection.label,
                "detection outside the image, skipped"
            );
            continue;
        }
        let color = PALETTE[index % PALETTE.len()];

        let x0 = bbox.xmin().floor() as i64;
        let y0 = bbox.ymin().floor() as i64;
        let x1 = bbox.xmax().ceil() as i64 - 1;
        let y1 = bbox.ymax().ceil() as i64 - 1;
        stroke_rect(&mut raster, x0, y0, x1, y1, color, STROKE_WIDTH);

        let caption = detection.caption();
        let (text_w, text_h) = text_size(&caption, scale);
        let tag_w = i64::from(text_w) + 2 * padding;
        let tag_h = i64::from(text_h) + 2 * padding;
        let (tag_top, tag) = if y0 >= tag_h {
            (y0 - tag_h, TagPlacement::Above)
        } else {
            (y0, TagPlacement::Inside)
        };
        let (tag_right, tag_bottom) = (x0 + tag_w - 1, tag_top + tag_h - 1);
        fill_rect(&mut raster, x0, tag_top, tag_right, tag_bottom, color);
        let (text_x, text_y) = (x0 + padding, tag_top + padding);
        draw_text(&mut raster, text_x, text_y, &caption, LABEL_TEXT, scale);

        boxes.push(RenderedBox {
            index,
            bbox,
            color,
            caption,
            tag,
        });
    }

    (raster, boxes)
}
