//! Raster primitives. All coordinates are inclusive pixel positions and may
//! lie outside the image; anything outside is clipped.

use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{Rgb, RgbImage};

/// Side of one glyph cell at scale 1.
pub const GLYPH_SIZE: u32 = 8;

pub fn fill_rect(img: &mut RgbImage, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgb<u8>) {
    let (width, height) = (i64::from(img.width()), i64::from(img.height()));
    if width == 0 || height == 0 {
        return;
    }
    let min_x = x0.min(x1).max(0);
    let max_x = x0.max(x1).min(width - 1);
    let min_y = y0.min(y1).max(0);
    let max_y = y0.max(y1).min(height - 1);
    for y in min_y..=max_y {
        for x in min_x..=max_x {
            img.put_pixel(x as u32, y as u32, color);
        }
    }
}

/// Strokes the outline of `(x0, y0)..=(x1, y1)`, growing inwards by
/// `thickness` so the stroke never leaves the rectangle.
pub fn stroke_rect(
    img: &mut RgbImage,
    x0: i64,
    y0: i64,
    x1: i64,
    y1: i64,
    color: Rgb<u8>,
    thickness: u32,
) {
    for t in 0..i64::from(thickness.max(1)) {
        let (left, top, right, bottom) = (x0 + t, y0 + t, x1 - t, y1 - t);
        if left > right || top > bottom {
            break;
        }
        fill_rect(img, left, top, right, top, color);
        fill_rect(img, left, bottom, right, bottom, color);
        fill_rect(img, left, top, left, bottom, color);
        fill_rect(img, right, top, right, bottom, color);
    }
}

/// Pixel width and height of `text` at `scale`.
pub fn text_size(text: &str, scale: u32) -> (u32, u32) {
    let cell = GLYPH_SIZE * scale.max(1);
    (text.chars().count() as u32 * cell, cell)
}

/// Draws one line of 8x8 bitmap text with its top-left at `(x, y)`.
pub fn draw_text(img: &mut RgbImage, x: i64, y: i64, text: &str, color: Rgb<u8>, scale: u32) {
    let scale = i64::from(scale.max(1));
    let cell = i64::from(GLYPH_SIZE) * scale;
    let mut cursor_x = x;
    for ch in text.chars() {
        let Some(glyph) = BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?')) else {
            cursor_x += cell;
            continue;
        };
        for (row_idx, row) in glyph.iter().enumerate() {
            for col_idx in 0..8i64 {
                if (row >> col_idx) & 1 == 0 {
                    continue;
                }
                let px = cursor_x + col_idx * scale;
                let py = y + row_idx as i64 * scale;
                fill_rect(img, px, py, px + scale - 1, py + scale - 1, color);
            }
        }
        cursor_x += cell;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgb<u8> = Rgb([255, 0, 0]);
    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

    #[test]
    fn fill_is_clipped() {
        let mut img = RgbImage::new(4, 4);
        fill_rect(&mut img, -10, -10, 1, 1, RED);
        assert_eq!(*img.get_pixel(0, 0), RED);
        assert_eq!(*img.get_pixel(1, 1), RED);
        assert_eq!(*img.get_pixel(2, 2), BLACK);
    }

    #[test]
    fn stroke_leaves_interior_untouched() {
        let mut img = RgbImage::new(10, 10);
        stroke_rect(&mut img, 0, 0, 9, 9, RED, 2);
        assert_eq!(*img.get_pixel(0, 5), RED);
        assert_eq!(*img.get_pixel(1, 5), RED);
        assert_eq!(*img.get_pixel(2, 5), BLACK);
        assert_eq!(*img.get_pixel(9, 9), RED);
    }

    #[test]
    fn text_size_scales() {
        assert_eq!(text_size("abc", 1), (24, 8));
        assert_eq!(text_size("abc", 2), (48, 16));
    }

    #[test]
    fn text_marks_pixels() {
        let mut img = RgbImage::new(16, 8);
        draw_text(&mut img, 0, 0, "H", RED, 1);
        assert!(img.pixels().any(|p| *p == RED));
    }
}
