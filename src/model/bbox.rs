//! Bounding boxes in XYXY format.

use serde::{Deserialize, Serialize};

use super::coord::Coord;
use super::space::Pixel;

/// An axis-aligned box given by two corners (x1, y1) and (x2, y2).
///
/// The backend is not trusted to return ordered or in-bounds corners, so
/// construction is permissive; [`BBoxXYXY::clamped`] produces the drawable
/// form.
#[derive(Clone, Copy, PartialEq)]
pub struct BBoxXYXY<TSpace> {
    pub min: Coord<TSpace>,
    pub max: Coord<TSpace>,
}

impl<TSpace> BBoxXYXY<TSpace> {
    #[inline]
    pub fn new(min: Coord<TSpace>, max: Coord<TSpace>) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn from_xyxy(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            min: Coord::new(x1, y1),
            max: Coord::new(x2, y2),
        }
    }

    #[inline]
    pub fn xmin(&self) -> f64 {
        self.min.x
    }

    #[inline]
    pub fn ymin(&self) -> f64 {
        self.min.y
    }

    #[inline]
    pub fn xmax(&self) -> f64 {
        self.max.x
    }

    #[inline]
    pub fn ymax(&self) -> f64 {
        self.max.y
    }

    /// May be negative if the box is malformed (x2 < x1).
    #[inline]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    /// May be negative if the box is malformed (y2 < y1).
    #[inline]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }

    /// Returns true if the box has positive width and height.
    #[inline]
    pub fn has_area(&self) -> bool {
        self.width() > 0.0 && self.height() > 0.0
    }

    /// Swaps corners as needed so that min <= max on both axes.
    pub fn ordered(&self) -> Self {
        Self::from_xyxy(
            self.min.x.min(self.max.x),
            self.min.y.min(self.max.y),
            self.min.x.max(self.max.x),
            self.min.y.max(self.max.y),
        )
    }
}

impl BBoxXYXY<Pixel> {
    /// Orders the corners and clamps them to `[0, 0, width, height]`.
    ///
    /// Non-finite coordinates collapse to the nearest bound (NaN to 0), so the
    /// result always lies inside the image, possibly with zero area.
    pub fn clamped(&self, width: u32, height: u32) -> Self {
        let w = f64::from(width);
        let h = f64::from(height);
        let clamp = |v: f64, hi: f64| if v.is_nan() { 0.0 } else { v.clamp(0.0, hi) };
        let ordered = self.ordered();
        Self::from_xyxy(
            clamp(ordered.min.x, w),
            clamp(ordered.min.y, h),
            clamp(ordered.max.x, w),
            clamp(ordered.max.y, h),
        )
    }
}

impl<TSpace> std::fmt::Debug for BBoxXYXY<TSpace> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BBoxXYXY")
            .field("x1", &self.min.x)
            .field("y1", &self.min.y)
            .field("x2", &self.max.x)
            .field("y2", &self.max.y)
            .finish()
    }
}

impl<TSpace> Default for BBoxXYXY<TSpace> {
    fn default() -> Self {
        Self::from_xyxy(0.0, 0.0, 0.0, 0.0)
    }
}

// Custom serde implementation to avoid TSpace: Serialize/Deserialize bounds
impl<TSpace> Serialize for BBoxXYXY<TSpace> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("BBoxXYXY", 4)?;
        state.serialize_field("x1", &self.min.x)?;
        state.serialize_field("y1", &self.min.y)?;
        state.serialize_field("x2", &self.max.x)?;
        state.serialize_field("y2", &self.max.y)?;
        state.end()
    }
}

impl<'de, TSpace> Deserialize<'de> for BBoxXYXY<TSpace> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct BBoxData {
            x1: f64,
            y1: f64,
            x2: f64,
            y2: f64,
        }
        let data = BBoxData::deserialize(deserializer)?;
        Ok(BBoxXYXY::from_xyxy(data.x1, data.y1, data.x2, data.y2))
    }
}
