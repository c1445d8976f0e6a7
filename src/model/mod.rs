//! Core data types shared by the capture, analysis and inspection stages.
//!
//! Geometry is tagged with its coordinate space: detection boxes live in
//! source-image [`Pixel`] space, pointer input arrives in [`Screen`] space,
//! and the viewport is the only place that converts between the two.
//!
//! # Example
//!
//! ```
//! use smearscope::model::{BBoxXYXY, Detection, Pixel};
//!
//! let det = Detection::new(
//!     BBoxXYXY::<Pixel>::from_xyxy(10.0, 10.0, 50.0, 50.0),
//!     "trophozoite",
//!     0.91,
//! );
//! assert_eq!(det.caption(), "trophozoite 91.0%");
//! ```

mod bbox;
mod coord;
mod ids;
mod result;
mod space;

pub use bbox::BBoxXYXY;
pub use coord::Coord;
pub use ids::ResultId;
pub use result::{
    format_percent, AnalysisResult, ConfidenceLevel, Confirmation, ConfirmationReceipt, Detection,
    ResultLabel, UserProfile,
};
pub use space::{Pixel, Screen};
