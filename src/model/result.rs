//! Analysis results as returned by the backend.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::bbox::BBoxXYXY;
use super::ids::ResultId;
use super::space::Pixel;

/// Diagnostic outcome assigned by the vision model (or a technician).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultLabel {
    Positive,
    Negative,
    Inconclusive,
}

impl ResultLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultLabel::Positive => "positive",
            ResultLabel::Negative => "negative",
            ResultLabel::Inconclusive => "inconclusive",
        }
    }
}

impl fmt::Display for ResultLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResultLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(ResultLabel::Positive),
            "negative" => Ok(ResultLabel::Negative),
            "inconclusive" => Ok(ResultLabel::Inconclusive),
            other => Err(format!(
                "'{}' (expected positive, negative or inconclusive)",
                other
            )),
        }
    }
}

/// How much weight an operator should give the model's confidence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfidenceLevel {
    High,
    Moderate,
    Low,
}

impl ConfidenceLevel {
    /// Buckets a score in [0, 1]: >= 0.85 is high, >= 0.65 moderate.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.85 {
            ConfidenceLevel::High
        } else if score >= 0.65 {
            ConfidenceLevel::Moderate
        } else {
            ConfidenceLevel::Low
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConfidenceLevel::High => "High Confidence",
            ConfidenceLevel::Moderate => "Moderate Confidence",
            ConfidenceLevel::Low => "Low Confidence",
        };
        f.write_str(text)
    }
}

/// Formats a [0, 1] score as a percentage with one decimal place.
pub fn format_percent(score: f64) -> String {
    format!("{:.1}%", score * 100.0)
}

/// One object found by the vision model.
///
/// The box is in source-image pixel space and is not guaranteed to be
/// ordered or inside the image.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BBoxXYXY<Pixel>,
    pub label: String,
    pub confidence: f64,
}

impl Detection {
    pub fn new(bbox: BBoxXYXY<Pixel>, label: impl Into<String>, confidence: f64) -> Self {
        Self {
            bbox,
            label: label.into(),
            confidence,
        }
    }

    /// Text drawn in the label tag, e.g. `trophozoite 91.0%`.
    pub fn caption(&self) -> String {
        format!("{} {}", self.label, format_percent(self.confidence))
    }
}

impl Serialize for Detection {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("Detection", 6)?;
        state.serialize_field("label", &self.label)?;
        state.serialize_field("confidence", &self.confidence)?;
        state.serialize_field("x1", &self.bbox.xmin())?;
        state.serialize_field("y1", &self.bbox.ymin())?;
        state.serialize_field("x2", &self.bbox.xmax())?;
        state.serialize_field("y2", &self.bbox.ymax())?;
        state.end()
    }
}

// The inference service emits both `class`/`confidence` and flat corner
// fields alongside a `bbox` array; accept either spelling.
impl<'de> Deserialize<'de> for Detection {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct DetectionData {
            #[serde(alias = "class")]
            label: String,
            #[serde(alias = "confidence_score")]
            confidence: f64,
            x1: Option<f64>,
            y1: Option<f64>,
            x2: Option<f64>,
            y2: Option<f64>,
            bbox: Option<[f64; 4]>,
        }

        let data = DetectionData::deserialize(deserializer)?;
        let bbox = match (data.x1, data.y1, data.x2, data.y2, data.bbox) {
            (Some(x1), Some(y1), Some(x2), Some(y2), _) => BBoxXYXY::from_xyxy(x1, y1, x2, y2),
            (_, _, _, _, Some([x1, y1, x2, y2])) => BBoxXYXY::from_xyxy(x1, y1, x2, y2),
            _ => {
                return Err(serde::de::Error::custom(
                    "detection needs x1/y1/x2/y2 or a bbox array",
                ))
            }
        };

        Ok(Detection {
            bbox,
            label: data.label,
            confidence: data.confidence,
        })
    }
}

/// The structured outcome of one analysis request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(rename = "test_result_id")]
    pub result_id: ResultId,

    #[serde(rename = "result")]
    pub label: ResultLabel,

    #[serde(rename = "confidence_score")]
    pub confidence: f64,

    pub processing_time_ms: f64,

    /// Ordered as emitted by the model; drawing order follows it.
    #[serde(default)]
    pub detections: Vec<Detection>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AnalysisResult {
    /// Parses a result from an analyze response body.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn confidence_level(&self) -> ConfidenceLevel {
        ConfidenceLevel::from_score(self.confidence)
    }

    /// One-line summary, e.g. `positive (AI confidence 91.0% - High Confidence)`.
    pub fn summary(&self) -> String {
        format!(
            "{} (AI confidence {} - {})",
            self.label,
            format_percent(self.confidence),
            self.confidence_level()
        )
    }
}

/// A technician's verdict on a stored result.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Confirmation {
    pub confirmed_result: ResultLabel,
    pub confirmation_notes: Option<String>,
}

/// Receipt returned once a confirmation is stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationReceipt {
    pub test_result_id: ResultId,
    pub is_confirmed: bool,
    #[serde(default)]
    pub confirmed_by: Option<String>,
    #[serde(default)]
    pub confirmed_at: Option<String>,
    #[serde(default)]
    pub message: String,
}

/// The signed-in operator, as reported by the session authority.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub clinic_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = r#"{
        "test_result_id": "7f3c2a10-95b1-4e57-a2d4-0c9e8b6f1a23",
        "result": "positive",
        "confidence_score": 0.91,
        "processing_time_ms": 412.5,
        "message": "Analysis complete: positive",
        "image_path": "uploads/abc.jpg",
        "detections": [
            {"class": "trophozoite", "confidence": 0.91, "bbox": [10, 10, 50, 50],
             "x1": 10, "y1": 10, "x2": 50, "y2": 50},
            {"label": "gametocyte", "confidence": 0.42, "bbox": [60, 5, 90, 30]}
        ]
    }"#;

    #[test]
    fn test_parse_analysis_response() {
        let result = AnalysisResult::from_slice(RESPONSE.as_bytes()).unwrap();
        assert_eq!(result.label, ResultLabel::Positive);
        assert_eq!(result.result_id.short(), "7f3c2a10");
        assert_eq!(result.detections.len(), 2);
        assert_eq!(result.detections[0].label, "trophozoite");
        assert_eq!(
            result.detections[1].bbox,
            BBoxXYXY::from_xyxy(60.0, 5.0, 90.0, 30.0)
        );
    }

    #[test]
    fn test_detections_default_to_empty() {
        let json = r#"{"test_result_id":"7f3c2a10-95b1-4e57-a2d4-0c9e8b6f1a23",
            "result":"negative","confidence_score":0.95,"processing_time_ms":12.0}"#;
        let result = AnalysisResult::from_slice(json.as_bytes()).unwrap();
        assert!(result.detections.is_empty());
    }

    #[test]
    fn test_detection_without_geometry_is_rejected() {
        let json = r#"{"label": "ring", "confidence": 0.5}"#;
        assert!(serde_json::from_str::<Detection>(json).is_err());
    }

    #[test]
    fn test_caption_format() {
        let det = Detection::new(BBoxXYXY::from_xyxy(10.0, 10.0, 50.0, 50.0), "trophozoite", 0.91);
        assert_eq!(det.caption(), "trophozoite 91.0%");
    }

    #[test]
    fn test_confidence_levels() {
        assert_eq!(ConfidenceLevel::from_score(0.85), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_score(0.7), ConfidenceLevel::Moderate);
        assert_eq!(ConfidenceLevel::from_score(0.2), ConfidenceLevel::Low);
    }

    #[test]
    fn test_result_label_from_str() {
        assert_eq!("Negative".parse::<ResultLabel>(), Ok(ResultLabel::Negative));
        assert!("maybe".parse::<ResultLabel>().is_err());
    }
}
