// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core types for room analysis and blueprint generation

use crate::error::PipelineError;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// A 2D point in pixel space (simplified for serialization)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn to_nalgebra(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }

    pub fn from_nalgebra(p: &Point2<f64>) -> Self {
        Self { x: p.x, y: p.y }
    }

    pub fn distance_to(&self, other: &Point2D) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Detected straight line segment in pixel space
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSegment {
    pub start: Point2D,
    pub end: Point2D,
}

impl LineSegment {
    pub fn new(start: Point2D, end: Point2D) -> Self {
        Self { start, end }
    }

    /// Pixel length of the segment
    pub fn length(&self) -> f64 {
        self.start.distance_to(&self.end)
    }

    /// Direction angle in radians, in (-pi, pi]
    pub fn angle(&self) -> f64 {
        (self.end.y - self.start.y).atan2(self.end.x - self.start.x)
    }

    pub fn midpoint(&self) -> Point2D {
        Point2D::new(
            (self.start.x + self.end.x) / 2.0,
            (self.start.y + self.end.y) / 2.0,
        )
    }
}

/// Corner candidate with its cornerness response
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CornerPoint {
    pub x: f64,
    pub y: f64,
    /// Harris response at the corner, normalized to the image maximum
    pub strength: f32,
}

impl CornerPoint {
    pub fn position(&self) -> Point2D {
        Point2D::new(self.x, self.y)
    }
}

/// Feature classification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    Wall,
    Door,
    Window,
    Corner,
}

/// Geometry carried by a classified feature
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureGeometry {
    Line(LineSegment),
    Point(Point2D),
}

impl FeatureGeometry {
    /// Representative position, used for dedup and rendering anchors
    pub fn anchor(&self) -> Point2D {
        match self {
            FeatureGeometry::Line(line) => line.midpoint(),
            FeatureGeometry::Point(p) => *p,
        }
    }
}

/// A detected room feature with classification confidence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedFeature {
    pub kind: FeatureKind,
    pub geometry: FeatureGeometry,
    /// Classification confidence (0.0 - 1.0)
    pub confidence: f32,
}

impl ClassifiedFeature {
    pub fn wall(line: LineSegment, confidence: f32) -> Self {
        Self {
            kind: FeatureKind::Wall,
            geometry: FeatureGeometry::Line(line),
            confidence,
        }
    }

    /// The wall line, if this feature carries line geometry
    pub fn as_line(&self) -> Option<&LineSegment> {
        match &self.geometry {
            FeatureGeometry::Line(line) => Some(line),
            FeatureGeometry::Point(_) => None,
        }
    }
}

/// Per-kind feature tally returned to the caller
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeatureCounts {
    pub walls: usize,
    pub corners: usize,
    pub windows: usize,
    pub doors: usize,
}

/// Consolidated room feature set, merged across all input images
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoomFeatureSet {
    pub features: Vec<ClassifiedFeature>,
}

impl RoomFeatureSet {
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Iterate features of one kind
    pub fn of_kind(&self, kind: FeatureKind) -> impl Iterator<Item = &ClassifiedFeature> {
        self.features.iter().filter(move |f| f.kind == kind)
    }

    /// Per-kind counts. Derived from the feature list, so the tally always
    /// matches the list contents.
    pub fn counts(&self) -> FeatureCounts {
        FeatureCounts {
            walls: self.of_kind(FeatureKind::Wall).count(),
            corners: self.of_kind(FeatureKind::Corner).count(),
            windows: self.of_kind(FeatureKind::Window).count(),
            doors: self.of_kind(FeatureKind::Door).count(),
        }
    }

    /// The longest wall feature, if any wall was classified
    pub fn longest_wall(&self) -> Option<&LineSegment> {
        self.of_kind(FeatureKind::Wall)
            .filter_map(|f| f.as_line())
            .max_by(|a, b| {
                a.length()
                    .partial_cmp(&b.length())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }
}

/// Real-world measurement unit
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    Meters,
    Feet,
}

impl std::fmt::Display for LengthUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LengthUnit::Meters => write!(f, "meters"),
            LengthUnit::Feet => write!(f, "feet"),
        }
    }
}

/// Caller-supplied room measurements. Immutable input to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub wall_length: f64,
    pub ceiling_height: f64,
    pub unit: LengthUnit,
    pub room_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Measurement {
    /// Reject unusable measurements before any detection work runs
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.wall_length.is_finite() || self.wall_length <= 0.0 {
            return Err(PipelineError::InvalidMeasurement(format!(
                "wallLength must be positive, got {}",
                self.wall_length
            )));
        }
        if !self.ceiling_height.is_finite() || self.ceiling_height <= 0.0 {
            return Err(PipelineError::InvalidMeasurement(format!(
                "ceilingHeight must be positive, got {}",
                self.ceiling_height
            )));
        }
        Ok(())
    }
}

/// Pixel-to-real-world conversion, derived once per request
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScaleRatio {
    pub pixels_per_unit: f64,
    pub unit: LengthUnit,
    /// True when no wall was detected and the framing-based estimate was used
    pub fallback: bool,
}

/// Blueprint request: 1-5 encoded images plus the measurement record
#[derive(Debug, Clone)]
pub struct BlueprintRequest {
    pub images: Vec<Vec<u8>>,
    pub measurement: Measurement,
}

/// Blueprint response returned to the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlueprintResponse {
    /// PNG blueprint as a `data:image/png;base64,...` URI
    pub blueprint_image: String,
    /// The measurement values the scale was derived from
    pub measurements_echo: Measurement,
    pub processing_time_seconds: f64,
    pub feature_counts: FeatureCounts,
    /// Best-effort indicator: empty feature set or fallback scale path
    pub low_confidence: bool,
}

/// Configuration for the detection pipeline
///
/// Thresholds are tunable policy, not hard law; defaults were chosen on
/// hand-held room photos downscaled to 1024 px.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Longest side of the preprocessed image (pixels)
    pub max_dimension: u32,
    /// Gaussian blur sigma applied before edge detection
    pub blur_sigma: f32,
    /// Canny edge detection low threshold
    pub canny_low: f32,
    /// Canny edge detection high threshold
    pub canny_high: f32,
    /// Hough line detection vote threshold
    pub hough_threshold: u32,
    /// Minimum line length in pixels
    pub min_line_length: f64,
    /// Maximum gap between edge pixels on the same line (pixels)
    pub max_line_gap: f64,
    /// Angle tolerance for merging near-parallel lines (radians)
    pub merge_angle_tolerance: f64,
    /// Distance tolerance for merging near-parallel lines (pixels)
    pub merge_distance_tolerance: f64,
    /// Harris detector free parameter k
    pub harris_k: f64,
    /// Corner responses below this fraction of the image maximum are dropped
    pub corner_response_fraction: f64,
    /// Non-maximum suppression radius for corners (pixels)
    pub corner_nms_radius: u32,
    /// A line is a wall when its length exceeds this fraction of the
    /// image's longest dimension
    pub min_wall_fraction: f64,
    /// A corner must lie within this distance of two wall endpoints (pixels)
    pub corner_snap_tolerance: f64,
    /// Cross-image dedup cell size as a fraction of the longest dimension
    pub dedup_distance_fraction: f64,
    /// Intensity deviation from the wall median that marks an opening
    pub opening_intensity_delta: f64,
    /// Opening run length bounds as fractions of the host wall length
    pub opening_min_fraction: f64,
    pub opening_max_fraction: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            max_dimension: 1024,
            blur_sigma: 1.4,
            canny_low: 50.0,
            canny_high: 150.0,
            hough_threshold: 80,
            min_line_length: 40.0,
            max_line_gap: 10.0,
            merge_angle_tolerance: 0.087, // ~5 degrees
            merge_distance_tolerance: 8.0,
            harris_k: 0.04,
            corner_response_fraction: 0.01,
            corner_nms_radius: 8,
            min_wall_fraction: 0.15,
            corner_snap_tolerance: 12.0,
            dedup_distance_fraction: 0.02,
            opening_intensity_delta: 45.0,
            opening_min_fraction: 0.08,
            opening_max_fraction: 0.5,
        }
    }
}

/// Configuration for blueprint rendering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Square output canvas side (pixels)
    pub canvas_size: u32,
    /// Margin kept clear around the drawing (pixels)
    pub margin: u32,
    /// Background grid spacing (pixels); 0 disables the grid
    pub grid_spacing: u32,
    /// Wall stroke half-thickness (pixels)
    pub wall_stroke: u32,
    /// Maximum door markers drawn
    pub max_door_markers: usize,
    /// Maximum window markers drawn
    pub max_window_markers: usize,
    /// Fraction of the frame the measured wall is assumed to span when no
    /// wall was detected (fallback scale estimate)
    pub fallback_frame_fraction: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            canvas_size: 800,
            margin: 70,
            grid_spacing: 50,
            wall_stroke: 2,
            max_door_markers: 2,
            max_window_markers: 4,
            fallback_frame_fraction: 0.6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_line_segment_accessors() {
        let line = LineSegment::new(Point2D::new(0.0, 0.0), Point2D::new(3.0, 4.0));
        assert_relative_eq!(line.length(), 5.0);
        assert_relative_eq!(line.midpoint().x, 1.5);
        assert_relative_eq!(line.midpoint().y, 2.0);

        let horizontal = LineSegment::new(Point2D::new(0.0, 0.0), Point2D::new(10.0, 0.0));
        assert_relative_eq!(horizontal.angle(), 0.0);
    }

    #[test]
    fn test_counts_match_filtered_lengths() {
        let wall = LineSegment::new(Point2D::new(0.0, 0.0), Point2D::new(100.0, 0.0));
        let set = RoomFeatureSet {
            features: vec![
                ClassifiedFeature::wall(wall.clone(), 1.0),
                ClassifiedFeature::wall(wall, 0.8),
                ClassifiedFeature {
                    kind: FeatureKind::Corner,
                    geometry: FeatureGeometry::Point(Point2D::new(0.0, 0.0)),
                    confidence: 0.5,
                },
            ],
        };

        let counts = set.counts();
        assert_eq!(counts.walls, set.of_kind(FeatureKind::Wall).count());
        assert_eq!(counts.corners, set.of_kind(FeatureKind::Corner).count());
        assert_eq!(counts.doors, 0);
        assert_eq!(counts.windows, 0);
    }

    #[test]
    fn test_longest_wall() {
        let short = LineSegment::new(Point2D::new(0.0, 0.0), Point2D::new(50.0, 0.0));
        let long = LineSegment::new(Point2D::new(0.0, 10.0), Point2D::new(200.0, 10.0));
        let set = RoomFeatureSet {
            features: vec![
                ClassifiedFeature::wall(short, 0.6),
                ClassifiedFeature::wall(long, 0.9),
            ],
        };

        let longest = set.longest_wall().unwrap();
        assert_relative_eq!(longest.length(), 200.0);
    }

    #[test]
    fn test_measurement_validation() {
        let mut m = Measurement {
            wall_length: 10.0,
            ceiling_height: 2.5,
            unit: LengthUnit::Meters,
            room_type: "Living Room".to_string(),
            notes: None,
        };
        assert!(m.validate().is_ok());

        m.wall_length = -5.0;
        assert!(m.validate().is_err());

        m.wall_length = 10.0;
        m.ceiling_height = 0.0;
        assert!(m.validate().is_err());

        m.ceiling_height = f64::NAN;
        assert!(m.validate().is_err());
    }

    #[test]
    fn test_unit_serde_names() {
        assert_eq!(serde_json::to_string(&LengthUnit::Feet).unwrap(), "\"feet\"");
        let parsed: LengthUnit = serde_json::from_str("\"meters\"").unwrap();
        assert_eq!(parsed, LengthUnit::Meters);
        assert!(serde_json::from_str::<LengthUnit>("\"furlongs\"").is_err());
    }

    #[test]
    fn test_response_wire_names() {
        let response = BlueprintResponse {
            blueprint_image: "data:image/png;base64,AAAA".to_string(),
            measurements_echo: Measurement {
                wall_length: 12.0,
                ceiling_height: 9.0,
                unit: LengthUnit::Feet,
                room_type: "Bedroom".to_string(),
                notes: None,
            },
            processing_time_seconds: 0.25,
            feature_counts: FeatureCounts::default(),
            low_confidence: true,
        };

        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("blueprintImage").is_some());
        assert!(value.get("measurementsEcho").is_some());
        assert!(value.get("processingTimeSeconds").is_some());
        assert!(value.get("featureCounts").is_some());
        assert!(value.get("lowConfidence").is_some());
        assert!(value["measurementsEcho"].get("wallLength").is_some());
    }
}
