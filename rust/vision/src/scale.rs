// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pixel-space to real-world scale resolution
//!
//! The single place where pixel distances and measurement units meet.
//! Every other stage works purely in pixels or purely in units.

use crate::types::{Measurement, RenderConfig, RoomFeatureSet, ScaleRatio};
use tracing::{debug, warn};

/// Derive the pixels-per-unit ratio for a request.
///
/// The longest classified wall is assumed to be the wall the caller
/// measured. With no walls detected, the ratio falls back to a framing
/// assumption: the measured wall spans `fallback_frame_fraction` of the
/// longest preprocessed image dimension. The fallback is flagged so the
/// response can carry a low-confidence marker.
///
/// Guarantee: `pixels_per_unit > 0` for any validated measurement.
pub fn resolve_scale(
    features: &RoomFeatureSet,
    measurement: &Measurement,
    longest_image_dim: u32,
    config: &RenderConfig,
) -> ScaleRatio {
    match features.longest_wall() {
        Some(wall) => {
            let pixels_per_unit = wall.length() / measurement.wall_length;
            debug!(
                wall_px = wall.length(),
                pixels_per_unit, "scale resolved from longest wall"
            );
            ScaleRatio {
                pixels_per_unit,
                unit: measurement.unit,
                fallback: false,
            }
        }
        None => {
            let assumed_span = longest_image_dim.max(1) as f64 * config.fallback_frame_fraction;
            let pixels_per_unit = assumed_span / measurement.wall_length;
            warn!(pixels_per_unit, "no walls detected, using framing-based scale estimate");
            ScaleRatio {
                pixels_per_unit,
                unit: measurement.unit,
                fallback: true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClassifiedFeature, LengthUnit, LineSegment, Point2D};
    use approx::assert_relative_eq;

    fn measurement(wall_length: f64) -> Measurement {
        Measurement {
            wall_length,
            ceiling_height: 2.4,
            unit: LengthUnit::Meters,
            room_type: "Kitchen".to_string(),
            notes: None,
        }
    }

    #[test]
    fn test_scale_from_longest_wall() {
        let set = RoomFeatureSet {
            features: vec![
                ClassifiedFeature::wall(
                    LineSegment::new(Point2D::new(0.0, 0.0), Point2D::new(500.0, 0.0)),
                    0.9,
                ),
                ClassifiedFeature::wall(
                    LineSegment::new(Point2D::new(0.0, 0.0), Point2D::new(0.0, 200.0)),
                    0.5,
                ),
            ],
        };

        let scale = resolve_scale(&set, &measurement(5.0), 1024, &RenderConfig::default());
        assert_relative_eq!(scale.pixels_per_unit, 100.0);
        assert!(!scale.fallback);
        assert_eq!(scale.unit, LengthUnit::Meters);
    }

    #[test]
    fn test_fallback_when_no_walls() {
        let scale = resolve_scale(
            &RoomFeatureSet::default(),
            &measurement(4.0),
            1000,
            &RenderConfig::default(),
        );

        // 1000 px * 0.6 frame fraction / 4 units
        assert_relative_eq!(scale.pixels_per_unit, 150.0);
        assert!(scale.fallback);
    }

    #[test]
    fn test_scale_always_positive() {
        for wall_length in [0.1, 1.0, 42.0, 1e6] {
            let scale = resolve_scale(
                &RoomFeatureSet::default(),
                &measurement(wall_length),
                800,
                &RenderConfig::default(),
            );
            assert!(scale.pixels_per_unit > 0.0);
        }
    }
}
