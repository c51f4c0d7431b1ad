// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Feature classification and cross-image consolidation
//!
//! Turns per-image raw geometry into one labeled room feature set:
//! - long lines become walls, short ones are discarded as noise
//! - intensity gaps along walls become door/window openings
//! - corners survive only when corroborated by wall endpoints
//! - features seen in several photos of the same room are deduplicated

use crate::detector::ImageFeatures;
use crate::line_ops::point_to_segment_distance;
use crate::types::{
    ClassifiedFeature, CornerPoint, DetectionConfig, FeatureGeometry, FeatureKind, LineSegment,
    Point2D, RoomFeatureSet,
};
use image::GrayImage;
use rustc_hash::FxHashMap;
use std::f64::consts::PI;
use tracing::debug;

/// Orientation tolerance when matching duplicate line features (radians)
const DEDUP_ANGLE_TOLERANCE: f64 = PI / 18.0;

/// Cap on the perpendicular scan when sizing an opening (pixels)
const OPENING_SCAN_CAP: i32 = 160;

/// One image's worth of detection output, paired with the preprocessed
/// bitmap the opening scan samples from
pub struct PerImage {
    pub bitmap: GrayImage,
    pub features: ImageFeatures,
}

/// Consolidate per-image features into a single room feature set.
///
/// Never fails; featureless input yields an empty set and the renderer
/// falls back to a placeholder outline.
pub fn consolidate(images: &[PerImage], config: &DetectionConfig) -> RoomFeatureSet {
    let longest_dim = images
        .iter()
        .map(|p| p.features.longest_dimension())
        .max()
        .unwrap_or(0) as f64;
    if longest_dim == 0.0 {
        return RoomFeatureSet::default();
    }

    let tolerance = (config.dedup_distance_fraction * longest_dim).max(1.0);
    let mut grid: FxHashMap<(i64, i64), Vec<usize>> = FxHashMap::default();
    let mut features: Vec<ClassifiedFeature> = Vec::new();

    for per_image in images {
        for feature in classify_image(per_image, config) {
            if is_duplicate(&feature, &grid, &features, tolerance) {
                continue;
            }
            let anchor = feature.geometry.anchor();
            let key = (
                (anchor.x / tolerance).floor() as i64,
                (anchor.y / tolerance).floor() as i64,
            );
            grid.entry(key).or_default().push(features.len());
            features.push(feature);
        }
    }

    let set = RoomFeatureSet { features };
    debug!(counts = ?set.counts(), "room features consolidated");
    set
}

/// A feature is a duplicate when an already-kept feature of the same kind
/// sits within the distance tolerance and (for lines) the same
/// pi-periodic orientation. The spatial hash keeps the scan local.
fn is_duplicate(
    feature: &ClassifiedFeature,
    grid: &FxHashMap<(i64, i64), Vec<usize>>,
    kept: &[ClassifiedFeature],
    tolerance: f64,
) -> bool {
    let anchor = feature.geometry.anchor();
    let cx = (anchor.x / tolerance).floor() as i64;
    let cy = (anchor.y / tolerance).floor() as i64;

    for nx in cx - 1..=cx + 1 {
        for ny in cy - 1..=cy + 1 {
            let Some(indices) = grid.get(&(nx, ny)) else {
                continue;
            };
            for &i in indices {
                let other = &kept[i];
                if other.kind != feature.kind {
                    continue;
                }
                if anchor.distance_to(&other.geometry.anchor()) > tolerance {
                    continue;
                }
                match (&feature.geometry, &other.geometry) {
                    (FeatureGeometry::Line(a), FeatureGeometry::Line(b)) => {
                        let mut diff = (a.angle().rem_euclid(PI) - b.angle().rem_euclid(PI)).abs();
                        if diff > PI / 2.0 {
                            diff = PI - diff;
                        }
                        if diff <= DEDUP_ANGLE_TOLERANCE {
                            return true;
                        }
                    }
                    _ => return true,
                }
            }
        }
    }

    false
}

/// Classify one image's geometry: walls first, then openings on those
/// walls, then corroborated corners.
fn classify_image(per_image: &PerImage, config: &DetectionConfig) -> Vec<ClassifiedFeature> {
    let longest_dim = per_image.features.longest_dimension() as f64;
    let min_wall_length = config.min_wall_fraction * longest_dim;

    let walls: Vec<(LineSegment, f32)> = per_image
        .features
        .lines
        .iter()
        .filter(|line| line.length() >= min_wall_length)
        .map(|line| {
            let confidence = (line.length() / longest_dim).min(1.0) as f32;
            (line.clone(), confidence)
        })
        .collect();

    let mut classified: Vec<ClassifiedFeature> = walls
        .iter()
        .map(|(line, confidence)| ClassifiedFeature::wall(line.clone(), *confidence))
        .collect();

    for (wall, _) in &walls {
        classified.extend(scan_wall_openings(&per_image.bitmap, wall, config));
    }

    let wall_lines: Vec<&LineSegment> = walls.iter().map(|(line, _)| line).collect();
    classified.extend(corroborated_corners(
        &per_image.features.corners,
        &wall_lines,
        config.corner_snap_tolerance,
    ));

    classified
}

/// Find openings along a wall line as runs of intensity that depart from
/// the wall's median, then label them door or window by the aspect ratio
/// of the gap region. A heuristic with tunable knobs, not a guarantee.
fn scan_wall_openings(
    bitmap: &GrayImage,
    wall: &LineSegment,
    config: &DetectionConfig,
) -> Vec<ClassifiedFeature> {
    let length = wall.length();
    let samples = length.floor() as usize;
    if samples < 8 {
        return Vec::new();
    }

    let dx = (wall.end.x - wall.start.x) / length;
    let dy = (wall.end.y - wall.start.y) / length;

    let profile: Vec<f64> = (0..samples)
        .map(|i| {
            let t = i as f64;
            sample_intensity(bitmap, wall.start.x + t * dx, wall.start.y + t * dy)
        })
        .collect();
    let median = median_of(&profile);

    let min_run = (config.opening_min_fraction * length).max(4.0) as usize;
    let max_run = (config.opening_max_fraction * length) as usize;

    let mut openings = Vec::new();
    let mut run_start: Option<usize> = None;

    for i in 0..=samples {
        let anomalous =
            i < samples && (profile[i] - median).abs() > config.opening_intensity_delta;
        match (run_start, anomalous) {
            (None, true) => run_start = Some(i),
            (Some(start), false) => {
                let run_len = i - start;
                if (min_run..=max_run).contains(&run_len) {
                    openings.push(opening_from_run(bitmap, wall, (dx, dy), start, i, median, config));
                }
                run_start = None;
            }
            _ => {}
        }
    }

    openings
}

/// Build the opening feature for an anomalous run along the wall
fn opening_from_run(
    bitmap: &GrayImage,
    wall: &LineSegment,
    (dx, dy): (f64, f64),
    start: usize,
    end: usize,
    wall_median: f64,
    config: &DetectionConfig,
) -> ClassifiedFeature {
    let run_len = (end - start) as f64;
    let sub = LineSegment::new(
        Point2D::new(
            wall.start.x + start as f64 * dx,
            wall.start.y + start as f64 * dy,
        ),
        Point2D::new(wall.start.x + end as f64 * dx, wall.start.y + end as f64 * dy),
    );

    // Size the gap perpendicular to the wall from the run midpoint: doors
    // read tall and narrow, windows wide and short.
    let mid = sub.midpoint();
    let (px, py) = (-dy, dx);
    let mut extent = 1.0;
    for dir in [-1.0f64, 1.0] {
        for step in 1..OPENING_SCAN_CAP {
            let s = dir * step as f64;
            let v = sample_intensity(bitmap, mid.x + s * px, mid.y + s * py);
            if (v - wall_median).abs() <= config.opening_intensity_delta {
                break;
            }
            extent += 1.0;
        }
    }

    let aspect = extent / run_len;
    let kind = if aspect > 1.0 {
        FeatureKind::Door
    } else {
        FeatureKind::Window
    };

    ClassifiedFeature {
        kind,
        geometry: FeatureGeometry::Line(sub),
        confidence: 0.5,
    }
}

/// Keep corners that sit near endpoints of at least two classified walls
fn corroborated_corners(
    corners: &[CornerPoint],
    walls: &[&LineSegment],
    tolerance: f64,
) -> Vec<ClassifiedFeature> {
    corners
        .iter()
        .filter(|corner| {
            let position = corner.position();
            let supporting = walls
                .iter()
                .filter(|wall| {
                    position.distance_to(&wall.start) <= tolerance
                        || position.distance_to(&wall.end) <= tolerance
                })
                .count();
            supporting >= 2
        })
        .map(|corner| ClassifiedFeature {
            kind: FeatureKind::Corner,
            geometry: FeatureGeometry::Point(corner.position()),
            confidence: corner.strength,
        })
        .collect()
}

fn sample_intensity(bitmap: &GrayImage, x: f64, y: f64) -> f64 {
    let px = (x.round() as i64).clamp(0, bitmap.width() as i64 - 1) as u32;
    let py = (y.round() as i64).clamp(0, bitmap.height() as i64 - 1) as u32;
    bitmap.get_pixel(px, py).0[0] as f64
}

fn median_of(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sorted[sorted.len() / 2]
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn features_for(
        width: u32,
        height: u32,
        lines: Vec<LineSegment>,
        corners: Vec<CornerPoint>,
    ) -> ImageFeatures {
        ImageFeatures {
            width,
            height,
            lines,
            corners,
        }
    }

    fn plain_per_image(lines: Vec<LineSegment>, corners: Vec<CornerPoint>) -> PerImage {
        PerImage {
            bitmap: GrayImage::from_pixel(400, 400, Luma([60])),
            features: features_for(400, 400, lines, corners),
        }
    }

    #[test]
    fn test_short_segments_discarded_as_noise() {
        let per_image = plain_per_image(
            vec![
                // 300 px: wall (>= 15% of 400)
                LineSegment::new(Point2D::new(20.0, 50.0), Point2D::new(320.0, 50.0)),
                // 30 px: noise
                LineSegment::new(Point2D::new(10.0, 10.0), Point2D::new(40.0, 10.0)),
            ],
            vec![],
        );

        let set = consolidate(&[per_image], &DetectionConfig::default());
        assert_eq!(set.counts().walls, 1);
    }

    #[test]
    fn test_corner_needs_two_wall_endpoints() {
        let walls = vec![
            LineSegment::new(Point2D::new(100.0, 100.0), Point2D::new(350.0, 100.0)),
            LineSegment::new(Point2D::new(100.0, 100.0), Point2D::new(100.0, 350.0)),
        ];
        let corners = vec![
            // At the shared endpoint of both walls
            CornerPoint { x: 102.0, y: 101.0, strength: 0.9 },
            // Stray corner in open space
            CornerPoint { x: 250.0, y: 250.0, strength: 0.8 },
        ];

        let per_image = plain_per_image(walls, corners);
        let set = consolidate(&[per_image], &DetectionConfig::default());

        assert_eq!(set.counts().corners, 1);
        assert_eq!(set.counts().walls, 2);
    }

    #[test]
    fn test_duplicate_walls_across_images_count_once() {
        let wall = LineSegment::new(Point2D::new(20.0, 50.0), Point2D::new(320.0, 50.0));
        let images: Vec<PerImage> = (0..3)
            .map(|i| {
                // Slightly different registration per photo
                let jitter = i as f64 * 1.5;
                plain_per_image(
                    vec![LineSegment::new(
                        Point2D::new(wall.start.x + jitter, wall.start.y + jitter),
                        Point2D::new(wall.end.x + jitter, wall.end.y + jitter),
                    )],
                    vec![],
                )
            })
            .collect();

        let set = consolidate(&images, &DetectionConfig::default());
        assert_eq!(set.counts().walls, 1, "same physical wall must not double-count");
    }

    #[test]
    fn test_distinct_walls_survive_dedup() {
        let images = vec![
            plain_per_image(
                vec![LineSegment::new(Point2D::new(20.0, 50.0), Point2D::new(320.0, 50.0))],
                vec![],
            ),
            plain_per_image(
                vec![LineSegment::new(Point2D::new(50.0, 20.0), Point2D::new(50.0, 320.0))],
                vec![],
            ),
        ];

        let set = consolidate(&images, &DetectionConfig::default());
        assert_eq!(set.counts().walls, 2);
    }

    #[test]
    fn test_opening_detected_in_wall_gap() {
        // Dark wall band across a mid-gray room, with a bright gap in the
        // middle: the gap reads as an opening.
        let mut bitmap = GrayImage::from_pixel(400, 400, Luma([120]));
        for x in 20..320 {
            for y in 48..53 {
                bitmap.put_pixel(x, y, Luma([20]));
            }
        }
        // Bright gap, 40 px wide, spanning a tall region (door-like)
        for x in 150..190 {
            for y in 0..200 {
                bitmap.put_pixel(x, y, Luma([230]));
            }
        }

        let per_image = PerImage {
            bitmap,
            features: features_for(
                400,
                400,
                vec![LineSegment::new(Point2D::new(20.0, 50.0), Point2D::new(320.0, 50.0))],
                vec![],
            ),
        };

        let set = consolidate(&[per_image], &DetectionConfig::default());
        let counts = set.counts();
        assert_eq!(counts.walls, 1);
        assert_eq!(counts.doors + counts.windows, 1, "the gap should classify as an opening");
        assert_eq!(counts.doors, 1, "tall narrow gap reads as a door");
    }

    #[test]
    fn test_empty_input_yields_empty_set() {
        let set = consolidate(&[], &DetectionConfig::default());
        assert!(set.is_empty());
        assert_eq!(set.counts(), Default::default());
    }
}
