// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-image feature detection stage

use crate::corner_ops::detect_corners;
use crate::image_ops::{canny_edges, gaussian_blur};
use crate::line_ops::{extract_segments, merge_near_parallel};
use crate::types::{CornerPoint, DetectionConfig, LineSegment};
use image::GrayImage;
use tracing::debug;

/// Raw geometry detected in one preprocessed image
#[derive(Debug, Clone)]
pub struct ImageFeatures {
    pub width: u32,
    pub height: u32,
    pub lines: Vec<LineSegment>,
    pub corners: Vec<CornerPoint>,
}

impl ImageFeatures {
    /// Longest image dimension, the reference for relative thresholds
    pub fn longest_dimension(&self) -> u32 {
        self.width.max(self.height)
    }
}

/// Detect line segments and corner points in a preprocessed image.
///
/// The edge map is an intermediate of this stage only; it is dropped
/// before returning. Sparse geometry (fewer than 4 lines) is returned
/// as-is: downstream stages degrade gracefully instead of failing.
pub fn detect_features(gray: &GrayImage, config: &DetectionConfig) -> ImageFeatures {
    // Step 1: Blur to suppress sensor noise before gradient work
    let blurred = gaussian_blur(gray, config.blur_sigma);

    // Step 2: Canny edge map with hysteresis thresholds
    let edges = canny_edges(&blurred, config.canny_low, config.canny_high);

    // Step 3: Hough voting over edge pixels, split into segments
    let raw_lines = extract_segments(
        &edges,
        config.hough_threshold,
        config.min_line_length,
        config.max_line_gap,
    );
    drop(edges);

    // Step 4: Collapse duplicate near-parallel detections
    let lines = merge_near_parallel(
        &raw_lines,
        config.merge_angle_tolerance,
        config.merge_distance_tolerance,
    );

    // Step 5: Harris corners on the blurred image
    let corners = detect_corners(&blurred, config);

    if lines.len() < 4 {
        debug!(
            lines = lines.len(),
            "sparse line geometry, downstream confidence will degrade"
        );
    }
    debug!(lines = lines.len(), corners = corners.len(), "image features detected");

    ImageFeatures {
        width: gray.width(),
        height: gray.height(),
        lines,
        corners,
    }
}
