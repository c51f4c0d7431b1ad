// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Straight-line extraction from edge maps
//!
//! Hough-style voting: each edge pixel votes for every (theta, rho)
//! parameter pair it could lie on; accumulator cells above the vote
//! threshold are walked along their supporting edge pixels and split at
//! gaps into concrete segments.

use crate::types::{LineSegment, Point2D};
use image::GrayImage;
use std::f64::consts::PI;

/// Cap on accumulator peaks walked per image. Room photos rarely hold more
/// than a few dozen true lines; the cap bounds worst-case noise.
const MAX_PEAKS: usize = 400;

/// Rho tolerance when assigning edge pixels to a peak line (pixels)
const RHO_ASSIGN_TOLERANCE: f64 = 2.0;

/// Extract line segments from a binary edge map.
///
/// `threshold` is the minimum accumulator vote count, `min_line_length`
/// discards fragments, and `max_line_gap` splits a voted line into
/// segments wherever consecutive supporting pixels are further apart.
pub fn extract_segments(
    edges: &GrayImage,
    threshold: u32,
    min_line_length: f64,
    max_line_gap: f64,
) -> Vec<LineSegment> {
    let width = edges.width() as i32;
    let height = edges.height() as i32;

    // 1 degree angular resolution, 1 pixel rho resolution
    let theta_step = PI / 180.0;
    let num_thetas = 180;

    let mut cos_table = Vec::with_capacity(num_thetas);
    let mut sin_table = Vec::with_capacity(num_thetas);
    for i in 0..num_thetas {
        let theta = i as f64 * theta_step;
        cos_table.push(theta.cos());
        sin_table.push(theta.sin());
    }

    let max_rho = ((width * width + height * height) as f64).sqrt();
    let num_rhos = (2.0 * max_rho) as usize + 1;
    let rho_offset = max_rho;

    let mut accumulator = vec![0u32; num_thetas * num_rhos];

    let mut edge_points: Vec<(i32, i32)> = Vec::new();
    for y in 0..height {
        for x in 0..width {
            if edges.get_pixel(x as u32, y as u32).0[0] > 128 {
                edge_points.push((x, y));
            }
        }
    }

    for &(x, y) in &edge_points {
        for theta_idx in 0..num_thetas {
            let rho = x as f64 * cos_table[theta_idx] + y as f64 * sin_table[theta_idx];
            let rho_idx = (rho + rho_offset) as usize;
            if rho_idx < num_rhos {
                accumulator[theta_idx * num_rhos + rho_idx] += 1;
            }
        }
    }

    let mut peaks: Vec<(usize, usize, u32)> = Vec::new();
    for theta_idx in 0..num_thetas {
        for rho_idx in 0..num_rhos {
            let votes = accumulator[theta_idx * num_rhos + rho_idx];
            if votes >= threshold {
                peaks.push((theta_idx, rho_idx, votes));
            }
        }
    }
    peaks.sort_by(|a, b| b.2.cmp(&a.2));

    // Walk the strongest peaks first; pixels consumed by a segment cannot
    // support a later (weaker) peak, which kills near-duplicate lines at
    // the source.
    let mut segments = Vec::new();
    let mut used = vec![false; edge_points.len()];

    for (theta_idx, rho_idx, _votes) in peaks.iter().take(MAX_PEAKS) {
        let rho = *rho_idx as f64 - rho_offset;
        let cos_t = cos_table[*theta_idx];
        let sin_t = sin_table[*theta_idx];

        // Supporting pixels, ordered along the line direction
        let mut supporters: Vec<(i32, i32, usize)> = Vec::new();
        for (i, &(x, y)) in edge_points.iter().enumerate() {
            if used[i] {
                continue;
            }
            let point_rho = x as f64 * cos_t + y as f64 * sin_t;
            if (point_rho - rho).abs() < RHO_ASSIGN_TOLERANCE {
                supporters.push((x, y, i));
            }
        }
        if supporters.len() < 2 {
            continue;
        }

        supporters.sort_by(|a, b| {
            let proj_a = a.0 as f64 * (-sin_t) + a.1 as f64 * cos_t;
            let proj_b = b.0 as f64 * (-sin_t) + b.1 as f64 * cos_t;
            proj_a.partial_cmp(&proj_b).unwrap_or(std::cmp::Ordering::Equal)
        });

        // Split at gaps, keep segments above the length floor
        let mut run_start = 0;
        for i in 1..=supporters.len() {
            let gap = if i == supporters.len() {
                f64::MAX
            } else {
                let dx = (supporters[i].0 - supporters[i - 1].0) as f64;
                let dy = (supporters[i].1 - supporters[i - 1].1) as f64;
                (dx * dx + dy * dy).sqrt()
            };
            if gap <= max_line_gap {
                continue;
            }

            if i - run_start >= 2 {
                let first = &supporters[run_start];
                let last = &supporters[i - 1];
                let segment = LineSegment::new(
                    Point2D::new(first.0 as f64, first.1 as f64),
                    Point2D::new(last.0 as f64, last.1 as f64),
                );
                if segment.length() >= min_line_length {
                    for s in &supporters[run_start..i] {
                        used[s.2] = true;
                    }
                    segments.push(segment);
                }
            }
            run_start = i;
        }
    }

    segments
}

/// Merge segments whose direction and perpendicular offset are within
/// tolerance. Collapses duplicate near-parallel detections of one edge.
pub fn merge_near_parallel(
    segments: &[LineSegment],
    angle_tolerance: f64,
    distance_tolerance: f64,
) -> Vec<LineSegment> {
    let mut merged: Vec<LineSegment> = Vec::new();
    let mut used = vec![false; segments.len()];

    for (i, segment) in segments.iter().enumerate() {
        if used[i] {
            continue;
        }
        used[i] = true;
        let mut group = vec![segment.clone()];

        for (j, other) in segments.iter().enumerate().skip(i + 1) {
            if used[j] {
                continue;
            }
            if same_line(segment, other, angle_tolerance, distance_tolerance) {
                group.push(other.clone());
                used[j] = true;
            }
        }

        merged.push(merge_group(&group));
    }

    merged
}

/// True when two segments lie on (approximately) the same infinite line
fn same_line(
    a: &LineSegment,
    b: &LineSegment,
    angle_tolerance: f64,
    distance_tolerance: f64,
) -> bool {
    let mut angle_diff = (a.angle() - b.angle()).abs();
    // Lines are direction-free: fold opposite headings together
    if angle_diff > PI / 2.0 {
        angle_diff = PI - angle_diff;
    }
    if angle_diff > angle_tolerance {
        return false;
    }

    point_to_segment_distance(&b.midpoint(), a) <= distance_tolerance
}

/// Perpendicular distance from a point to a segment (clamped to endpoints)
pub fn point_to_segment_distance(point: &Point2D, segment: &LineSegment) -> f64 {
    let dx = segment.end.x - segment.start.x;
    let dy = segment.end.y - segment.start.y;
    let length_sq = dx * dx + dy * dy;

    if length_sq < 1e-10 {
        return point.distance_to(&segment.start);
    }

    let t = ((point.x - segment.start.x) * dx + (point.y - segment.start.y) * dy) / length_sq;
    let t = t.clamp(0.0, 1.0);

    let proj = Point2D::new(segment.start.x + t * dx, segment.start.y + t * dy);
    point.distance_to(&proj)
}

/// Merge a group of near-collinear segments into their common extent
fn merge_group(group: &[LineSegment]) -> LineSegment {
    if group.len() == 1 {
        return group[0].clone();
    }

    let avg_angle: f64 = group.iter().map(|s| s.angle()).sum::<f64>() / group.len() as f64;
    let cos_a = avg_angle.cos();
    let sin_a = avg_angle.sin();

    let mut min_proj = f64::MAX;
    let mut max_proj = f64::MIN;
    let mut min_point = group[0].start;
    let mut max_point = group[0].start;

    for point in group.iter().flat_map(|s| [s.start, s.end]) {
        let proj = point.x * cos_a + point.y * sin_a;
        if proj < min_proj {
            min_proj = proj;
            min_point = point;
        }
        if proj > max_proj {
            max_proj = proj;
            max_point = point;
        }
    }

    LineSegment::new(min_point, max_point)
}

/// Drop segments shorter than `min_length`
pub fn filter_short_segments(segments: Vec<LineSegment>, min_length: f64) -> Vec<LineSegment> {
    segments
        .into_iter()
        .filter(|s| s.length() >= min_length)
        .collect()
}
