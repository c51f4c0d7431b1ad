// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Corner extraction via the Harris structure tensor
//!
//! Sobel gradients feed a windowed second-moment matrix per pixel; the
//! cornerness response is `det(M) - k * trace(M)^2`. Candidates above a
//! fraction of the image maximum survive, then fixed-radius non-maximum
//! suppression keeps one corner per local cluster.

use crate::types::{CornerPoint, DetectionConfig};
use image::GrayImage;
use nalgebra::Matrix2;
use rustc_hash::FxHashMap;

/// Window radius for the structure tensor sums
const TENSOR_WINDOW_RADIUS: i32 = 1;

/// Per-pixel Harris cornerness response
struct ResponseMap {
    width: usize,
    height: usize,
    values: Vec<f64>,
    max: f64,
}

/// Detect corner points in a preprocessed grayscale image.
///
/// Returns an empty list for featureless images; this is expected
/// degradation, not an error.
pub fn detect_corners(gray: &GrayImage, config: &DetectionConfig) -> Vec<CornerPoint> {
    let response = harris_response(gray, config.harris_k);
    if response.max <= f64::EPSILON {
        return Vec::new();
    }

    let threshold = response.max * config.corner_response_fraction;
    let mut candidates: Vec<CornerPoint> = Vec::new();
    for y in 0..response.height {
        for x in 0..response.width {
            let r = response.values[y * response.width + x];
            if r > threshold {
                candidates.push(CornerPoint {
                    x: x as f64,
                    y: y as f64,
                    strength: (r / response.max) as f32,
                });
            }
        }
    }

    suppress_non_maxima(candidates, config.corner_nms_radius as f64)
}

fn harris_response(gray: &GrayImage, k: f64) -> ResponseMap {
    let width = gray.width() as usize;
    let height = gray.height() as usize;

    let gx = imageproc::gradients::horizontal_sobel(gray);
    let gy = imageproc::gradients::vertical_sobel(gray);

    // Gradient products
    let mut ixx = vec![0.0f64; width * height];
    let mut iyy = vec![0.0f64; width * height];
    let mut ixy = vec![0.0f64; width * height];
    for y in 0..height {
        for x in 0..width {
            let dx = gx.get_pixel(x as u32, y as u32).0[0] as f64;
            let dy = gy.get_pixel(x as u32, y as u32).0[0] as f64;
            let idx = y * width + x;
            ixx[idx] = dx * dx;
            iyy[idx] = dy * dy;
            ixy[idx] = dx * dy;
        }
    }

    let mut values = vec![0.0f64; width * height];
    let mut max = 0.0f64;
    let r = TENSOR_WINDOW_RADIUS;

    for y in 0..height as i32 {
        for x in 0..width as i32 {
            let mut sxx = 0.0;
            let mut syy = 0.0;
            let mut sxy = 0.0;
            for wy in -r..=r {
                for wx in -r..=r {
                    let px = (x + wx).clamp(0, width as i32 - 1) as usize;
                    let py = (y + wy).clamp(0, height as i32 - 1) as usize;
                    let idx = py * width + px;
                    sxx += ixx[idx];
                    syy += iyy[idx];
                    sxy += ixy[idx];
                }
            }

            let m = Matrix2::new(sxx, sxy, sxy, syy);
            let response = m.determinant() - k * m.trace().powi(2);
            values[y as usize * width + x as usize] = response;
            if response > max {
                max = response;
            }
        }
    }

    ResponseMap {
        width,
        height,
        values,
        max,
    }
}

/// Greedy non-maximum suppression over a spatial hash grid.
///
/// Candidates are visited strongest-first; a candidate survives only if no
/// already-kept corner lies within `radius`.
fn suppress_non_maxima(mut candidates: Vec<CornerPoint>, radius: f64) -> Vec<CornerPoint> {
    candidates.sort_by(|a, b| {
        b.strength
            .partial_cmp(&a.strength)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let cell = radius.max(1.0);
    let mut grid: FxHashMap<(i64, i64), Vec<usize>> = FxHashMap::default();
    let mut kept: Vec<CornerPoint> = Vec::new();

    'candidates: for candidate in candidates {
        let cx = (candidate.x / cell).floor() as i64;
        let cy = (candidate.y / cell).floor() as i64;

        for nx in cx - 1..=cx + 1 {
            for ny in cy - 1..=cy + 1 {
                if let Some(indices) = grid.get(&(nx, ny)) {
                    for &i in indices {
                        let dx = kept[i].x - candidate.x;
                        let dy = kept[i].y - candidate.y;
                        if (dx * dx + dy * dy).sqrt() < radius {
                            continue 'candidates;
                        }
                    }
                }
            }
        }

        grid.entry((cx, cy)).or_default().push(kept.len());
        kept.push(candidate);
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    /// White background with a black rectangle: four strong corners
    fn rectangle_image() -> GrayImage {
        let mut img = GrayImage::from_pixel(100, 100, Luma([255]));
        for y in 30..70 {
            for x in 20..80 {
                img.put_pixel(x, y, Luma([0]));
            }
        }
        img
    }

    #[test]
    fn test_detects_rectangle_corners() {
        let img = rectangle_image();
        let corners = detect_corners(&img, &DetectionConfig::default());

        assert!(corners.len() >= 4, "expected at least 4 corners, got {}", corners.len());

        // Each rectangle corner should have a detection nearby
        for (cx, cy) in [(20.0, 30.0), (79.0, 30.0), (20.0, 69.0), (79.0, 69.0)] {
            let hit = corners.iter().any(|c| {
                let dx = c.x - cx;
                let dy = c.y - cy;
                (dx * dx + dy * dy).sqrt() < 6.0
            });
            assert!(hit, "no corner near ({cx}, {cy})");
        }
    }

    #[test]
    fn test_blank_image_has_no_corners() {
        let img = GrayImage::from_pixel(64, 64, Luma([0]));
        let corners = detect_corners(&img, &DetectionConfig::default());
        assert!(corners.is_empty());
    }

    #[test]
    fn test_nms_keeps_one_per_cluster() {
        let candidates = vec![
            CornerPoint { x: 10.0, y: 10.0, strength: 1.0 },
            CornerPoint { x: 11.0, y: 10.0, strength: 0.9 },
            CornerPoint { x: 12.0, y: 11.0, strength: 0.8 },
            CornerPoint { x: 50.0, y: 50.0, strength: 0.7 },
        ];

        let kept = suppress_non_maxima(candidates, 8.0);
        assert_eq!(kept.len(), 2);
        // Strongest member of the cluster wins
        assert_eq!(kept[0].x, 10.0);
    }
}
