// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Image decoding and preprocessing for room photo analysis

use crate::error::PipelineError;
use crate::types::DetectionConfig;
use image::imageops::FilterType;
use image::{GrayImage, Luma};
use tracing::debug;

/// Decode raw image bytes into a grayscale bitmap.
///
/// Fails with [`PipelineError::InvalidImage`] carrying the request-level
/// image index when the bytes do not decode or decode to an empty bitmap.
pub fn decode_image(bytes: &[u8], index: usize) -> Result<GrayImage, PipelineError> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|err| PipelineError::invalid_image(index, err))?;

    let gray = decoded.to_luma8();
    if gray.width() == 0 || gray.height() == 0 {
        return Err(PipelineError::InvalidImage {
            index,
            reason: "decoded to an empty bitmap".to_string(),
        });
    }

    debug!(index, width = gray.width(), height = gray.height(), "image decoded");
    Ok(gray)
}

/// Normalize an input image for feature detection.
///
/// Caps the longest side at `config.max_dimension`, stretches contrast to
/// the full 0-255 range, and removes salt-and-pepper noise with a 3x3
/// median filter. All steps are deterministic: identical input bytes
/// always produce an identical bitmap.
pub fn preprocess(gray: GrayImage, config: &DetectionConfig) -> GrayImage {
    let resized = resize_to_max(gray, config.max_dimension);
    let stretched = stretch_contrast(&resized);
    imageproc::filter::median_filter(&stretched, 1, 1)
}

/// Downscale so the longest side does not exceed `max_dimension`.
///
/// Uses a triangle filter: cheap and free of the ringing a Lanczos kernel
/// can introduce around hard wall edges.
fn resize_to_max(gray: GrayImage, max_dimension: u32) -> GrayImage {
    let (width, height) = gray.dimensions();
    let longest = width.max(height);
    if longest <= max_dimension {
        return gray;
    }

    let scale = max_dimension as f64 / longest as f64;
    let new_width = ((width as f64 * scale).round() as u32).max(1);
    let new_height = ((height as f64 * scale).round() as u32).max(1);
    debug!(new_width, new_height, "downscaling oversized input");
    image::imageops::resize(&gray, new_width, new_height, FilterType::Triangle)
}

/// Stretch pixel intensities to cover the full 0-255 range.
///
/// Uniform images pass through unchanged.
fn stretch_contrast(gray: &GrayImage) -> GrayImage {
    let (min_val, max_val) = min_max(gray);
    if max_val <= min_val {
        return gray.clone();
    }

    let range = (max_val - min_val) as f32;
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let pixel = gray.get_pixel(x, y).0[0];
        Luma([((pixel - min_val) as f32 / range * 255.0) as u8])
    })
}

fn min_max(gray: &GrayImage) -> (u8, u8) {
    let mut min = 255u8;
    let mut max = 0u8;
    for pixel in gray.pixels() {
        let val = pixel.0[0];
        min = min.min(val);
        max = max.max(val);
    }
    (min, max)
}

/// Apply Gaussian blur for noise reduction
pub fn gaussian_blur(image: &GrayImage, sigma: f32) -> GrayImage {
    imageproc::filter::gaussian_blur_f32(image, sigma)
}

/// Apply Canny edge detection with hysteresis thresholds
pub fn canny_edges(image: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    imageproc::edges::canny(image, low_threshold, high_threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode_image(b"definitely not an image", 3).unwrap_err();
        match err {
            PipelineError::InvalidImage { index, .. } => assert_eq!(index, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_decode_roundtrip_png() {
        let img = GrayImage::from_pixel(8, 8, Luma([200]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageLuma8(img)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();

        let decoded = decode_image(&bytes, 0).unwrap();
        assert_eq!(decoded.dimensions(), (8, 8));
        assert_eq!(decoded.get_pixel(0, 0).0[0], 200);
    }

    #[test]
    fn test_resize_caps_longest_side() {
        let img = GrayImage::new(2048, 1024);
        let resized = resize_to_max(img, 1024);
        assert_eq!(resized.width(), 1024);
        assert_eq!(resized.height(), 512);
    }

    #[test]
    fn test_resize_leaves_small_images_alone() {
        let img = GrayImage::new(640, 480);
        let resized = resize_to_max(img, 1024);
        assert_eq!(resized.dimensions(), (640, 480));
    }

    #[test]
    fn test_stretch_contrast_spans_full_range() {
        let img = GrayImage::from_fn(10, 1, |x, _| Luma([(50 + x * 10) as u8]));
        let stretched = stretch_contrast(&img);
        let (min, max) = min_max(&stretched);
        assert_eq!(min, 0);
        assert_eq!(max, 255);
    }

    #[test]
    fn test_stretch_contrast_uniform_image_unchanged() {
        let img = GrayImage::from_pixel(4, 4, Luma([128]));
        let stretched = stretch_contrast(&img);
        assert_eq!(stretched.get_pixel(2, 2).0[0], 128);
    }

    #[test]
    fn test_preprocess_is_deterministic() {
        let img = GrayImage::from_fn(64, 48, |x, y| Luma([((x * 3 + y * 7) % 256) as u8]));
        let config = DetectionConfig::default();
        let a = preprocess(img.clone(), &config);
        let b = preprocess(img, &config);
        assert_eq!(a.as_raw(), b.as_raw());
    }
}
