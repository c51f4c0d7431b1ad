// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Room photo analysis and 2D blueprint generation
//!
//! This crate provides a complete pipeline for:
//! 1. Preprocessing uncalibrated room photographs (resize, contrast, denoise)
//! 2. Detecting straight lines and corners (Canny + Hough voting + Harris)
//! 3. Classifying walls, door/window openings and corroborated corners
//! 4. Resolving a pixel-to-real-world scale from user measurements
//! 5. Rendering an annotated top-down blueprint as a PNG data URI
//!
//! # Usage
//!
//! ```rust,ignore
//! use roomplan_vision::{generate_blueprint, BlueprintRequest, Measurement, LengthUnit};
//!
//! let request = BlueprintRequest {
//!     images: vec![photo_bytes],
//!     measurement: Measurement {
//!         wall_length: 4.2,
//!         ceiling_height: 2.4,
//!         unit: LengthUnit::Meters,
//!         room_type: "Living Room".into(),
//!         notes: None,
//!     },
//! };
//!
//! let response = generate_blueprint(&request)?;
//! println!("{:?}", response.feature_counts);
//! ```
//!
//! The pipeline is a pure function of (images, measurement): no shared
//! state, no caching across requests, deterministic output for identical
//! input bytes. Per-image work runs on the rayon thread pool; the only
//! synchronization point is the join before classification.

pub mod classifier;
pub mod corner_ops;
pub mod detector;
pub mod error;
pub mod image_ops;
pub mod line_ops;
pub mod render;
pub mod scale;
pub mod types;

// Re-export commonly used types and functions
pub use classifier::{consolidate, PerImage};
pub use detector::{detect_features, ImageFeatures};
pub use error::PipelineError;
pub use render::{render, Blueprint};
pub use scale::resolve_scale;
pub use types::{
    BlueprintRequest, BlueprintResponse, ClassifiedFeature, CornerPoint, DetectionConfig,
    FeatureCounts, FeatureGeometry, FeatureKind, LengthUnit, LineSegment, Measurement, Point2D,
    RenderConfig, RoomFeatureSet, ScaleRatio,
};

use rayon::prelude::*;
use std::time::Instant;
use tracing::info;

/// Maximum number of images per request
pub const MAX_IMAGES: usize = 5;

/// Run the full pipeline with default configuration.
///
/// Validation happens up front: a bad measurement or image count fails
/// before any pixel is decoded. Detection shortfalls never fail the
/// request; they surface through `feature_counts` and `low_confidence`.
pub fn generate_blueprint(
    request: &BlueprintRequest,
) -> Result<BlueprintResponse, PipelineError> {
    generate_blueprint_with(request, &DetectionConfig::default(), &RenderConfig::default())
}

/// Run the full pipeline with explicit configuration
pub fn generate_blueprint_with(
    request: &BlueprintRequest,
    detection: &DetectionConfig,
    render_config: &RenderConfig,
) -> Result<BlueprintResponse, PipelineError> {
    let start = Instant::now();

    request.measurement.validate()?;
    if request.images.is_empty() || request.images.len() > MAX_IMAGES {
        return Err(PipelineError::ImageCount(request.images.len()));
    }

    // Per-image decode, preprocess and detect: embarrassingly parallel,
    // joined before classification
    let per_image: Vec<PerImage> = request
        .images
        .par_iter()
        .enumerate()
        .map(|(index, bytes)| {
            let gray = image_ops::decode_image(bytes, index)?;
            let bitmap = image_ops::preprocess(gray, detection);
            let features = detector::detect_features(&bitmap, detection);
            Ok(PerImage { bitmap, features })
        })
        .collect::<Result<_, PipelineError>>()?;

    let longest_dim = per_image
        .iter()
        .map(|p| p.features.longest_dimension())
        .max()
        .unwrap_or(0);

    let features = classifier::consolidate(&per_image, detection);
    drop(per_image);

    let ratio = scale::resolve_scale(&features, &request.measurement, longest_dim, render_config);
    let blueprint = render::render(&features, &ratio, &request.measurement, render_config);

    let feature_counts = features.counts();
    let low_confidence = features.is_empty() || ratio.fallback;
    let blueprint_image = blueprint.to_data_uri()?;
    let processing_time_seconds = start.elapsed().as_secs_f64();

    info!(
        images = request.images.len(),
        walls = feature_counts.walls,
        doors = feature_counts.doors,
        windows = feature_counts.windows,
        corners = feature_counts.corners,
        low_confidence,
        elapsed_s = processing_time_seconds,
        "blueprint generated"
    );

    Ok(BlueprintResponse {
        blueprint_image,
        measurements_echo: request.measurement.clone(),
        processing_time_seconds,
        feature_counts,
        low_confidence,
    })
}
