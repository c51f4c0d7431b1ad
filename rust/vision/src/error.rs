// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error taxonomy for the blueprint pipeline

use thiserror::Error;

/// Errors that can abort a blueprint request.
///
/// Detection shortfalls (no lines found, no corners found) are not errors:
/// they degrade the output and surface through feature counts and the
/// `lowConfidence` response flag.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// An input image could not be decoded. Carries the 0-based index of
    /// the offending image so the caller can point at it.
    #[error("image {index} could not be decoded: {reason}")]
    InvalidImage { index: usize, reason: String },

    /// Request carried 0 images or more than the supported maximum.
    #[error("expected between 1 and 5 images, got {0}")]
    ImageCount(usize),

    /// Measurement failed validation before any image was touched.
    #[error("invalid measurement: {0}")]
    InvalidMeasurement(String),

    /// Canvas serialization failed. The only internal-bug class.
    #[error("blueprint encoding failed: {0}")]
    Encoding(#[from] image::ImageError),
}

impl PipelineError {
    pub fn invalid_image(index: usize, err: image::ImageError) -> Self {
        Self::InvalidImage {
            index,
            reason: err.to_string(),
        }
    }
}
