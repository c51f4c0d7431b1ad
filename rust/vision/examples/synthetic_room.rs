// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Walkthrough of the blueprint pipeline on a synthetic room photo
//!
//! Run with: cargo run -p roomplan-vision --example synthetic_room

use image::{DynamicImage, GrayImage, Luma};
use roomplan_vision::{
    generate_blueprint, BlueprintRequest, LengthUnit, Measurement,
};

fn main() {
    println!("=== Room Blueprint Pipeline Walkthrough ===\n");

    println!("Step 1: Build a synthetic room photo...");
    let photo = create_synthetic_room();
    println!("  Image size: {}x{}", photo.width(), photo.height());

    let mut bytes = Vec::new();
    DynamicImage::ImageLuma8(photo)
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("PNG encoding of the synthetic image");
    println!("  Encoded {} bytes\n", bytes.len());

    println!("Step 2: Run the pipeline...");
    let request = BlueprintRequest {
        images: vec![bytes],
        measurement: Measurement {
            wall_length: 10.0,
            ceiling_height: 8.0,
            unit: LengthUnit::Feet,
            room_type: "Living Room".to_string(),
            notes: Some("synthetic walkthrough".to_string()),
        },
    };

    match generate_blueprint(&request) {
        Ok(response) => {
            let counts = response.feature_counts;
            println!("  Walls detected:   {}", counts.walls);
            println!("  Corners detected: {}", counts.corners);
            println!("  Doors detected:   {}", counts.doors);
            println!("  Windows detected: {}", counts.windows);
            println!("  Low confidence:   {}", response.low_confidence);
            println!("  Elapsed: {:.3}s", response.processing_time_seconds);
            println!(
                "  Blueprint data URI: {} characters",
                response.blueprint_image.len()
            );
            println!("\n=== Pipeline walkthrough complete ===");
        }
        Err(err) => {
            eprintln!("  Pipeline failed: {err}");
        }
    }
}

/// A bright room with two dark wall edges meeting in a corner and a
/// brighter gap in one wall (an opening candidate)
fn create_synthetic_room() -> GrayImage {
    let mut img = GrayImage::from_pixel(400, 400, Luma([215]));

    // Vertical wall edge
    for y in 20..380 {
        for x in 196..201 {
            img.put_pixel(x, y, Luma([30]));
        }
    }

    // Horizontal floor line with a bright gap in the middle
    for x in 20..380 {
        if (170..230).contains(&x) {
            continue;
        }
        for y in 276..281 {
            img.put_pixel(x, y, Luma([30]));
        }
    }

    img
}
