// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end pipeline scenarios

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{DynamicImage, GrayImage, Luma};
use roomplan_vision::{
    generate_blueprint, BlueprintRequest, FeatureCounts, LengthUnit, Measurement, PipelineError,
};

fn png_bytes(img: GrayImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageLuma8(img)
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("PNG encode");
    bytes
}

/// A rectangular room corner: two strong wall edges meeting at a right
/// angle, shifted by `offset` pixels to mimic a different camera angle
fn corner_photo(offset: u32) -> Vec<u8> {
    let mut img = GrayImage::from_pixel(320, 320, Luma([210]));
    let vx = 150 + offset;
    let hy = 210 + offset;
    for y in 15..305 {
        for x in vx..vx + 5 {
            img.put_pixel(x, y, Luma([25]));
        }
    }
    for x in 15..305 {
        for y in hy..hy + 5 {
            img.put_pixel(x, y, Luma([25]));
        }
    }
    png_bytes(img)
}

fn feet(wall_length: f64, ceiling_height: f64) -> Measurement {
    Measurement {
        wall_length,
        ceiling_height,
        unit: LengthUnit::Feet,
        room_type: "Living Room".to_string(),
        notes: None,
    }
}

fn decode_data_uri(uri: &str) -> Vec<u8> {
    let b64 = uri
        .strip_prefix("data:image/png;base64,")
        .expect("data URI prefix");
    BASE64.decode(b64).expect("valid base64 payload")
}

#[test]
fn scenario_a_clear_corner_photo() {
    let request = BlueprintRequest {
        images: vec![corner_photo(0)],
        measurement: feet(10.0, 8.0),
    };

    let response = generate_blueprint(&request).expect("pipeline succeeds");

    assert!(response.feature_counts.walls >= 2);
    assert!(response.processing_time_seconds > 0.0);

    let png = decode_data_uri(&response.blueprint_image);
    assert_eq!(&png[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
}

#[test]
fn scenario_b_black_image_fallback() {
    let request = BlueprintRequest {
        images: vec![png_bytes(GrayImage::from_pixel(256, 256, Luma([0])))],
        measurement: feet(12.0, 9.0),
    };

    let response = generate_blueprint(&request).expect("degenerate input still succeeds");

    assert_eq!(response.feature_counts, FeatureCounts::default());
    assert!(response.low_confidence, "fallback path must be flagged");

    // The fallback rectangle decodes to a real image
    let png = decode_data_uri(&response.blueprint_image);
    let rendered = image::load_from_memory(&png).expect("decodable blueprint");
    assert!(rendered.width() > 0);
}

#[test]
fn scenario_c_negative_wall_length_fails_fast() {
    let request = BlueprintRequest {
        // Intentionally undecodable: validation must reject the request
        // before any image is touched
        images: vec![b"\xff\xfe not an image".to_vec()],
        measurement: feet(-5.0, 8.0),
    };

    match generate_blueprint(&request) {
        Err(PipelineError::InvalidMeasurement(msg)) => {
            assert!(msg.contains("wallLength"));
        }
        other => panic!("expected InvalidMeasurement, got {other:?}"),
    }
}

#[test]
fn scenario_d_same_wall_from_three_angles() {
    let single = BlueprintRequest {
        images: vec![corner_photo(0)],
        measurement: feet(10.0, 8.0),
    };
    let multi = BlueprintRequest {
        images: vec![corner_photo(0), corner_photo(2), corner_photo(4)],
        measurement: feet(10.0, 8.0),
    };

    let single_response = generate_blueprint(&single).expect("single photo");
    let multi_response = generate_blueprint(&multi).expect("three photos");

    assert_eq!(
        multi_response.feature_counts.walls, single_response.feature_counts.walls,
        "near-identical walls across photos must be deduplicated"
    );
}

#[test]
fn boundary_one_and_five_images_accepted() {
    for count in [1usize, 5] {
        let request = BlueprintRequest {
            images: vec![png_bytes(GrayImage::from_pixel(64, 64, Luma([128]))); count],
            measurement: feet(10.0, 8.0),
        };
        assert!(
            generate_blueprint(&request).is_ok(),
            "{count} images should be accepted"
        );
    }
}

#[test]
fn boundary_zero_and_six_images_rejected() {
    for count in [0usize, 6] {
        let request = BlueprintRequest {
            images: vec![png_bytes(GrayImage::from_pixel(64, 64, Luma([128]))); count],
            measurement: feet(10.0, 8.0),
        };
        match generate_blueprint(&request) {
            Err(PipelineError::ImageCount(n)) => assert_eq!(n, count),
            other => panic!("expected ImageCount for {count} images, got {other:?}"),
        }
    }
}

#[test]
fn pipeline_output_is_byte_identical_across_runs() {
    let request = BlueprintRequest {
        images: vec![corner_photo(0), corner_photo(3)],
        measurement: feet(10.0, 8.0),
    };

    let a = generate_blueprint(&request).expect("first run");
    let b = generate_blueprint(&request).expect("second run");

    assert_eq!(a.blueprint_image, b.blueprint_image);
    assert_eq!(a.feature_counts, b.feature_counts);
    assert_eq!(a.low_confidence, b.low_confidence);
}

#[test]
fn response_serializes_with_wire_names() {
    let request = BlueprintRequest {
        images: vec![corner_photo(0)],
        measurement: feet(10.0, 8.0),
    };

    let response = generate_blueprint(&request).expect("pipeline succeeds");
    let value = serde_json::to_value(&response).expect("serializable response");

    for key in [
        "blueprintImage",
        "measurementsEcho",
        "processingTimeSeconds",
        "featureCounts",
        "lowConfidence",
    ] {
        assert!(value.get(key).is_some(), "missing wire field {key}");
    }
    assert_eq!(value["measurementsEcho"]["unit"], "feet");
}
