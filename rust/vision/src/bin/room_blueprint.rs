// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CLI tool: Generate a 2D room blueprint from photographs
//!
//! Usage:
//!   room-blueprint <image_path>... [options]

use roomplan_vision::{
    generate_blueprint, BlueprintRequest, LengthUnit, Measurement, MAX_IMAGES,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::env;
use std::fs;
use std::process::ExitCode;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return ExitCode::SUCCESS;
    }

    let mut image_paths: Vec<String> = Vec::new();
    let mut wall_length: f64 = 4.0;
    let mut ceiling_height: f64 = 2.4;
    let mut unit = LengthUnit::Meters;
    let mut room_type = String::from("Room");
    let mut output_path = String::from("blueprint.png");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--wall-length" => {
                i += 1;
                wall_length = match args.get(i).and_then(|v| v.parse().ok()) {
                    Some(v) => v,
                    None => return fail("invalid --wall-length value"),
                };
            }
            "--ceiling-height" => {
                i += 1;
                ceiling_height = match args.get(i).and_then(|v| v.parse().ok()) {
                    Some(v) => v,
                    None => return fail("invalid --ceiling-height value"),
                };
            }
            "--unit" => {
                i += 1;
                unit = match args.get(i).map(String::as_str) {
                    Some("meters") => LengthUnit::Meters,
                    Some("feet") => LengthUnit::Feet,
                    _ => return fail("unit must be 'meters' or 'feet'"),
                };
            }
            "--room-type" => {
                i += 1;
                match args.get(i) {
                    Some(v) => room_type = v.clone(),
                    None => return fail("missing --room-type value"),
                }
            }
            "--output" => {
                i += 1;
                match args.get(i) {
                    Some(v) => output_path = v.clone(),
                    None => return fail("missing --output value"),
                }
            }
            path => image_paths.push(path.to_string()),
        }
        i += 1;
    }

    if image_paths.is_empty() || image_paths.len() > MAX_IMAGES {
        return fail(&format!(
            "supply between 1 and {MAX_IMAGES} image paths, got {}",
            image_paths.len()
        ));
    }

    let mut images = Vec::with_capacity(image_paths.len());
    for path in &image_paths {
        match fs::read(path) {
            Ok(bytes) => images.push(bytes),
            Err(err) => return fail(&format!("cannot read {path}: {err}")),
        }
    }

    let request = BlueprintRequest {
        images,
        measurement: Measurement {
            wall_length,
            ceiling_height,
            unit,
            room_type,
            notes: None,
        },
    };

    let response = match generate_blueprint(&request) {
        Ok(response) => response,
        Err(err) => return fail(&err.to_string()),
    };

    // Write the PNG next to a JSON summary on stdout
    let png = match response
        .blueprint_image
        .strip_prefix("data:image/png;base64,")
        .map(|b64| BASE64.decode(b64))
    {
        Some(Ok(bytes)) => bytes,
        _ => return fail("unexpected blueprint encoding"),
    };
    if let Err(err) = fs::write(&output_path, png) {
        return fail(&format!("cannot write {output_path}: {err}"));
    }

    let summary = serde_json::json!({
        "output": output_path,
        "featureCounts": response.feature_counts,
        "processingTimeSeconds": response.processing_time_seconds,
        "lowConfidence": response.low_confidence,
        "measurementsEcho": response.measurements_echo,
    });
    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("{json}"),
        Err(err) => return fail(&format!("cannot serialize summary: {err}")),
    }

    ExitCode::SUCCESS
}

fn fail(message: &str) -> ExitCode {
    eprintln!("error: {message}");
    ExitCode::FAILURE
}

fn print_usage() {
    println!("Generate a 2D room blueprint from photographs");
    println!();
    println!("Usage:");
    println!("  room-blueprint <image_path>... [options]");
    println!();
    println!("Options:");
    println!("  --wall-length <n>     Measured wall length (default: 4.0)");
    println!("  --ceiling-height <n>  Measured ceiling height (default: 2.4)");
    println!("  --unit <u>            'meters' or 'feet' (default: meters)");
    println!("  --room-type <name>    Room label for the title (default: Room)");
    println!("  --output <path>       Output PNG path (default: blueprint.png)");
}
