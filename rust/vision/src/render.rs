// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Blueprint rasterization
//!
//! Scales the consolidated feature set onto a square canvas, draws walls,
//! door/window markers and corroborated corners, annotates the caller's
//! measurements, and serializes the result as a PNG data URI.

use crate::error::PipelineError;
use crate::types::{
    FeatureGeometry, FeatureKind, LengthUnit, Measurement, Point2D, RenderConfig, RoomFeatureSet,
    ScaleRatio,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_rect_mut, draw_hollow_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut,
};
use imageproc::rect::Rect;
use std::io::Cursor;
use tracing::error;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const GRID: Rgb<u8> = Rgb([225, 230, 236]);
const WALL: Rgb<u8> = Rgb([33, 37, 41]);
const CORNER: Rgb<u8> = Rgb([120, 130, 140]);
const DOOR: Rgb<u8> = Rgb([139, 69, 19]);
const WINDOW: Rgb<u8> = Rgb([70, 130, 180]);
const ANNOTATION: Rgb<u8> = Rgb([60, 64, 70]);

/// Final rendered blueprint
#[derive(Debug, Clone)]
pub struct Blueprint {
    pub image: RgbImage,
    /// Human-readable measurement annotation, e.g. `"12 feet"`
    pub annotation: String,
}

impl Blueprint {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Serialize the canvas as PNG bytes.
    ///
    /// The only failure mode of the rendering stage; treated as an
    /// internal bug and logged with context.
    pub fn encode_png(&self) -> Result<Vec<u8>, PipelineError> {
        let mut bytes = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|err| {
                error!(
                    width = self.width(),
                    height = self.height(),
                    %err,
                    "blueprint PNG encoding failed"
                );
                PipelineError::Encoding(err)
            })?;
        Ok(bytes)
    }

    /// Encode as an embeddable `data:image/png;base64,...` URI
    pub fn to_data_uri(&self) -> Result<String, PipelineError> {
        Ok(format!(
            "data:image/png;base64,{}",
            BASE64.encode(self.encode_png()?)
        ))
    }
}

/// Maps detected pixel coordinates into the canvas drawing area
struct CanvasTransform {
    scale: f64,
    offset_x: f64,
    offset_y: f64,
}

impl CanvasTransform {
    fn apply(&self, p: &Point2D) -> (f32, f32) {
        (
            (p.x * self.scale + self.offset_x) as f32,
            (p.y * self.scale + self.offset_y) as f32,
        )
    }
}

/// Render the blueprint for a consolidated feature set.
///
/// Never fails: an empty feature set produces the fallback rectangular
/// outline so the caller always receives a usable image.
pub fn render(
    features: &RoomFeatureSet,
    scale: &ScaleRatio,
    measurement: &Measurement,
    config: &RenderConfig,
) -> Blueprint {
    let size = config.canvas_size.max(200);
    let mut canvas = RgbImage::from_pixel(size, size, BACKGROUND);

    draw_grid(&mut canvas, config.grid_spacing);

    // `unit_px` is the canvas length of one measurement unit, for the
    // scale bar
    let (content, unit_px) = if features.longest_wall().is_some() {
        let (content, fit_scale) = draw_features(&mut canvas, features, config);
        (content, fit_scale * scale.pixels_per_unit)
    } else {
        draw_fallback_outline(&mut canvas, measurement.wall_length, config)
    };

    let annotation = format!("{} {}", format_length(measurement.wall_length), measurement.unit);
    annotate(&mut canvas, measurement, scale, &annotation, content, unit_px, config);

    Blueprint {
        image: canvas,
        annotation,
    }
}

/// Light background grid, matching drafting-paper style output
fn draw_grid(canvas: &mut RgbImage, spacing: u32) {
    if spacing == 0 {
        return;
    }
    let (width, height) = canvas.dimensions();
    let mut x = spacing;
    while x < width {
        draw_line_segment_mut(canvas, (x as f32, 0.0), (x as f32, height as f32), GRID);
        x += spacing;
    }
    let mut y = spacing;
    while y < height {
        draw_line_segment_mut(canvas, (0.0, y as f32), (width as f32, y as f32), GRID);
        y += spacing;
    }
}

/// Draw all classified features, returning the occupied canvas rectangle
/// (x0, y0, x1, y1) and the pixel-to-canvas fit factor
fn draw_features(
    canvas: &mut RgbImage,
    features: &RoomFeatureSet,
    config: &RenderConfig,
) -> ((f64, f64, f64, f64), f64) {
    let transform = fit_transform(features, canvas.width(), config.margin);

    for feature in features.of_kind(FeatureKind::Wall) {
        if let FeatureGeometry::Line(line) = &feature.geometry {
            let start = transform.apply(&line.start);
            let end = transform.apply(&line.end);
            draw_thick_line(canvas, start, end, config.wall_stroke, WALL);
        }
    }

    for feature in features.of_kind(FeatureKind::Corner) {
        let (x, y) = transform.apply(&feature.geometry.anchor());
        draw_hollow_circle_mut(canvas, (x as i32, y as i32), 4, CORNER);
    }

    for feature in features.of_kind(FeatureKind::Door).take(config.max_door_markers) {
        let (x, y) = transform.apply(&feature.geometry.anchor());
        draw_marker(canvas, x as i32, y as i32, 'D', DOOR);
    }

    for feature in features
        .of_kind(FeatureKind::Window)
        .take(config.max_window_markers)
    {
        let (x, y) = transform.apply(&feature.geometry.anchor());
        draw_marker(canvas, x as i32, y as i32, 'W', WINDOW);
    }

    let bounds = content_bounds(features, &transform, canvas.width());
    (bounds, transform.scale)
}

/// Placeholder outline for featureless input: a square room whose side
/// stands for the measured wall length, so the caller always receives a
/// usable drawing
fn draw_fallback_outline(
    canvas: &mut RgbImage,
    wall_length: f64,
    config: &RenderConfig,
) -> ((f64, f64, f64, f64), f64) {
    let size = canvas.width();
    let margin = config.margin.min(size / 4);
    let inner = size - 2 * margin;
    let side = (inner as f64 * 0.75) as u32;
    let origin = margin + (inner - side) / 2;

    let rect = Rect::at(origin as i32, origin as i32).of_size(side, side);
    draw_hollow_rect_mut(canvas, rect, WALL);
    let rect = Rect::at(origin as i32 + 1, origin as i32 + 1).of_size(side - 2, side - 2);
    draw_hollow_rect_mut(canvas, rect, WALL);

    let bounds = (
        origin as f64,
        origin as f64,
        (origin + side) as f64,
        (origin + side) as f64,
    );
    (bounds, side as f64 / wall_length)
}

/// Compute the aspect-preserving fit of the detected geometry into the
/// canvas drawing area
fn fit_transform(features: &RoomFeatureSet, canvas_size: u32, margin: u32) -> CanvasTransform {
    let mut min_x = f64::MAX;
    let mut min_y = f64::MAX;
    let mut max_x = f64::MIN;
    let mut max_y = f64::MIN;

    for feature in &features.features {
        let points: Vec<Point2D> = match &feature.geometry {
            FeatureGeometry::Line(line) => vec![line.start, line.end],
            FeatureGeometry::Point(p) => vec![*p],
        };
        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
    }

    let span_x = (max_x - min_x).max(1.0);
    let span_y = (max_y - min_y).max(1.0);
    let inner = (canvas_size - 2 * margin.min(canvas_size / 4)) as f64;
    let scale = (inner / span_x).min(inner / span_y);

    // Center the drawing inside the canvas
    let offset_x = (canvas_size as f64 - span_x * scale) / 2.0 - min_x * scale;
    let offset_y = (canvas_size as f64 - span_y * scale) / 2.0 - min_y * scale;

    CanvasTransform {
        scale,
        offset_x,
        offset_y,
    }
}

/// Canvas-space bounds of the drawn content, clamped to the canvas
fn content_bounds(
    features: &RoomFeatureSet,
    transform: &CanvasTransform,
    canvas_size: u32,
) -> (f64, f64, f64, f64) {
    let mut x0 = f64::MAX;
    let mut y0 = f64::MAX;
    let mut x1 = f64::MIN;
    let mut y1 = f64::MIN;

    for feature in &features.features {
        let points: Vec<Point2D> = match &feature.geometry {
            FeatureGeometry::Line(line) => vec![line.start, line.end],
            FeatureGeometry::Point(p) => vec![*p],
        };
        for p in points {
            let (x, y) = transform.apply(&p);
            x0 = x0.min(x as f64);
            y0 = y0.min(y as f64);
            x1 = x1.max(x as f64);
            y1 = y1.max(y as f64);
        }
    }

    let limit = canvas_size as f64;
    (
        x0.clamp(0.0, limit),
        y0.clamp(0.0, limit),
        x1.clamp(0.0, limit),
        y1.clamp(0.0, limit),
    )
}

/// Stroke a line with the given half-thickness by drawing parallel
/// offsets perpendicular to its direction
fn draw_thick_line(
    canvas: &mut RgbImage,
    start: (f32, f32),
    end: (f32, f32),
    half_stroke: u32,
    color: Rgb<u8>,
) {
    let dx = end.0 - start.0;
    let dy = end.1 - start.1;
    let len = (dx * dx + dy * dy).sqrt();
    if len < 1e-6 {
        return;
    }
    let (px, py) = (-dy / len, dx / len);

    let half = half_stroke as i32;
    for offset in -half..=half {
        let ox = px * offset as f32;
        let oy = py * offset as f32;
        draw_line_segment_mut(
            canvas,
            (start.0 + ox, start.1 + oy),
            (end.0 + ox, end.1 + oy),
            color,
        );
    }
}

/// Filled marker square with a letter label above it
fn draw_marker(canvas: &mut RgbImage, x: i32, y: i32, label: char, color: Rgb<u8>) {
    let size = 14u32;
    let rect = Rect::at(x - size as i32 / 2, y - size as i32 / 2).of_size(size, size);
    draw_filled_rect_mut(canvas, rect, color);
    draw_text(
        canvas,
        &label.to_string(),
        x - 5,
        y - size as i32 / 2 - 18,
        2,
        color,
    );
}

/// Title, measurement dimension line, scale bar, and ceiling height note
fn annotate(
    canvas: &mut RgbImage,
    measurement: &Measurement,
    scale: &ScaleRatio,
    annotation: &str,
    content: (f64, f64, f64, f64),
    unit_px: f64,
    config: &RenderConfig,
) {
    let size = canvas.width() as i32;
    let margin = config.margin as i32;

    let title = format!("{} BLUEPRINT", measurement.room_type.to_uppercase());
    let title_x = (size - text_width(&title, 2)) / 2;
    draw_text(canvas, &title, title_x.max(4), 14, 2, ANNOTATION);

    // Dimension line under the drawing with end ticks
    let (x0, _, x1, y1) = content;
    let line_y = ((y1 as i32) + 24).min(size - margin / 2);
    draw_line_segment_mut(
        canvas,
        (x0 as f32, line_y as f32),
        (x1 as f32, line_y as f32),
        ANNOTATION,
    );
    for x in [x0 as f32, x1 as f32] {
        draw_line_segment_mut(canvas, (x, line_y as f32 - 5.0), (x, line_y as f32 + 5.0), ANNOTATION);
    }

    let label = annotation.to_uppercase();
    let label_x = ((x0 + x1) as i32 / 2) - text_width(&label, 2) / 2;
    draw_text(canvas, &label, label_x.max(4), line_y + 8, 2, ANNOTATION);

    let ceiling = format!(
        "CEILING HEIGHT {} {}",
        format_length(measurement.ceiling_height),
        measurement.unit
    )
    .to_uppercase();
    draw_text(canvas, &ceiling, 8, size - 22, 1, ANNOTATION);

    if scale.fallback {
        draw_text(canvas, "ESTIMATED SCALE", 8, size - 36, 1, ANNOTATION);
    }

    // Scale bar: one measurement unit at drawing scale, bottom right
    let bar = unit_px;
    if bar.is_finite() && bar >= 4.0 && bar <= (size - 2 * margin) as f64 {
        let y = (size - 22) as f32;
        let x1 = (size - margin) as f32;
        let x0 = x1 - bar as f32;
        draw_line_segment_mut(canvas, (x0, y), (x1, y), ANNOTATION);
        for x in [x0, x1] {
            draw_line_segment_mut(canvas, (x, y - 4.0), (x, y + 4.0), ANNOTATION);
        }
        let unit_label = match scale.unit {
            LengthUnit::Meters => "1 M",
            LengthUnit::Feet => "1 FT",
        };
        draw_text(canvas, unit_label, x0 as i32, y as i32 - 14, 1, ANNOTATION);
    }
}

/// Render whole-number lengths without a trailing `.0`
fn format_length(value: f64) -> String {
    if (value - value.round()).abs() < 1e-9 {
        format!("{}", value.round() as i64)
    } else {
        format!("{value:.1}")
    }
}

// -- Minimal 5x7 glyph face --------------------------------------------------
//
// The annotations need a dozen characters at most; this avoids carrying a
// font file for them. Unknown characters advance without drawing.

fn draw_text(canvas: &mut RgbImage, text: &str, x: i32, y: i32, scale: u32, color: Rgb<u8>) {
    let mut cursor_x = x;
    for ch in text.chars() {
        if let Some(rows) = glyph(ch.to_ascii_uppercase()) {
            for (row, bits) in rows.iter().enumerate() {
                for col in 0..5 {
                    if bits & (0b10000 >> col) != 0 {
                        let gx = cursor_x + (col * scale as i32);
                        let gy = y + (row as i32 * scale as i32);
                        if gx >= 0 && gy >= 0 {
                            let rect = Rect::at(gx, gy).of_size(scale, scale);
                            draw_filled_rect_mut(canvas, rect, color);
                        }
                    }
                }
            }
        }
        cursor_x += 6 * scale as i32;
    }
}

fn text_width(text: &str, scale: u32) -> i32 {
    text.chars().count() as i32 * 6 * scale as i32
}

#[rustfmt::skip]
fn glyph(ch: char) -> Option<[u8; 7]> {
    let rows = match ch {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        '.' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b01100],
        '-' => [0b00000, 0b00000, 0b00000, 0b01110, 0b00000, 0b00000, 0b00000],
        ':' => [0b00000, 0b01100, 0b01100, 0b00000, 0b01100, 0b01100, 0b00000],
        ' ' => [0b00000; 7],
        _ => return None,
    };
    Some(rows)
}
