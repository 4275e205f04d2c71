//! Coordinate transforms between survey pixels and minimap percentages.
//!
//! Pure functions only. Survey nodes are captured in a raw pixel space that
//! is unrelated to the uploaded floor-plan image; each floor's
//! [`Calibration`] supplies the offset, scale, image size, and axis-flip flag
//! that place those pixels onto the image as percentages. Rotation helpers
//! keep every stored angle inside one canonical turn.

#[cfg(test)]
#[path = "coords_test.rs"]
mod coords_test;

use std::f64::consts::{PI, TAU};

use crate::consts::{DEGREES_PER_RADIAN, DEGREES_PER_TURN, LOWER_BOUND, NODE_OFFSET, PERCENTAGE, UPPER_BOUND};
use crate::node::{Calibration, Placement};

/// A point in either raw survey pixel space or minimap percent space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to `other`.
    #[must_use]
    pub fn distance_sq(&self, other: Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// Map one raw coordinate to a percentage of the image dimension.
///
/// With `flipped` set the other axis's raw coordinate feeds this output axis.
#[must_use]
pub fn to_percent(raw: f64, other_raw: f64, flipped: bool, pixel_offset: f64, scale: f64, image_dimension: f64) -> f64 {
    let source = if flipped { other_raw } else { raw };
    scale * (source + pixel_offset) * PERCENTAGE / image_dimension
}

/// Inverse of [`to_percent`] for one unflipped axis: undo the scale, then the offset.
#[must_use]
pub fn to_raw(image_dimension: f64, percent: f64, pixel_offset: f64, scale: f64) -> f64 {
    image_dimension * percent / (PERCENTAGE * scale) - pixel_offset
}

/// Keep a marker inside the image and off its very edge.
#[must_use]
pub fn clamp_to_renderable_range(percent: f64) -> f64 {
    if percent > UPPER_BOUND {
        UPPER_BOUND - NODE_OFFSET
    } else if percent < LOWER_BOUND {
        NODE_OFFSET
    } else {
        percent
    }
}

/// Percent position of a placed node under `calibration`, unclamped.
#[must_use]
pub fn percent_position(calibration: &Calibration, placement: &Placement) -> Point {
    let flipped = calibration.xy_flipped;
    Point {
        x: to_percent(
            placement.x,
            placement.y,
            flipped,
            calibration.x_pixel_offset,
            calibration.x_scale,
            calibration.img_width,
        ),
        y: to_percent(
            placement.y,
            placement.x,
            flipped,
            calibration.y_pixel_offset,
            calibration.y_scale,
            calibration.img_height,
        ),
    }
}

/// Percent position clamped into the renderable range.
#[must_use]
pub fn marker_position(calibration: &Calibration, placement: &Placement) -> Point {
    let p = percent_position(calibration, placement);
    Point { x: clamp_to_renderable_range(p.x), y: clamp_to_renderable_range(p.y) }
}

/// Raw survey pixel position for a percent position under `calibration`.
///
/// Inverse of [`percent_position`], including the axis flip.
#[must_use]
pub fn raw_position(calibration: &Calibration, percent: Point) -> Point {
    let from_x = to_raw(calibration.img_width, percent.x, calibration.x_pixel_offset, calibration.x_scale);
    let from_y = to_raw(calibration.img_height, percent.y, calibration.y_pixel_offset, calibration.y_scale);
    if calibration.xy_flipped { Point { x: from_y, y: from_x } } else { Point { x: from_x, y: from_y } }
}

/// Degrees to radians, normalized into `[0, 2π)`.
#[must_use]
pub fn degrees_to_radians(degrees: f64) -> f64 {
    let turned = degrees.rem_euclid(DEGREES_PER_TURN) * PI / 180.0;
    if turned >= TAU { 0.0 } else { turned }
}

/// Radians to degrees, normalized into `[0, 360)`.
#[must_use]
pub fn radians_to_degrees(radians: f64) -> f64 {
    let degrees = radians.rem_euclid(TAU) * 180.0 / PI;
    if degrees >= DEGREES_PER_TURN { 0.0 } else { degrees }
}

/// Stored marker rotation (radians) as the editor's whole-degree working value.
#[must_use]
pub fn working_degrees(radians: f64) -> f64 {
    (radians * DEGREES_PER_RADIAN).round().rem_euclid(DEGREES_PER_TURN)
}

/// Yaw in degrees, rounded to two decimals for display.
#[must_use]
pub fn yaw_rad_to_deg(radians: f64) -> f64 {
    (radians * 180.0 / PI * 100.0).round() / 100.0
}
