//! Minimap marker list handed to the UI layer.
//!
//! Each marker is a loaded, placed node projected through the floor's
//! calibration and clamped into the renderable range. The node under edit
//! uses its working values instead of its committed ones.

#[cfg(test)]
#[path = "markers_test.rs"]
mod markers_test;

use crate::consts::{DEGREES_PER_RADIAN, MARKER_ROTATION_OFFSET};
use crate::coords::{self, Point};
use crate::editor::EditSession;
use crate::node::{Calibration, Node, TilesId};

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub tiles_id: TilesId,
    /// Percent position, clamped.
    pub x: f64,
    pub y: f64,
    /// CSS-style `rotate(<n>rad)`; empty when rotation is disabled.
    pub transform: String,
    /// Node's initial yaw in degrees, two decimals, for the heading indicator.
    pub yaw_indicator_deg: f64,
    pub selected: bool,
    pub current: bool,
    pub enlarged: bool,
    pub has_info: bool,
}

/// Inputs the marker projection depends on besides the nodes.
#[derive(Debug, Clone, Copy)]
pub struct MarkerContext<'a> {
    pub calibration: &'a Calibration,
    pub current: Option<&'a str>,
    /// Live camera yaw (radians).
    pub current_rotation: f64,
    /// Site-wide rotation offset (radians).
    pub rotation_offset: f64,
    pub rotation_enabled: bool,
    pub enlarged: bool,
    pub editing: Option<&'a EditSession>,
}

/// Project `nodes` onto the minimap. Empty when the calibration is unusable.
#[must_use]
pub fn build_markers<'n>(nodes: impl IntoIterator<Item = &'n Node>, ctx: &MarkerContext<'_>) -> Vec<Marker> {
    if !ctx.calibration.is_usable() {
        return Vec::new();
    }
    nodes
        .into_iter()
        .filter_map(|node| {
            let placement = node.placement?;
            let session = ctx.editing.filter(|s| s.tiles_id == node.tiles_id);
            let position = match session {
                Some(s) => Point::new(
                    coords::clamp_to_renderable_range(s.working.x),
                    coords::clamp_to_renderable_range(s.working.y),
                ),
                None => coords::marker_position(ctx.calibration, &placement),
            };
            let transform = match session {
                Some(s) => selected_transform(ctx, s.working.rotation_deg),
                None => rotation_transform(ctx, placement.rotation),
            };
            Some(Marker {
                tiles_id: node.tiles_id.clone(),
                x: position.x,
                y: position.y,
                transform,
                yaw_indicator_deg: coords::yaw_rad_to_deg(node.initial_view().yaw),
                selected: session.is_some(),
                current: ctx.current == Some(node.tiles_id.as_str()),
                enlarged: ctx.enlarged,
                has_info: !node.info_hotspots().is_empty(),
            })
        })
        .collect()
}

/// Marker rotation for a committed node.
#[must_use]
pub fn rotation_transform(ctx: &MarkerContext<'_>, node_rotation: f64) -> String {
    if !ctx.rotation_enabled {
        return String::new();
    }
    let sum: f64 = [ctx.current_rotation, ctx.rotation_offset, node_rotation, MARKER_ROTATION_OFFSET]
        .into_iter()
        .map(|v| if v.is_nan() { 0.0 } else { v })
        .sum();
    format!("rotate({sum}rad)")
}

/// Marker rotation for the node under edit: live yaw plus the working degrees.
#[must_use]
pub fn selected_transform(ctx: &MarkerContext<'_>, working_deg: f64) -> String {
    if !ctx.rotation_enabled {
        return String::new();
    }
    let angle = ctx.current_rotation + MARKER_ROTATION_OFFSET + ctx.rotation_offset + working_deg / DEGREES_PER_RADIAN;
    format!("rotate({angle}rad)")
}
