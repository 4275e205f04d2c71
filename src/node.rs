//! Node model: one normalized entity per captured panorama position.
//!
//! A node is addressed by its `tiles_id` and carries two optional facets:
//! the scene facet (cube-map geometry, initial view, hotspots) consumed by the
//! scene graph, and the placement facet (floor-plan pixel position and
//! rotation) consumed by the minimap. The API delivers both halves in one
//! record per node; [`crate::api`] folds them into this shape so the two can
//! never drift apart in memory.

#[cfg(test)]
#[path = "node_test.rs"]
mod node_test;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Stable identifier of a node (`tiles_id` on the wire).
pub type TilesId = String;

/// Camera orientation for a panorama view. All angles are radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ViewParams {
    pub yaw: f64,
    pub pitch: f64,
    pub fov: f64,
}

impl ViewParams {
    #[must_use]
    pub fn new(yaw: f64, pitch: f64, fov: f64) -> Self {
        Self { yaw, pitch, fov }
    }

    /// True when every component is exactly zero (no remembered view).
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_unset(&self) -> bool {
        self.yaw == 0.0 && self.pitch == 0.0 && self.fov == 0.0
    }

    /// Same field of view, pointed at a new yaw/pitch.
    #[must_use]
    pub fn looking_at(&self, yaw: f64, pitch: f64) -> Self {
        Self { yaw, pitch, fov: self.fov }
    }
}

/// One level of the cube-map tile pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Level {
    #[serde(rename = "tileSize")]
    pub tile_size: u32,
    pub size: u32,
    #[serde(rename = "fallbackOnly", default)]
    pub fallback_only: bool,
}

/// A hotspot that navigates to another node when activated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkHotspot {
    pub yaw: f64,
    pub pitch: f64,
    #[serde(default)]
    pub rotation: f64,
    /// `tiles_id` of the destination node.
    pub target: TilesId,
}

/// A hotspot that opens descriptive content for a point of interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoHotspot {
    pub yaw: f64,
    pub pitch: f64,
    #[serde(default)]
    pub title: String,
    /// Opaque content key forwarded to the info panel.
    pub info_id: String,
}

/// Scene facet: everything the panorama renderer needs to build a scene.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SceneFacet {
    pub levels: Vec<Level>,
    #[serde(default)]
    pub face_size: u32,
    #[serde(default)]
    pub survey_name: String,
    #[serde(default)]
    pub initial_parameters: ViewParams,
    #[serde(default)]
    pub link_hotspots: Vec<LinkHotspot>,
    #[serde(default)]
    pub info_hotspots: Vec<InfoHotspot>,
    /// Base URL of the tile store; the node's `tiles_id` is appended to it.
    #[serde(default)]
    pub manta_link: String,
}

/// Placement facet: where the node sits on its floor plan.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Placement {
    pub floor: i32,
    /// Raw pixel x relative to the uncalibrated survey image.
    pub x: f64,
    /// Raw pixel y relative to the uncalibrated survey image.
    pub y: f64,
    /// Marker counter-rotation in radians.
    #[serde(default)]
    pub rotation: f64,
}

/// A panorama node with its optional scene and placement facets.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub tiles_id: TilesId,
    /// Display name (`tiles_name`).
    pub name: String,
    /// Owning site identifier.
    pub site: String,
    pub scene: Option<SceneFacet>,
    pub placement: Option<Placement>,
}

impl Node {
    /// Info hotspots of the scene facet, or an empty slice.
    #[must_use]
    pub fn info_hotspots(&self) -> &[InfoHotspot] {
        self.scene.as_ref().map_or(&[], |s| s.info_hotspots.as_slice())
    }

    /// Link hotspots of the scene facet, or an empty slice.
    #[must_use]
    pub fn link_hotspots(&self) -> &[LinkHotspot] {
        self.scene.as_ref().map_or(&[], |s| s.link_hotspots.as_slice())
    }

    /// Initial view of the scene facet; zeroed when the facet is absent.
    #[must_use]
    pub fn initial_view(&self) -> ViewParams {
        self.scene.as_ref().map(|s| s.initial_parameters).unwrap_or_default()
    }

    /// Floor of the placement facet, if placed.
    #[must_use]
    pub fn floor(&self) -> Option<i32> {
        self.placement.map(|p| p.floor)
    }
}

/// Per-floor minimap calibration: maps raw survey pixels onto the floor-plan image.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Calibration {
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub image_large_url: String,
    #[serde(default)]
    pub floor: i32,
    #[serde(default)]
    pub floor_name: String,
    #[serde(default)]
    pub floor_tag: String,
    #[serde(default)]
    pub x_pixel_offset: f64,
    #[serde(default)]
    pub y_pixel_offset: f64,
    #[serde(default)]
    pub x_scale: f64,
    #[serde(default)]
    pub y_scale: f64,
    #[serde(default)]
    pub img_width: f64,
    #[serde(default)]
    pub img_height: f64,
    /// Survey pixel axes are transposed relative to the floor-plan image.
    #[serde(default)]
    pub xy_flipped: bool,
}

impl Calibration {
    /// An image has been uploaded and the transform parameters are usable.
    ///
    /// The API answers with an empty record when no minimap exists for a
    /// floor; that is a normal state, not an error.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !self.image_url.is_empty()
            && self.x_scale != 0.0
            && self.y_scale != 0.0
            && self.img_width > 0.0
            && self.img_height > 0.0
    }
}

/// Header block of an info hotspot description.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DescriptionHeader {
    #[serde(default)]
    pub main_img_url: String,
    #[serde(default)]
    pub label_title: String,
}

/// One titled section of an info hotspot description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptionSection {
    pub title: String,
    pub content: String,
}

/// Content shown by the info panel for one info hotspot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotspotDescription {
    #[serde(default)]
    pub header: DescriptionHeader,
    #[serde(default)]
    pub contents: Vec<DescriptionSection>,
    pub tiles_id: TilesId,
    pub info_id: String,
}

/// One dated survey of a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyDate {
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    #[serde(default)]
    pub survey_name: String,
}
