//! Seam to the underlying 360° panorama renderer.
//!
//! The renderer owns texture decoding and draw calls; this crate only tells
//! it which scenes exist, which hotspots to pin on them, and where the
//! camera should look. Scene and hotspot ids are plain tokens issued by the
//! renderer. Ownership of the resources they name is tracked by
//! [`crate::graph::SceneGraph`], which releases them explicitly.

use tokio::sync::oneshot;

use crate::consts::{FOV_LIMIT_MAX, FOV_LIMIT_MIN};
use crate::node::{InfoHotspot, Level, LinkHotspot, SceneFacet, TilesId, ViewParams};

/// Renderer-issued token for a created scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SceneId(pub u64);

/// Renderer-issued token for a hotspot element attached to a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HotspotId(pub u64);

/// Everything needed to build one cube-map scene.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneDescriptor {
    pub tiles_id: TilesId,
    /// Tile URL template with `{z}`, `{f}`, `{y}`, `{x}` placeholders.
    pub tile_url: String,
    pub preview_url: String,
    pub levels: Vec<Level>,
    pub face_size: u32,
    /// Field-of-view limiter bounds in radians.
    pub fov_min: f64,
    pub fov_max: f64,
    pub initial_view: ViewParams,
    pub pin_first_level: bool,
}

impl SceneDescriptor {
    #[must_use]
    pub fn for_scene(tiles_id: &str, facet: &SceneFacet) -> Self {
        let base = format!("{}{}", facet.manta_link, tiles_id);
        Self {
            tiles_id: tiles_id.to_owned(),
            tile_url: format!("{base}/{{z}}/{{f}}/{{y}}/{{x}}.jpg"),
            preview_url: format!("{base}/preview.jpg"),
            levels: facet.levels.clone(),
            face_size: facet.face_size,
            fov_min: FOV_LIMIT_MIN,
            fov_max: FOV_LIMIT_MAX,
            initial_view: facet.initial_parameters,
            pin_first_level: true,
        }
    }
}

/// A hotspot element pinned to a scene at a yaw/pitch.
#[derive(Debug, Clone, PartialEq)]
pub enum HotspotElement {
    /// Navigates to `target`; `tooltip` is the destination's display name.
    Link { yaw: f64, pitch: f64, rotation: f64, target: TilesId, tooltip: String },
    /// Opens the info panel for `info_id`.
    Info { yaw: f64, pitch: f64, title: String, info_id: String },
}

impl HotspotElement {
    #[must_use]
    pub fn link(hotspot: &LinkHotspot, tooltip: &str) -> Self {
        Self::Link {
            yaw: hotspot.yaw,
            pitch: hotspot.pitch,
            rotation: hotspot.rotation,
            target: hotspot.target.clone(),
            tooltip: tooltip.to_owned(),
        }
    }

    #[must_use]
    pub fn info(hotspot: &InfoHotspot) -> Self {
        Self::Info {
            yaw: hotspot.yaw,
            pitch: hotspot.pitch,
            title: hotspot.title.clone(),
            info_id: hotspot.info_id.clone(),
        }
    }
}

/// Operations the panorama renderer must provide.
///
/// Calls are made from the UI event loop only; implementations need not be
/// thread-safe.
pub trait PanoramaRenderer {
    /// Build a scene (geometry, view, tile source). Expensive.
    fn create_scene(&mut self, descriptor: &SceneDescriptor) -> SceneId;

    /// Attach one hotspot element to a scene.
    fn create_hotspot(&mut self, scene: SceneId, element: &HotspotElement) -> HotspotId;

    /// Make `scene` the displayed scene. The returned receiver fires once
    /// when the scene has fully loaded.
    fn switch_to(&mut self, scene: SceneId) -> oneshot::Receiver<()>;

    /// Set the camera of `scene` instantly.
    fn set_view(&mut self, scene: SceneId, params: ViewParams);

    /// Animate the camera of `scene` towards `params`.
    fn look_to(&mut self, scene: SceneId, params: ViewParams, duration_ms: u64);

    /// Remove orphaned draw surfaces, keeping the most recent ones.
    fn prune_surface(&mut self, keep_canvases: usize, keep_overlays: usize);

    /// Release a scene and everything attached to it.
    fn destroy_scene(&mut self, scene: SceneId);

    /// Empty the render host before a bulk reload.
    fn clear_surface(&mut self);
}
