//! Shared fixtures and fakes for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::oneshot;

use crate::api::{ApiError, FloorExistence, SiteApi, SurveyQuery};
use crate::node::{
    Calibration, HotspotDescription, InfoHotspot, Level, LinkHotspot, Node, Placement, SceneFacet, SurveyDate,
    ViewParams,
};
use crate::renderer::{HotspotElement, HotspotId, PanoramaRenderer, SceneDescriptor, SceneId};

// =============================================================================
// NODES
// =============================================================================

/// A node on `floor` at raw `(x, y)` linking to `links` with `infos` info hotspots.
pub(crate) fn node(id: &str, floor: i32, x: f64, y: f64, links: &[&str], infos: usize) -> Node {
    Node {
        tiles_id: id.to_owned(),
        name: format!("Room {id}"),
        site: "site-1".to_owned(),
        scene: Some(SceneFacet {
            levels: vec![Level { tile_size: 512, size: 512, fallback_only: false }],
            face_size: 2048,
            survey_name: "Survey".to_owned(),
            initial_parameters: ViewParams::new(0.25, 0.0, 1.5),
            link_hotspots: links
                .iter()
                .map(|t| LinkHotspot { yaw: 1.0, pitch: 0.0, rotation: 0.0, target: (*t).to_owned() })
                .collect(),
            info_hotspots: (0..infos)
                .map(|i| InfoHotspot { yaw: -1.0, pitch: 0.1, title: format!("Info {i}"), info_id: format!("{id}-info-{i}") })
                .collect(),
            manta_link: "https://tiles.test/".to_owned(),
        }),
        placement: Some(Placement { floor, x, y, rotation: 0.0 }),
    }
}

/// Identity-ish calibration over a 1000x1000 image.
pub(crate) fn calibration(floor: i32) -> Calibration {
    Calibration {
        image_url: format!("https://img.test/floor{floor}.png"),
        floor,
        x_scale: 1.0,
        y_scale: 1.0,
        img_width: 1000.0,
        img_height: 1000.0,
        ..Calibration::default()
    }
}

// =============================================================================
// FAKE RENDERER
// =============================================================================

/// Records every renderer call. Load signals fire only on request.
#[derive(Default)]
pub(crate) struct FakeRenderer {
    next_id: u64,
    pub(crate) created: Vec<SceneDescriptor>,
    pub(crate) hotspots: Vec<(SceneId, HotspotElement)>,
    pub(crate) destroyed: Vec<SceneId>,
    pub(crate) switched: Vec<SceneId>,
    pub(crate) views: Vec<(SceneId, ViewParams)>,
    pub(crate) pans: Vec<(SceneId, ViewParams, u64)>,
    pub(crate) prunes: usize,
    pub(crate) clears: usize,
    loaded: Vec<oneshot::Sender<()>>,
}

impl FakeRenderer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fire every outstanding load signal.
    pub(crate) fn fire_loaded(&mut self) {
        for tx in self.loaded.drain(..) {
            tx.send(()).unwrap_or_default();
        }
    }

    /// Drop every outstanding load signal without firing.
    pub(crate) fn drop_loaded(&mut self) {
        self.loaded.clear();
    }

    fn issue(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl PanoramaRenderer for FakeRenderer {
    fn create_scene(&mut self, descriptor: &SceneDescriptor) -> SceneId {
        self.created.push(descriptor.clone());
        SceneId(self.issue())
    }

    fn create_hotspot(&mut self, scene: SceneId, element: &HotspotElement) -> HotspotId {
        self.hotspots.push((scene, element.clone()));
        HotspotId(self.issue())
    }

    fn switch_to(&mut self, scene: SceneId) -> oneshot::Receiver<()> {
        self.switched.push(scene);
        let (tx, rx) = oneshot::channel();
        self.loaded.push(tx);
        rx
    }

    fn set_view(&mut self, scene: SceneId, params: ViewParams) {
        self.views.push((scene, params));
    }

    fn look_to(&mut self, scene: SceneId, params: ViewParams, duration_ms: u64) {
        self.pans.push((scene, params, duration_ms));
    }

    fn prune_surface(&mut self, _keep_canvases: usize, _keep_overlays: usize) {
        self.prunes += 1;
    }

    fn destroy_scene(&mut self, scene: SceneId) {
        self.destroyed.push(scene);
    }

    fn clear_surface(&mut self) {
        self.clears += 1;
    }
}

// =============================================================================
// FAKE API
// =============================================================================

/// One recorded write against the fake API.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Write {
    Coordinates { tiles_id: String, x: f64, y: f64 },
    Rotation { tiles_id: String, radians: f64 },
    Name { tiles_id: String, name: String },
    FloorDetails { floor: i32, tag: String, name: String },
    EmptyFloor { floor: i32 },
}

/// In-memory `SiteApi`. Node sets are keyed by `(floor, date)`.
#[derive(Default)]
pub(crate) struct FakeApi {
    pub(crate) nodes: Mutex<Vec<((i32, Option<String>), Vec<Node>)>>,
    pub(crate) calibrations: Mutex<Vec<Calibration>>,
    pub(crate) floors: Mutex<Vec<i32>>,
    pub(crate) empty_floors: Mutex<Vec<i32>>,
    pub(crate) populated: Mutex<Vec<i32>>,
    pub(crate) surveys: Mutex<Vec<SurveyDate>>,
    pub(crate) descriptions: Mutex<Vec<HotspotDescription>>,
    pub(crate) writes: Mutex<Vec<Write>>,
    /// Errors handed out to the next writes, in order; `None` means succeed.
    pub(crate) write_results: Mutex<VecDeque<Option<ApiError>>>,
    pub(crate) fail_nodes: Mutex<bool>,
    pub(crate) fail_floor_check: Mutex<bool>,
}

impl FakeApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_nodes(self, floor: i32, date: Option<&str>, nodes: Vec<Node>) -> Self {
        lock(&self.nodes).push(((floor, date.map(str::to_owned)), nodes));
        self
    }

    pub(crate) fn with_calibration(self, calibration: Calibration) -> Self {
        lock(&self.calibrations).push(calibration);
        self
    }

    pub(crate) fn with_floors(self, floors: &[i32], empty: &[i32]) -> Self {
        lock(&self.floors).extend_from_slice(floors);
        lock(&self.empty_floors).extend_from_slice(empty);
        lock(&self.populated).extend_from_slice(floors);
        self
    }

    pub(crate) fn with_surveys(self, surveys: Vec<SurveyDate>) -> Self {
        lock(&self.surveys).extend(surveys);
        self
    }

    pub(crate) fn fail_next_writes(&self, results: Vec<Option<ApiError>>) {
        lock(&self.write_results).extend(results);
    }

    pub(crate) fn recorded_writes(&self) -> Vec<Write> {
        lock(&self.writes).clone()
    }

    fn record(&self, write: Write) -> Result<(), ApiError> {
        if let Some(Some(err)) = lock(&self.write_results).pop_front() {
            return Err(err);
        }
        lock(&self.writes).push(write);
        Ok(())
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[async_trait::async_trait]
impl SiteApi for FakeApi {
    async fn fetch_survey_nodes(&self, query: &SurveyQuery) -> Result<Vec<Node>, ApiError> {
        if *lock(&self.fail_nodes) {
            return Err(ApiError::Request("connection refused".into()));
        }
        let date = query.date_param();
        let sets = lock(&self.nodes);
        let found = sets
            .iter()
            .find(|((floor, d), _)| *floor == query.floor && (d.is_none() || *d == date))
            .map(|(_, nodes)| nodes.clone());
        Ok(found.unwrap_or_default())
    }

    async fn fetch_calibration(&self, _site_id: &str, floor: i32) -> Result<Calibration, ApiError> {
        Ok(lock(&self.calibrations)
            .iter()
            .find(|c| c.floor == floor)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_floors(&self, _site_id: &str, _date: Option<&str>) -> Result<Vec<i32>, ApiError> {
        Ok(lock(&self.floors).clone())
    }

    async fn fetch_empty_floors(&self, _site_id: &str) -> Result<Vec<i32>, ApiError> {
        Ok(lock(&self.empty_floors).clone())
    }

    async fn floor_exists(&self, site_id: &str, floor: i32) -> Result<FloorExistence, ApiError> {
        if *lock(&self.fail_floor_check) {
            return Err(ApiError::Response { status: 500, body: "boom".into() });
        }
        Ok(FloorExistence {
            site_id: site_id.to_owned(),
            floor: floor.to_string(),
            floor_populated: lock(&self.populated).contains(&floor),
        })
    }

    async fn fetch_surveys(&self, _site_id: &str, _floor: Option<i32>) -> Result<Vec<SurveyDate>, ApiError> {
        Ok(lock(&self.surveys).clone())
    }

    async fn fetch_hotspot_descriptions(
        &self,
        tiles_id: &str,
        _site_id: &str,
    ) -> Result<Vec<HotspotDescription>, ApiError> {
        Ok(lock(&self.descriptions)
            .iter()
            .filter(|d| d.tiles_id == tiles_id)
            .cloned()
            .collect())
    }

    async fn update_node_coordinates(&self, tiles_id: &str, x: f64, y: f64) -> Result<(), ApiError> {
        self.record(Write::Coordinates { tiles_id: tiles_id.to_owned(), x, y })
    }

    async fn update_node_rotation(&self, tiles_id: &str, radians: f64) -> Result<(), ApiError> {
        self.record(Write::Rotation { tiles_id: tiles_id.to_owned(), radians })
    }

    async fn update_node_name(&self, tiles_id: &str, name: &str) -> Result<(), ApiError> {
        self.record(Write::Name { tiles_id: tiles_id.to_owned(), name: name.to_owned() })
    }

    async fn update_floor_details(&self, _site_id: &str, floor: i32, tag: &str, name: &str) -> Result<(), ApiError> {
        self.record(Write::FloorDetails { floor, tag: tag.to_owned(), name: name.to_owned() })
    }

    async fn add_empty_floor(&self, _site_id: &str, floor: i32) -> Result<(), ApiError> {
        self.record(Write::EmptyFloor { floor })
    }
}
