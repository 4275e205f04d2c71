//! Viewer state object: every UI intent goes through [`ViewerCore`].
//!
//! DESIGN
//! ======
//! The host forwards user input as [`Intent`] values and reacts to the
//! [`Action`] values that come back. [`ViewerCore::dispatch`] is synchronous
//! and never touches the network; work that needs the site API is returned
//! as an effect action ([`Action::FetchFloor`], [`Action::FetchDescriptions`],
//! [`Action::SaveRequested`]).
//!
//! Hosts that want supersession run effects themselves through the
//! request/settle pairs (`request_floor` + `settle_floor`,
//! `request_descriptions` + `settle_descriptions`). Hosts that process one
//! intent at a time use [`ViewerCore::handle`], which runs effects inline.
//!
//! ERROR HANDLING
//! ==============
//! This is the fetch boundary. Failed fetches and writes are logged and
//! turned into [`Action::Alert`]; the state they would have changed is left
//! as it was. Broken link targets degrade to an empty list. Failed hotspot
//! descriptions degrade to none.

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

use std::collections::VecDeque;

use futures::FutureExt;
use futures::future::{Aborted, BoxFuture};
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

use crate::api::{ApiError, SiteApi};
use crate::config::ViewerSettings;
use crate::consts::PAN_DURATION_MS;
use crate::coordinator::{FloorFetch, FloorLoad, FloorTimelineCoordinator, Settlement};
use crate::coords::Point;
use crate::editor::{Compensation, EditError, EditField, EditSession, FieldSet, NodeEditor, Toggle, WriteStage};
use crate::gate::{Gated, RequestGate, RequestTicket};
use crate::graph::SceneGraph;
use crate::markers::{self, Marker, MarkerContext};
use crate::node::{HotspotDescription, InfoHotspot, Node, TilesId, ViewParams};
use crate::renderer::{PanoramaRenderer, SceneId};
use crate::timeline::{self, SurveyMonth};
use crate::view::ViewSynchronizer;

/// A pending hotspot-description fetch.
pub type DescriptionFetch<'a> = Gated<BoxFuture<'a, Result<Vec<HotspotDescription>, ApiError>>>;

/// User input forwarded by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// The renderer camera moved (user drag).
    ViewChanged(ViewParams),
    /// The renderer finished the running pan.
    PanCompleted,
    /// The renderer may have finished loading the active scene.
    SceneLoaded,
    /// A link hotspot or linked-node entry was activated.
    FollowLink(TilesId),
    /// An info hotspot was picked from the hotspot list.
    OpenInfo { info_id: String },
    CloseInfo,
    MarkerClicked(TilesId),
    /// The edit/save toggle button.
    ToggleEdit,
    EditInput { field: EditField, raw: String },
    EditStep { field: EditField, up: bool },
    /// The selected marker was dragged to a percent position.
    EditDrag(Point),
    EditName(String),
    SaveEdit,
    CancelEdit,
    SetMinimapEnlarged(bool),
    ToggleTimeline,
    SelectFloor(i32),
    SelectDate(Option<OffsetDateTime>),
}

/// Effects and notifications for the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Blocking user-facing alert.
    Alert(String),
    SceneActivated { tiles_id: TilesId, view: ViewParams },
    InfoPanelOpened { info_id: String },
    InfoPanelClosed,
    /// The floor has no minimap; show the upload prompt instead of markers.
    ShowUploadPrompt,
    MinimapCollapsed,
    TimelineOpened,
    TimelineClosed,
    /// The requested date was empty and the viewer moved to this one.
    DateChanged(OffsetDateTime),
    FloorsChanged(Vec<i32>),
    /// Edit state (selection, working values, dirty flag) changed.
    EditChanged,
    NodeSaved { tiles_id: TilesId },
    /// Markers or overlays need repainting.
    RenderNeeded,
    /// Effect: load this floor/date.
    FetchFloor { floor: i32, date: Option<OffsetDateTime> },
    /// Effect: fetch info-hotspot descriptions for this scene.
    FetchDescriptions { tiles_id: TilesId },
    /// Effect: persist the edit session.
    SaveRequested,
}

/// Application state for one site.
pub struct ViewerCore<R: PanoramaRenderer> {
    renderer: R,
    settings: ViewerSettings,
    is_admin: bool,
    graph: SceneGraph,
    view: ViewSynchronizer,
    editor: NodeEditor,
    coordinator: FloorTimelineCoordinator,
    descriptions: Vec<HotspotDescription>,
    description_gate: RequestGate,
    survey_months: Vec<SurveyMonth>,
    open_info: Option<String>,
    minimap_enlarged: bool,
    timeline_open: bool,
    /// The configured entry scene and view have not been shown yet.
    initial_pending: bool,
}

impl<R: PanoramaRenderer> ViewerCore<R> {
    #[must_use]
    pub fn new(renderer: R, site_id: impl Into<String>, settings: ViewerSettings, is_admin: bool) -> Self {
        let initial = &settings.initial_settings;
        let coordinator = FloorTimelineCoordinator::new(site_id, initial.floor, initial.date);
        Self {
            renderer,
            is_admin,
            graph: SceneGraph::new(),
            view: ViewSynchronizer::new(),
            editor: NodeEditor::new(FieldSet::default()),
            coordinator,
            descriptions: Vec::new(),
            description_gate: RequestGate::new(),
            survey_months: Vec::new(),
            open_info: None,
            minimap_enlarged: false,
            timeline_open: false,
            initial_pending: true,
            settings,
        }
    }

    /// The effect that loads the configured floor and date.
    #[must_use]
    pub fn start(&self) -> Action {
        Action::FetchFloor { floor: self.coordinator.floor(), date: self.coordinator.date() }
    }

    // --- Intents ---

    /// Apply one intent. Never performs I/O.
    pub fn dispatch(&mut self, intent: Intent) -> Vec<Action> {
        match intent {
            Intent::ViewChanged(params) => {
                self.view.on_view_changed(params);
                vec![Action::RenderNeeded]
            }
            Intent::PanCompleted => {
                self.view.complete_transition();
                vec![Action::RenderNeeded]
            }
            Intent::SceneLoaded => {
                if self.graph.poll_loaded(&mut self.renderer) {
                    debug!("render surface pruned");
                }
                Vec::new()
            }
            Intent::FollowLink(target) => self.navigate(&target),
            Intent::OpenInfo { info_id } => self.show_info(info_id),
            Intent::CloseInfo => self.close_info().into_iter().collect(),
            Intent::MarkerClicked(id) => self.marker_clicked(&id),
            Intent::ToggleEdit => self.toggle_edit(),
            Intent::EditInput { field, raw } => self.edit(|e| e.set_input(field, &raw).map(|_| ())),
            Intent::EditStep { field, up } => self.edit(|e| e.step(field, up).map(|_| ())),
            Intent::EditDrag(position) => self.edit(|e| e.move_to(position)),
            Intent::EditName(name) => self.edit(|e| e.set_name(&name)),
            Intent::SaveEdit => {
                if self.editor.is_dirty() {
                    vec![Action::SaveRequested]
                } else {
                    Vec::new()
                }
            }
            Intent::CancelEdit => {
                self.editor.cancel();
                vec![Action::EditChanged, Action::RenderNeeded]
            }
            Intent::SetMinimapEnlarged(enlarged) => self.set_enlarged(enlarged),
            Intent::ToggleTimeline => self.toggle_timeline(),
            Intent::SelectFloor(floor) => {
                vec![Action::FetchFloor { floor, date: self.coordinator.date() }]
            }
            Intent::SelectDate(date) => {
                vec![Action::FetchFloor { floor: self.coordinator.floor(), date }]
            }
        }
    }

    /// Dispatch `intent` and run every effect it produces against `api`.
    pub async fn handle(&mut self, api: &dyn SiteApi, intent: Intent) -> Vec<Action> {
        let actions = self.dispatch(intent);
        self.run_effects(api, actions).await
    }

    /// Run effect actions inline, returning only notifications.
    pub async fn run_effects(&mut self, api: &dyn SiteApi, actions: Vec<Action>) -> Vec<Action> {
        let mut pending: VecDeque<Action> = actions.into();
        let mut out = Vec::new();
        while let Some(action) = pending.pop_front() {
            match action {
                Action::FetchFloor { floor, date } => {
                    let (ticket, result) = self.request_floor(api, floor, date).resolve().await;
                    pending.extend(self.settle_floor(ticket, result));
                }
                Action::FetchDescriptions { tiles_id } => {
                    let (ticket, result) = self.request_descriptions(api, &tiles_id).resolve().await;
                    pending.extend(self.settle_descriptions(ticket, result));
                }
                Action::SaveRequested => pending.extend(self.save(api).await),
                other => out.push(other),
            }
        }
        out
    }

    fn navigate(&mut self, tiles_id: &str) -> Vec<Action> {
        match self.graph.activate(&mut self.renderer, tiles_id) {
            Ok(activation) => {
                self.view.begin_scene_switch(activation.view);
                let mut actions: Vec<Action> = self.close_info().into_iter().collect();
                actions.push(Action::SceneActivated { tiles_id: activation.tiles_id.clone(), view: activation.view });
                actions.push(Action::FetchDescriptions { tiles_id: activation.tiles_id });
                actions.push(Action::RenderNeeded);
                actions
            }
            Err(e) => {
                error!(error = %e, %tiles_id, "navigation failed");
                vec![Action::Alert(format!("Could not open scene {tiles_id}: {e}"))]
            }
        }
    }

    fn show_info(&mut self, info_id: String) -> Vec<Action> {
        let Some(tiles_id) = self.graph.active() else {
            return Vec::new();
        };
        let Some(hotspot) = self.graph.find_info_hotspots(tiles_id).iter().find(|h| h.info_id == info_id) else {
            warn!(%info_id, "info hotspot not on the active scene");
            return Vec::new();
        };
        let target = self.view.current().looking_at(hotspot.yaw, hotspot.pitch);
        if let Some(scene) = self.graph.active_scene() {
            if let Err(e) = self.view.pan_to(&mut self.renderer, scene, target, PAN_DURATION_MS) {
                debug!(error = %e, "pan skipped");
            }
        }
        self.open_info = Some(info_id.clone());
        vec![Action::InfoPanelOpened { info_id }]
    }

    fn close_info(&mut self) -> Option<Action> {
        self.open_info.take().map(|_| Action::InfoPanelClosed)
    }

    fn marker_clicked(&mut self, tiles_id: &str) -> Vec<Action> {
        if self.editor.is_selecting() {
            let Some(record) = self.graph.find_by_tiles_id(tiles_id) else {
                return Vec::new();
            };
            return match self.editor.select(record.node(), self.coordinator.calibration()) {
                Ok(()) => vec![Action::EditChanged, Action::RenderNeeded],
                Err(EditError::MissingCalibration) => vec![Action::ShowUploadPrompt],
                Err(e) => {
                    warn!(error = %e, %tiles_id, "marker selection refused");
                    Vec::new()
                }
            };
        }
        if self.editor.session().is_some() {
            return Vec::new();
        }
        let mut actions = self.navigate(tiles_id);
        if !self.is_admin && self.minimap_enlarged {
            self.minimap_enlarged = false;
            actions.push(Action::MinimapCollapsed);
        }
        actions
    }

    fn toggle_edit(&mut self) -> Vec<Action> {
        if !self.is_admin {
            return Vec::new();
        }
        match self.editor.toggle() {
            Toggle::SaveRequested => vec![Action::SaveRequested],
            Toggle::Selecting | Toggle::Viewing => vec![Action::EditChanged, Action::RenderNeeded],
        }
    }

    fn edit(&mut self, op: impl FnOnce(&mut NodeEditor) -> Result<(), EditError>) -> Vec<Action> {
        match op(&mut self.editor) {
            Ok(()) => vec![Action::EditChanged, Action::RenderNeeded],
            Err(e) => {
                debug!(error = %e, "edit input ignored");
                Vec::new()
            }
        }
    }

    fn set_enlarged(&mut self, enlarged: bool) -> Vec<Action> {
        let was = std::mem::replace(&mut self.minimap_enlarged, enlarged);
        if was && !enlarged {
            self.editor.reset();
            return vec![Action::MinimapCollapsed, Action::EditChanged, Action::RenderNeeded];
        }
        vec![Action::RenderNeeded]
    }

    fn toggle_timeline(&mut self) -> Vec<Action> {
        if !self.settings.enable.timeline {
            return Vec::new();
        }
        if self.timeline_open {
            self.timeline_open = false;
            vec![Action::TimelineClosed]
        } else if self.coordinator.floor_populated() {
            self.timeline_open = true;
            vec![Action::TimelineOpened]
        } else {
            Vec::new()
        }
    }

    // --- Floor / date ---

    /// Start loading `floor` on `date`, superseding any load in flight.
    pub fn request_floor<'a>(
        &mut self,
        api: &'a dyn SiteApi,
        floor: i32,
        date: Option<OffsetDateTime>,
    ) -> FloorFetch<'a> {
        self.coordinator.request(api, floor, date)
    }

    /// Settle a resolved floor load.
    pub fn settle_floor(
        &mut self,
        ticket: RequestTicket,
        result: Result<Result<FloorLoad, ApiError>, Aborted>,
    ) -> Vec<Action> {
        let preferred = self
            .initial_pending
            .then(|| self.settings.initial_settings.pano_id.clone())
            .filter(|id| !id.is_empty());

        let settlement = self.coordinator.apply(
            ticket,
            result,
            &mut self.graph,
            &mut self.view,
            &mut self.renderer,
            preferred.as_deref(),
        );

        let settled = match settlement {
            Settlement::Stale => return Vec::new(),
            Settlement::Failed(e) => {
                return vec![Action::Alert(format!("Failed to load survey data: {e}"))];
            }
            Settlement::Settled(settled) => settled,
        };

        self.editor.reset();
        let mut actions: Vec<Action> = self.close_info().into_iter().collect();
        actions.push(Action::EditChanged);
        if let Some(activation) = settled.activation {
            let mut view = activation.view;
            if self.initial_pending && preferred.as_deref() == Some(activation.tiles_id.as_str()) {
                view = self.apply_initial_view(activation.scene).unwrap_or(view);
            }
            actions.push(Action::SceneActivated { tiles_id: activation.tiles_id.clone(), view });
            actions.push(Action::FetchDescriptions { tiles_id: activation.tiles_id });
        } else {
            self.descriptions.clear();
        }
        self.initial_pending = false;

        if let Some(date) = settled.fell_back_to {
            actions.push(Action::DateChanged(date));
        }
        actions.push(Action::FloorsChanged(self.coordinator.floors().to_vec()));
        if !settled.floor_populated && self.timeline_open {
            self.timeline_open = false;
            actions.push(Action::TimelineClosed);
        }
        if self.is_admin && !self.coordinator.calibration().is_usable() {
            actions.push(Action::ShowUploadPrompt);
        }
        actions.push(Action::RenderNeeded);
        if let Some(floor) = settled.floor_fallback {
            actions.push(Action::FetchFloor { floor, date: self.coordinator.date() });
        }
        actions
    }

    fn apply_initial_view(&mut self, scene: SceneId) -> Option<ViewParams> {
        let params = self.settings.initial_settings.view();
        if params.is_unset() {
            return None;
        }
        match self.view.apply_view(&mut self.renderer, scene, params) {
            Ok(()) => Some(params),
            Err(e) => {
                debug!(error = %e, "initial view skipped");
                None
            }
        }
    }

    /// Rename the current floor.
    pub async fn rename_floor(&mut self, api: &dyn SiteApi, tag: &str, name: &str) -> Vec<Action> {
        match self.coordinator.update_floor_details(api, tag, name).await {
            Ok(()) => vec![Action::RenderNeeded],
            Err(e) => {
                error!(error = %e, code = e.error_code(), "floor rename failed");
                vec![Action::Alert(format!("Failed to update floor details: {e}"))]
            }
        }
    }

    /// Register a floor without surveys.
    pub async fn add_empty_floor(&mut self, api: &dyn SiteApi, floor: i32) -> Vec<Action> {
        match self.coordinator.add_empty_floor(api, floor).await {
            Ok(()) => vec![Action::FloorsChanged(self.coordinator.floors().to_vec())],
            Err(e) => {
                error!(error = %e, code = e.error_code(), floor, "adding empty floor failed");
                vec![Action::Alert(format!("Failed to add floor {floor}: {e}"))]
            }
        }
    }

    /// Reload the survey timeline for the current floor.
    pub async fn refresh_timeline(&mut self, api: &dyn SiteApi) -> Vec<Action> {
        let site_id = self.coordinator.site_id().to_owned();
        match api.fetch_surveys(&site_id, Some(self.coordinator.floor())).await {
            Ok(surveys) => {
                self.survey_months = timeline::group_by_month(surveys);
                vec![Action::RenderNeeded]
            }
            Err(e) => {
                error!(error = %e, code = e.error_code(), "survey timeline fetch failed");
                vec![Action::Alert(format!("Failed to load surveys: {e}"))]
            }
        }
    }

    // --- Hotspot descriptions ---

    /// Start fetching info-panel content for `tiles_id`.
    pub fn request_descriptions<'a>(&mut self, api: &'a dyn SiteApi, tiles_id: &str) -> DescriptionFetch<'a> {
        let tiles_id = tiles_id.to_owned();
        let site_id = self.coordinator.site_id().to_owned();
        self.description_gate
            .begin(async move { api.fetch_hotspot_descriptions(&tiles_id, &site_id).await }.boxed())
    }

    /// Store fetched descriptions. A failed fetch leaves none.
    pub fn settle_descriptions(
        &mut self,
        ticket: RequestTicket,
        result: Result<Result<Vec<HotspotDescription>, ApiError>, Aborted>,
    ) -> Vec<Action> {
        if !self.description_gate.finish(ticket) {
            return Vec::new();
        }
        match result {
            Ok(Ok(descriptions)) => {
                debug!(count = descriptions.len(), "hotspot descriptions loaded");
                self.descriptions = descriptions;
            }
            Ok(Err(e)) => {
                warn!(error = %e, "hotspot descriptions unavailable");
                self.descriptions.clear();
            }
            Err(Aborted) => return Vec::new(),
        }
        vec![Action::RenderNeeded]
    }

    // --- Save ---

    /// Persist the edit session and fold the result into the node set.
    pub async fn save(&mut self, api: &dyn SiteApi) -> Vec<Action> {
        match self.editor.save(api, self.coordinator.calibration()).await {
            Ok(saved) => {
                if let Some(node) = self.graph.node_mut(&saved.tiles_id) {
                    saved.apply_to(node);
                }
                info!(tiles_id = %saved.tiles_id, "node saved");
                vec![Action::NodeSaved { tiles_id: saved.tiles_id }, Action::EditChanged, Action::RenderNeeded]
            }
            Err(EditError::NoChanges) => Vec::new(),
            Err(e) => {
                error!(error = %e, "node save failed");
                vec![Action::Alert(save_alert(&e))]
            }
        }
    }

    // --- Queries ---

    /// Minimap markers for the current floor.
    #[must_use]
    pub fn markers(&self) -> Vec<Marker> {
        let ctx = MarkerContext {
            calibration: self.coordinator.calibration(),
            current: self.graph.active(),
            current_rotation: self.view.rotation(),
            rotation_offset: self.settings.initial_settings.rotation_offset,
            rotation_enabled: self.settings.enable.rotation,
            enlarged: self.minimap_enlarged,
            editing: self.editor.session(),
        };
        markers::build_markers(self.graph.nodes(), &ctx)
    }

    /// Nodes the active scene links to. Broken targets yield an empty list.
    #[must_use]
    pub fn linked_nodes(&self) -> Vec<&Node> {
        self.graph.active().map(|id| self.graph.link_targets_or_empty(id)).unwrap_or_default()
    }

    #[must_use]
    pub fn info_hotspots(&self) -> &[InfoHotspot] {
        match self.graph.active() {
            Some(id) => self.graph.find_info_hotspots(id),
            None => &[],
        }
    }

    /// Content for the open info panel.
    #[must_use]
    pub fn description(&self, info_id: &str) -> Option<&HotspotDescription> {
        self.descriptions.iter().find(|d| d.info_id == info_id)
    }

    #[must_use]
    pub fn open_info(&self) -> Option<&str> {
        self.open_info.as_deref()
    }

    #[must_use]
    pub fn current(&self) -> Option<&str> {
        self.graph.active()
    }

    #[must_use]
    pub fn view(&self) -> &ViewSynchronizer {
        &self.view
    }

    #[must_use]
    pub fn edit_session(&self) -> Option<&EditSession> {
        self.editor.session()
    }

    #[must_use]
    pub fn editor(&self) -> &NodeEditor {
        &self.editor
    }

    #[must_use]
    pub fn coordinator(&self) -> &FloorTimelineCoordinator {
        &self.coordinator
    }

    #[must_use]
    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    #[must_use]
    pub fn survey_months(&self) -> &[SurveyMonth] {
        &self.survey_months
    }

    #[must_use]
    pub fn minimap_enlarged(&self) -> bool {
        self.minimap_enlarged
    }

    #[must_use]
    pub fn timeline_open(&self) -> bool {
        self.timeline_open
    }

    #[must_use]
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Destroy every renderer scene. The core is unusable for display afterwards.
    pub fn shutdown(&mut self) {
        self.coordinator.cancel();
        self.description_gate.cancel();
        self.graph.release_all(&mut self.renderer);
    }
}

/// Alert text for a failed save, including what happened to earlier writes.
#[must_use]
pub fn save_alert(err: &EditError) -> String {
    match err {
        EditError::WriteFailed { compensation: Compensation::Restored(stages), .. } => {
            format!("Save failed: {err}. Reverted {}.", join_stages(stages))
        }
        EditError::WriteFailed { compensation: Compensation::Incomplete(stages), .. } => {
            format!("Save failed: {err}. Could not revert {}; reload before editing again.", join_stages(stages))
        }
        _ => format!("Save failed: {err}"),
    }
}

fn join_stages(stages: &[WriteStage]) -> String {
    stages.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}
