//! Floor and survey-date switching.
//!
//! DESIGN
//! ======
//! A switch is split in three so the caller never holds a borrow of the
//! viewer across an await:
//!
//! 1. [`FloorTimelineCoordinator::request`] issues the fetch through the
//!    last-request-wins gate and returns an owned future.
//! 2. The caller awaits it ([`crate::gate::Gated::resolve`]).
//! 3. [`FloorTimelineCoordinator::apply`] settles the result: stale results
//!    are dropped, failures leave every piece of state untouched, and a
//!    successful load replaces the scene graph and picks the scene to show.
//!
//! The scene to show is the previously active node when it survives the
//! reload. Otherwise it is the node nearest to where the previous one sat on
//! the minimap, compared in percent space when both floors are calibrated and
//! in raw survey pixels when not.
//!
//! ERROR HANDLING
//! ==============
//! Node, calibration, and floor-existence failures abort the switch with an
//! [`ApiError`]. The floor list is best effort: a failed refresh keeps the
//! previous list.

#[cfg(test)]
#[path = "coordinator_test.rs"]
mod coordinator_test;

use futures::FutureExt;
use futures::future::{Aborted, BoxFuture};
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

use crate::api::{ApiError, SiteApi, SurveyQuery, format_date};
use crate::coords::{self, Point};
use crate::gate::{Gated, RequestGate, RequestTicket};
use crate::graph::{Activation, GraphError, SceneGraph};
use crate::nearest::{self, Candidate};
use crate::node::{Calibration, Node, Placement, ViewParams};
use crate::renderer::PanoramaRenderer;
use crate::timeline;
use crate::view::ViewSynchronizer;

/// Everything fetched for one (floor, date) selection.
#[derive(Debug)]
pub struct FloorLoad {
    pub query: SurveyQuery,
    pub nodes: Vec<Node>,
    pub calibration: Calibration,
    pub floor_populated: bool,
    /// `None` when the floor list could not be refreshed.
    pub floors: Option<Vec<i32>>,
    /// Set when the requested date had no surveys and the earliest one was used.
    pub fell_back_to: Option<OffsetDateTime>,
}

/// A pending floor/date fetch.
pub type FloorFetch<'a> = Gated<BoxFuture<'a, Result<FloorLoad, ApiError>>>;

/// How a floor/date switch ended.
#[derive(Debug)]
pub enum Settlement {
    /// A newer request superseded this one; nothing changed.
    Stale,
    /// The fetch failed; nothing changed.
    Failed(ApiError),
    Settled(Settled),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settled {
    /// The scene now displayed, carrying the view actually applied; `None`
    /// for a floor without nodes.
    pub activation: Option<Activation>,
    /// The previously active node survived the reload.
    pub retained: bool,
    pub fell_back_to: Option<OffsetDateTime>,
    pub floor_populated: bool,
    /// The refreshed floor list no longer offers the loaded floor; switch
    /// to this one, its lowest entry.
    pub floor_fallback: Option<i32>,
}

/// Where the minimap anchor of the previous scene is measured.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Anchor {
    Percent(Point),
    Raw(Point),
}

pub struct FloorTimelineCoordinator {
    site_id: String,
    floor: i32,
    date: Option<OffsetDateTime>,
    calibration: Calibration,
    floors: Vec<i32>,
    floor_populated: bool,
    gate: RequestGate,
}

impl FloorTimelineCoordinator {
    #[must_use]
    pub fn new(site_id: impl Into<String>, floor: i32, date: Option<OffsetDateTime>) -> Self {
        Self {
            site_id: site_id.into(),
            floor,
            date,
            calibration: Calibration::default(),
            floors: Vec::new(),
            floor_populated: true,
            gate: RequestGate::new(),
        }
    }

    /// Start fetching `floor` on `date`, superseding any fetch in flight.
    pub fn request<'a>(&mut self, api: &'a dyn SiteApi, floor: i32, date: Option<OffsetDateTime>) -> FloorFetch<'a> {
        let query = SurveyQuery { site_id: self.site_id.clone(), floor, date };
        info!(site_id = %query.site_id, floor, date = ?date, "floor/date switch requested");
        self.gate.begin(fetch_floor(api, query).boxed())
    }

    /// Settle a resolved fetch into the graph and view.
    pub fn apply(
        &mut self,
        ticket: RequestTicket,
        result: Result<Result<FloorLoad, ApiError>, Aborted>,
        graph: &mut SceneGraph,
        view: &mut ViewSynchronizer,
        renderer: &mut dyn PanoramaRenderer,
        preferred: Option<&str>,
    ) -> Settlement {
        if !self.gate.finish(ticket) {
            return Settlement::Stale;
        }
        let load = match result {
            Err(Aborted) => return Settlement::Stale,
            Ok(Err(e)) => {
                error!(error = %e, code = e.error_code(), floor = self.floor, "floor/date switch failed");
                return Settlement::Failed(e);
            }
            Ok(Ok(load)) => load,
        };

        let previous = graph.active().map(str::to_owned);
        let anchor = previous
            .as_deref()
            .and_then(|id| graph.find_by_tiles_id(id))
            .and_then(|r| r.node().placement)
            .map(|p| self.anchor_for(&p, &load.calibration));
        let remembered = view.current();

        graph.load(renderer, load.nodes);
        self.floor = load.query.floor;
        self.date = load.query.date;
        self.calibration = load.calibration;
        self.floor_populated = load.floor_populated;
        let mut floor_fallback = None;
        if let Some(floors) = load.floors {
            if !floors.contains(&self.floor) {
                floor_fallback = floors.iter().min().copied();
                if let Some(lowest) = floor_fallback {
                    warn!(floor = self.floor, lowest, "floor no longer selectable");
                }
            }
            self.floors = floors;
        }

        let retained = previous.as_deref().is_some_and(|id| graph.contains(id));
        let target = if retained {
            previous
        } else {
            self.entry_point(graph, anchor, preferred)
        };

        let activation = match target {
            Some(id) => match self.enter(graph, view, renderer, &id, retained.then_some(remembered)) {
                Ok(activation) => Some(activation),
                Err(e) => {
                    warn!(error = %e, "entry scene vanished during settle");
                    None
                }
            },
            None => {
                info!(floor = self.floor, "floor has no scenes");
                None
            }
        };

        Settlement::Settled(Settled {
            activation,
            retained,
            fell_back_to: load.fell_back_to,
            floor_populated: self.floor_populated,
            floor_fallback,
        })
    }

    fn anchor_for(&self, placement: &Placement, next: &Calibration) -> Anchor {
        if self.calibration.is_usable() && next.is_usable() {
            Anchor::Percent(coords::percent_position(&self.calibration, placement))
        } else {
            Anchor::Raw(Point::new(placement.x, placement.y))
        }
    }

    fn entry_point(&self, graph: &SceneGraph, anchor: Option<Anchor>, preferred: Option<&str>) -> Option<String> {
        if let Some(anchor) = anchor {
            let (target, percent) = match anchor {
                Anchor::Percent(p) => (p, true),
                Anchor::Raw(p) => (p, false),
            };
            let candidates: Vec<Candidate> = graph
                .nodes()
                .filter_map(|n| {
                    let p = n.placement?;
                    let position = if percent {
                        coords::percent_position(&self.calibration, &p)
                    } else {
                        Point::new(p.x, p.y)
                    };
                    Some(Candidate { node_id: n.tiles_id.clone(), position })
                })
                .collect();
            if let Some(nearest) = nearest::find_nearest(&candidates, target) {
                debug!(node = %nearest.node_id, x = nearest.x, y = nearest.y, "nearest node chosen");
                return Some(nearest.node_id);
            }
        }
        if let Some(id) = preferred.filter(|id| graph.contains(id)) {
            return Some(id.to_owned());
        }
        graph.nodes().next().map(|n| n.tiles_id.clone())
    }

    fn enter(
        &self,
        graph: &mut SceneGraph,
        view: &mut ViewSynchronizer,
        renderer: &mut dyn PanoramaRenderer,
        tiles_id: &str,
        remembered: Option<ViewParams>,
    ) -> Result<Activation, GraphError> {
        let mut activation = graph.activate(renderer, tiles_id)?;
        view.begin_scene_switch(activation.view);
        let params = remembered.filter(|v| !v.is_unset()).unwrap_or(activation.view);
        match view.apply_view(renderer, activation.scene, params) {
            Ok(()) => activation.view = params,
            Err(e) => warn!(error = %e, "view restore skipped"),
        }
        Ok(activation)
    }

    // --- Floor metadata ---

    /// Rename the current floor. Blank values default to the floor number
    /// and `Floor N`.
    ///
    /// # Errors
    ///
    /// Returns the API error; local calibration is left unchanged.
    pub async fn update_floor_details(&mut self, api: &dyn SiteApi, tag: &str, name: &str) -> Result<(), ApiError> {
        let (tag, name) = floor_details_or_default(self.floor, tag, name);
        api.update_floor_details(&self.site_id, self.floor, &tag, &name).await?;
        info!(floor = self.floor, %tag, %name, "floor details updated");
        self.calibration.floor_tag = tag;
        self.calibration.floor_name = name;
        Ok(())
    }

    /// Register an empty floor so it becomes selectable.
    ///
    /// # Errors
    ///
    /// Returns the API error; the floor list is left unchanged.
    pub async fn add_empty_floor(&mut self, api: &dyn SiteApi, floor: i32) -> Result<(), ApiError> {
        api.add_empty_floor(&self.site_id, floor).await?;
        self.floors = timeline::selectable_floors(&self.floors, &[floor]);
        info!(floor, "empty floor added");
        Ok(())
    }

    /// Supersede any fetch in flight without starting another.
    pub fn cancel(&mut self) {
        self.gate.cancel();
    }

    // --- Queries ---

    #[must_use]
    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    #[must_use]
    pub fn floor(&self) -> i32 {
        self.floor
    }

    #[must_use]
    pub fn date(&self) -> Option<OffsetDateTime> {
        self.date
    }

    #[must_use]
    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    #[must_use]
    pub fn floors(&self) -> &[i32] {
        &self.floors
    }

    #[must_use]
    pub fn floor_populated(&self) -> bool {
        self.floor_populated
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.gate.is_pending()
    }
}

/// Tag and name to persist, defaulting blanks.
#[must_use]
pub fn floor_details_or_default(floor: i32, tag: &str, name: &str) -> (String, String) {
    let tag = if tag.trim().is_empty() { floor.to_string() } else { tag.trim().to_owned() };
    let name = if name.trim().is_empty() { format!("Floor {floor}") } else { name.trim().to_owned() };
    (tag, name)
}

/// Fetch nodes, calibration, existence, and the floor list for `query`.
///
/// An empty node set for the requested date falls back to the site's
/// earliest survey date on that floor.
///
/// # Errors
///
/// Returns the first failing node, calibration, or existence fetch.
pub async fn fetch_floor(api: &dyn SiteApi, mut query: SurveyQuery) -> Result<FloorLoad, ApiError> {
    let mut nodes = api.fetch_survey_nodes(&query).await?;
    let mut fell_back_to = None;

    if nodes.is_empty() {
        let surveys = api.fetch_surveys(&query.site_id, Some(query.floor)).await?;
        if let Some(earliest) = timeline::earliest_date(&surveys).filter(|d| Some(*d) != query.date) {
            info!(floor = query.floor, requested = ?query.date, fallback = ?earliest, "no surveys on date; using earliest");
            query.date = Some(earliest);
            nodes = api.fetch_survey_nodes(&query).await?;
            fell_back_to = Some(earliest);
        }
    }

    let calibration = api.fetch_calibration(&query.site_id, query.floor).await?;
    let existence = api.floor_exists(&query.site_id, query.floor).await?;
    let floors = fetch_selectable_floors(api, &query.site_id, query.date).await;

    Ok(FloorLoad {
        query,
        nodes,
        calibration,
        floor_populated: existence.floor_populated,
        floors,
        fell_back_to,
    })
}

async fn fetch_selectable_floors(api: &dyn SiteApi, site_id: &str, date: Option<OffsetDateTime>) -> Option<Vec<i32>> {
    let date = date.and_then(format_date);
    let populated = match api.fetch_floors(site_id, date.as_deref()).await {
        Ok(floors) => floors,
        Err(e) => {
            warn!(error = %e, "floor list refresh failed");
            return None;
        }
    };
    let empty = match api.fetch_empty_floors(site_id).await {
        Ok(floors) => floors,
        Err(e) => {
            warn!(error = %e, "empty floor list refresh failed");
            return None;
        }
    };
    Some(timeline::selectable_floors(&populated, &empty))
}
