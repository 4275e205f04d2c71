//! Scene graph: the loaded node set and its lazily built renderer scenes.
//!
//! DESIGN
//! ======
//! Each node with a scene facet gets one [`SceneRecord`]. The renderer scene
//! behind a record is built on first visit and then reused until the node set
//! is replaced. Scene handles are owned values: `load` and `release_all`
//! destroy every handle through the renderer before anything is dropped,
//! because those resources live outside this process's allocator.
//!
//! ERROR HANDLING
//! ==============
//! A link hotspot whose target is not in the loaded set is a data-integrity
//! fault ([`BrokenGraphError`]). Materialization skips just that hotspot;
//! [`SceneGraph::link_targets_or_empty`] degrades to an empty list. Neither
//! makes the scene unreachable.

#[cfg(test)]
#[path = "graph_test.rs"]
mod graph_test;

use std::collections::HashMap;

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::consts::{KEEP_CANVASES, KEEP_OVERLAYS};
use crate::node::{InfoHotspot, Node, SceneFacet, TilesId, ViewParams};
use crate::renderer::{HotspotElement, HotspotId, PanoramaRenderer, SceneDescriptor, SceneId};

/// A link hotspot points at a node that is not in the loaded set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("link hotspot on {source_id} targets missing scene {target}")]
pub struct BrokenGraphError {
    pub source_id: TilesId,
    pub target: TilesId,
}

/// Errors produced by scene graph navigation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// No scene with this id is loaded.
    #[error("scene not found: {0}")]
    SceneNotFound(TilesId),
}

/// Live renderer resources for one materialized scene.
///
/// Not `Clone`: exactly one owner, released through [`SceneHandle::release`].
#[derive(Debug, PartialEq, Eq)]
pub struct SceneHandle {
    scene: SceneId,
    hotspots: Vec<HotspotId>,
}

impl SceneHandle {
    #[must_use]
    pub fn scene(&self) -> SceneId {
        self.scene
    }

    #[must_use]
    pub fn hotspots(&self) -> &[HotspotId] {
        &self.hotspots
    }

    /// Destroy the renderer scene (and its hotspots).
    pub fn release(self, renderer: &mut dyn PanoramaRenderer) {
        renderer.destroy_scene(self.scene);
    }
}

/// A node paired with its (possibly not yet built) renderer scene.
#[derive(Debug)]
pub struct SceneRecord {
    node: Node,
    handle: Option<SceneHandle>,
}

impl SceneRecord {
    #[must_use]
    pub fn node(&self) -> &Node {
        &self.node
    }

    #[must_use]
    pub fn handle(&self) -> Option<&SceneHandle> {
        self.handle.as_ref()
    }

    #[must_use]
    pub fn is_materialized(&self) -> bool {
        self.handle.is_some()
    }

    fn facet(&self) -> Option<&SceneFacet> {
        self.node.scene.as_ref()
    }
}

/// Result of switching the displayed scene.
#[derive(Debug, Clone, PartialEq)]
pub struct Activation {
    pub tiles_id: TilesId,
    pub scene: SceneId,
    /// View the scene was reset to on entry.
    pub view: ViewParams,
}

struct PendingLoad {
    tiles_id: TilesId,
    loaded: oneshot::Receiver<()>,
}

/// Authoritative set of scenes for the loaded floor and survey date.
#[derive(Default)]
pub struct SceneGraph {
    records: Vec<SceneRecord>,
    index: HashMap<TilesId, usize>,
    active: Option<TilesId>,
    pending: Option<PendingLoad>,
}

impl SceneGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the node set. Every existing handle is released first.
    ///
    /// Nodes without a scene facet cannot be displayed and are skipped.
    pub fn load(&mut self, renderer: &mut dyn PanoramaRenderer, nodes: Vec<Node>) {
        self.release_all(renderer);
        for node in nodes {
            if node.scene.is_none() {
                warn!(tiles_id = %node.tiles_id, "node has no scene facet; skipping");
                continue;
            }
            if self.index.contains_key(&node.tiles_id) {
                warn!(tiles_id = %node.tiles_id, "duplicate node in set; keeping first");
                continue;
            }
            self.index.insert(node.tiles_id.clone(), self.records.len());
            self.records.push(SceneRecord { node, handle: None });
        }
        info!(scenes = self.records.len(), "scene graph loaded");
    }

    /// Destroy every materialized scene and forget the node set.
    pub fn release_all(&mut self, renderer: &mut dyn PanoramaRenderer) {
        let mut released = 0usize;
        for record in &mut self.records {
            if let Some(handle) = record.handle.take() {
                handle.release(renderer);
                released += 1;
            }
        }
        if !self.records.is_empty() {
            renderer.clear_surface();
        }
        self.records.clear();
        self.index.clear();
        self.active = None;
        self.pending = None;
        debug!(released, "scene handles released");
    }

    /// Build the renderer scene for `tiles_id` if it has not been built yet.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::SceneNotFound`] if the id is not loaded.
    pub fn materialize(&mut self, renderer: &mut dyn PanoramaRenderer, tiles_id: &str) -> Result<SceneId, GraphError> {
        let idx = self.position(tiles_id)?;
        if let Some(handle) = &self.records[idx].handle {
            return Ok(handle.scene);
        }

        let record = &self.records[idx];
        let Some(facet) = record.facet() else {
            return Err(GraphError::SceneNotFound(tiles_id.to_owned()));
        };

        let scene = renderer.create_scene(&SceneDescriptor::for_scene(tiles_id, facet));
        let mut hotspots = Vec::with_capacity(facet.link_hotspots.len() + facet.info_hotspots.len());

        for link in &facet.link_hotspots {
            match self.find_by_tiles_id(&link.target) {
                Some(target) => {
                    let element = HotspotElement::link(link, &target.node.name);
                    hotspots.push(renderer.create_hotspot(scene, &element));
                }
                None => {
                    let err = BrokenGraphError { source_id: tiles_id.to_owned(), target: link.target.clone() };
                    warn!(error = %err, "skipping broken link hotspot");
                }
            }
        }
        for info_hotspot in &facet.info_hotspots {
            hotspots.push(renderer.create_hotspot(scene, &HotspotElement::info(info_hotspot)));
        }

        debug!(%tiles_id, hotspots = hotspots.len(), "scene materialized");
        self.records[idx].handle = Some(SceneHandle { scene, hotspots });
        Ok(scene)
    }

    /// Display `tiles_id`, resetting its camera to the node's initial view.
    ///
    /// Surface pruning is deferred until the renderer reports the scene as
    /// loaded; see [`SceneGraph::poll_loaded`] and [`SceneGraph::wait_loaded`].
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::SceneNotFound`] if the id is not loaded.
    pub fn activate(&mut self, renderer: &mut dyn PanoramaRenderer, tiles_id: &str) -> Result<Activation, GraphError> {
        let scene = self.materialize(renderer, tiles_id)?;
        let view = self.records[self.position(tiles_id)?].node.initial_view();

        renderer.set_view(scene, view);
        let loaded = renderer.switch_to(scene);

        if let Some(stale) = self.pending.replace(PendingLoad { tiles_id: tiles_id.to_owned(), loaded }) {
            debug!(superseded = %stale.tiles_id, "scene switch superseded pending load");
        }
        self.active = Some(tiles_id.to_owned());
        info!(%tiles_id, "scene activated");

        Ok(Activation { tiles_id: tiles_id.to_owned(), scene, view })
    }

    /// Prune the render host if the pending scene has finished loading.
    ///
    /// Returns true when pruning happened. Never blocks.
    pub fn poll_loaded(&mut self, renderer: &mut dyn PanoramaRenderer) -> bool {
        let Some(pending) = self.pending.as_mut() else {
            return false;
        };
        match pending.loaded.try_recv() {
            Ok(()) => {
                self.pending = None;
                renderer.prune_surface(KEEP_CANVASES, KEEP_OVERLAYS);
                true
            }
            Err(oneshot::error::TryRecvError::Empty) => false,
            Err(oneshot::error::TryRecvError::Closed) => {
                debug!(tiles_id = %pending.tiles_id, "load signal dropped; leaving surface as is");
                self.pending = None;
                false
            }
        }
    }

    /// Wait for the pending scene to finish loading, then prune the render host.
    ///
    /// No timeout: if the renderer never signals, this never resolves.
    pub async fn wait_loaded(&mut self, renderer: &mut dyn PanoramaRenderer) -> bool {
        let Some(pending) = self.pending.take() else {
            return false;
        };
        match pending.loaded.await {
            Ok(()) => {
                renderer.prune_surface(KEEP_CANVASES, KEEP_OVERLAYS);
                true
            }
            Err(_) => {
                debug!(tiles_id = %pending.tiles_id, "load signal dropped; leaving surface as is");
                false
            }
        }
    }

    // --- Queries ---

    #[must_use]
    pub fn find_by_tiles_id(&self, tiles_id: &str) -> Option<&SceneRecord> {
        self.index.get(tiles_id).map(|&i| &self.records[i])
    }

    /// Resolve every link hotspot of `tiles_id` to its destination node.
    ///
    /// An unknown source node has no links.
    ///
    /// # Errors
    ///
    /// Returns [`BrokenGraphError`] for the first target missing from the set.
    pub fn find_link_targets(&self, tiles_id: &str) -> Result<Vec<&Node>, BrokenGraphError> {
        let Some(record) = self.find_by_tiles_id(tiles_id) else {
            return Ok(Vec::new());
        };
        record
            .node
            .link_hotspots()
            .iter()
            .map(|link| {
                self.find_by_tiles_id(&link.target)
                    .map(SceneRecord::node)
                    .ok_or_else(|| BrokenGraphError { source_id: tiles_id.to_owned(), target: link.target.clone() })
            })
            .collect()
    }

    /// [`SceneGraph::find_link_targets`], degrading a broken graph to no links.
    #[must_use]
    pub fn link_targets_or_empty(&self, tiles_id: &str) -> Vec<&Node> {
        match self.find_link_targets(tiles_id) {
            Ok(targets) => targets,
            Err(e) => {
                warn!(error = %e, "broken link hotspot; showing no links");
                Vec::new()
            }
        }
    }

    /// Info hotspots of `tiles_id`, or an empty slice for unknown nodes.
    #[must_use]
    pub fn find_info_hotspots(&self, tiles_id: &str) -> &[InfoHotspot] {
        self.find_by_tiles_id(tiles_id).map_or(&[], |r| r.node.info_hotspots())
    }

    /// Display name of `tiles_id`, if loaded.
    #[must_use]
    pub fn name_of(&self, tiles_id: &str) -> Option<&str> {
        self.find_by_tiles_id(tiles_id).map(|r| r.node.name.as_str())
    }

    #[must_use]
    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Renderer scene of the active node, if one is displayed.
    #[must_use]
    pub fn active_scene(&self) -> Option<SceneId> {
        let id = self.active.as_deref()?;
        self.find_by_tiles_id(id)?.handle.as_ref().map(SceneHandle::scene)
    }

    #[must_use]
    pub fn contains(&self, tiles_id: &str) -> bool {
        self.index.contains_key(tiles_id)
    }

    /// Loaded nodes in load order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.records.iter().map(|r| &r.node)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Mutable access to a loaded node, for in-place edits after a save.
    pub fn node_mut(&mut self, tiles_id: &str) -> Option<&mut Node> {
        let idx = *self.index.get(tiles_id)?;
        Some(&mut self.records[idx].node)
    }

    fn position(&self, tiles_id: &str) -> Result<usize, GraphError> {
        self.index
            .get(tiles_id)
            .copied()
            .ok_or_else(|| GraphError::SceneNotFound(tiles_id.to_owned()))
    }
}
