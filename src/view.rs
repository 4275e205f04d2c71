//! Two-way binding between the renderer camera and application view state.
//!
//! DESIGN
//! ======
//! Render→state: [`ViewSynchronizer::on_view_changed`] records what the
//! renderer reports after a user drag. It never touches the renderer, so a
//! drag cannot feed back into itself.
//!
//! State→render: [`ViewSynchronizer::apply_view`] is an instantaneous set,
//! [`ViewSynchronizer::pan_to`] an animated transition. At most one pan is in
//! flight per scene switch; navigation while it runs is refused with
//! [`ViewError::TransitionInFlight`] until the host reports completion or a
//! new scene is entered.

#[cfg(test)]
#[path = "view_test.rs"]
mod view_test;

use tracing::debug;

use crate::node::ViewParams;
use crate::renderer::{PanoramaRenderer, SceneId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ViewError {
    #[error("a view transition is already in flight")]
    TransitionInFlight,
}

/// An animated transition the renderer is running.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub scene: SceneId,
    pub target: ViewParams,
    pub duration_ms: u64,
}

#[derive(Debug, Default)]
pub struct ViewSynchronizer {
    current: ViewParams,
    rotation: f64,
    in_flight: Option<Transition>,
}

impl ViewSynchronizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the renderer's live camera. Cheap; called on every drag frame.
    pub fn on_view_changed(&mut self, params: ViewParams) {
        self.current = params;
        self.rotation = params.yaw;
    }

    /// Set the camera of `scene` instantly.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::TransitionInFlight`] while a pan is running.
    pub fn apply_view(
        &mut self,
        renderer: &mut dyn PanoramaRenderer,
        scene: SceneId,
        params: ViewParams,
    ) -> Result<(), ViewError> {
        self.ensure_idle()?;
        renderer.set_view(scene, params);
        self.on_view_changed(params);
        Ok(())
    }

    /// Animate the camera of `scene` to `params` over `duration_ms`.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::TransitionInFlight`] while another pan is running.
    pub fn pan_to(
        &mut self,
        renderer: &mut dyn PanoramaRenderer,
        scene: SceneId,
        params: ViewParams,
        duration_ms: u64,
    ) -> Result<(), ViewError> {
        self.ensure_idle()?;
        renderer.look_to(scene, params, duration_ms);
        self.in_flight = Some(Transition { scene, target: params, duration_ms });
        debug!(yaw = params.yaw, pitch = params.pitch, duration_ms, "pan started");
        Ok(())
    }

    /// The host observed the end of the running pan.
    pub fn complete_transition(&mut self) {
        if let Some(t) = self.in_flight.take() {
            self.on_view_changed(t.target);
        }
    }

    /// A scene switch reset the camera to `initial`; any pan is abandoned.
    pub fn begin_scene_switch(&mut self, initial: ViewParams) {
        if self.in_flight.take().is_some() {
            debug!("scene switch abandoned running pan");
        }
        self.on_view_changed(initial);
    }

    #[must_use]
    pub fn current(&self) -> ViewParams {
        self.current
    }

    /// Marker counter-rotation: the live yaw.
    #[must_use]
    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    #[must_use]
    pub fn in_flight(&self) -> Option<&Transition> {
        self.in_flight.as_ref()
    }

    fn ensure_idle(&self) -> Result<(), ViewError> {
        if self.in_flight.is_some() { Err(ViewError::TransitionInFlight) } else { Ok(()) }
    }
}
