//! Admin node repositioning on the minimap.
//!
//! DESIGN
//! ======
//! Three states: `Viewing` (markers show committed positions), `Selecting`
//! (edit mode on, no node picked yet), and `Editing` (one node picked, its
//! working values adjustable). Working values start from the node's
//! calibrated percent position and whole-degree rotation; a snapshot of
//! those starting values backs the dirty check.
//!
//! Numeric input goes through a per-field [`FieldBounds`]. Rotation is a true
//! cycle and always wraps; position fields wrap too unless configured with
//! [`WrapPolicy::Clamp`].
//!
//! SAVE
//! ====
//! Writes run in order: coordinates, rotation, then the display name when it
//! changed. If a write fails after earlier ones succeeded, the earlier ones
//! are reverted to the committed values in reverse order. The session stays
//! open after a failure so the admin can retry.

#[cfg(test)]
#[path = "editor_test.rs"]
mod editor_test;

use tracing::{error, info, warn};

use crate::api::{ApiError, SiteApi};
use crate::consts::{POSITION_MAX, POSITION_MIN, ROTATION_MAX, ROTATION_MIN, ROTATION_STEP_DEG};
use crate::coords::{self, Point};
use crate::node::{Calibration, Node, Placement, TilesId};

// =============================================================================
// FIELD POLICY
// =============================================================================

/// What happens when typed input reaches a field's bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapPolicy {
    /// Minimum wraps to maximum, maximum (or empty input) wraps to minimum.
    Cyclic,
    /// Values are held inside `[min, max]`.
    Clamp,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldBounds {
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub policy: WrapPolicy,
}

impl FieldBounds {
    #[must_use]
    pub fn rotation() -> Self {
        Self { min: ROTATION_MIN, max: ROTATION_MAX, step: ROTATION_STEP_DEG, policy: WrapPolicy::Cyclic }
    }

    #[must_use]
    pub fn position(policy: WrapPolicy) -> Self {
        Self { min: POSITION_MIN, max: POSITION_MAX, step: 1.0, policy }
    }

    /// Resolve typed `raw` input. `None` means the input is ignored.
    #[must_use]
    pub fn accept(&self, raw: &str) -> Option<f64> {
        match self.policy {
            WrapPolicy::Cyclic => {
                if raw == self.min.to_string() {
                    Some(self.max)
                } else if raw == self.max.to_string() || raw.is_empty() {
                    Some(self.min)
                } else {
                    parse_leading_int(raw).filter(|v| *v <= self.max)
                }
            }
            WrapPolicy::Clamp => {
                if raw.is_empty() {
                    return Some(self.min);
                }
                parse_leading_int(raw).map(|v| v.clamp(self.min, self.max))
            }
        }
    }

    /// One spinner step from `value`, routed through [`FieldBounds::accept`].
    #[must_use]
    pub fn step_from(&self, value: f64, up: bool) -> Option<f64> {
        let delta = if up { self.step } else { -self.step };
        let next = (value.round() + delta).clamp(self.min, self.max);
        self.accept(&next.to_string())
    }
}

/// Integer prefix of `raw`, the way a browser number field reads it.
fn parse_leading_int(raw: &str) -> Option<f64> {
    let trimmed = raw.trim_start();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let end = digits.find(|c: char| !c.is_ascii_digit()).unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    match digits[..end].parse::<f64>() {
        Ok(v) => Some(sign * v),
        Err(_) => None,
    }
}

/// Bounds for each editable numeric field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSet {
    pub x: FieldBounds,
    pub y: FieldBounds,
    pub rotation: FieldBounds,
}

impl Default for FieldSet {
    fn default() -> Self {
        Self::with_position_policy(WrapPolicy::Cyclic)
    }
}

impl FieldSet {
    #[must_use]
    pub fn with_position_policy(policy: WrapPolicy) -> Self {
        Self { x: FieldBounds::position(policy), y: FieldBounds::position(policy), rotation: FieldBounds::rotation() }
    }

    fn bounds(&self, field: EditField) -> FieldBounds {
        match field {
            EditField::X => self.x,
            EditField::Y => self.y,
            EditField::Rotation => self.rotation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditField {
    X,
    Y,
    Rotation,
}

// =============================================================================
// STATE
// =============================================================================

/// Form values while a node is being edited.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingValues {
    /// Percent position.
    pub x: f64,
    pub y: f64,
    /// Whole degrees.
    pub rotation_deg: f64,
    pub name: String,
}

impl WorkingValues {
    fn get(&self, field: EditField) -> f64 {
        match field {
            EditField::X => self.x,
            EditField::Y => self.y,
            EditField::Rotation => self.rotation_deg,
        }
    }

    fn set(&mut self, field: EditField, value: f64) {
        match field {
            EditField::X => self.x = value,
            EditField::Y => self.y = value,
            EditField::Rotation => self.rotation_deg = value,
        }
    }
}

/// One node under edit.
#[derive(Debug, Clone, PartialEq)]
pub struct EditSession {
    pub tiles_id: TilesId,
    /// Values at selection time.
    pub snapshot: WorkingValues,
    pub working: WorkingValues,
    /// Persisted placement at selection time (raw pixels, radians).
    pub committed: Placement,
    pub committed_name: String,
}

impl EditSession {
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_dirty(&self) -> bool {
        self.working.rotation_deg != self.snapshot.rotation_deg
            || self.working.x != self.snapshot.x
            || self.working.y != self.snapshot.y
            || self.working.name.trim() != self.snapshot.name.trim()
    }

    /// The working position differs from the one captured at selection.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn moved(&self) -> bool {
        self.working.x != self.snapshot.x || self.working.y != self.snapshot.y
    }

    /// Committed marker rotation in whole degrees, for display.
    #[must_use]
    pub fn committed_rotation_display(&self) -> f64 {
        coords::radians_to_degrees(self.committed.rotation).round()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum EditorState {
    #[default]
    Viewing,
    Selecting,
    Editing(EditSession),
}

/// Result of pressing the edit/save toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    /// Edit mode on; waiting for a marker click.
    Selecting,
    /// Back to viewing; nothing to write.
    Viewing,
    /// The session has changes; the host should call save.
    SaveRequested,
}

#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error("no node is being edited")]
    NotEditing,

    #[error("edit mode is not waiting for a node selection")]
    NotSelecting,

    #[error("node {0} has no minimap placement")]
    NotPlaced(TilesId),

    #[error("floor has no usable minimap calibration")]
    MissingCalibration,

    #[error("nothing changed")]
    NoChanges,

    #[error("{stage} update failed for {tiles_id}: {source}")]
    WriteFailed {
        tiles_id: TilesId,
        stage: WriteStage,
        #[source]
        source: ApiError,
        compensation: Compensation,
    },
}

/// One persistence call of the save path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStage {
    Coordinates,
    Rotation,
    Name,
}

impl std::fmt::Display for WriteStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Coordinates => "coordinates",
            Self::Rotation => "rotation",
            Self::Name => "name",
        })
    }
}

/// What happened to writes that had already succeeded when a later one failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compensation {
    /// The first write failed; nothing was committed.
    NotNeeded,
    /// Every earlier write was reverted.
    Restored(Vec<WriteStage>),
    /// Some reverts failed; these stages may hold the new values.
    Incomplete(Vec<WriteStage>),
}

/// Persisted result of a successful save.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedNode {
    pub tiles_id: TilesId,
    pub placement: Placement,
    pub name: String,
}

impl SavedNode {
    /// Fold the saved values into an in-memory node.
    pub fn apply_to(&self, node: &mut Node) {
        node.placement = Some(self.placement);
        node.name.clone_from(&self.name);
    }
}

/// Every write a save will issue, computed up front.
#[derive(Debug, Clone, PartialEq)]
pub struct SavePlan {
    pub tiles_id: TilesId,
    pub raw: Point,
    pub radians: f64,
    /// New display name, when it changed.
    pub name: Option<String>,
    pub committed: Placement,
    pub committed_name: String,
}

// =============================================================================
// EDITOR
// =============================================================================

#[derive(Debug, Default)]
pub struct NodeEditor {
    state: EditorState,
    fields: FieldSet,
}

impl NodeEditor {
    #[must_use]
    pub fn new(fields: FieldSet) -> Self {
        Self { state: EditorState::Viewing, fields }
    }

    #[must_use]
    pub fn state(&self) -> &EditorState {
        &self.state
    }

    #[must_use]
    pub fn session(&self) -> Option<&EditSession> {
        match &self.state {
            EditorState::Editing(session) => Some(session),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_selecting(&self) -> bool {
        matches!(self.state, EditorState::Selecting)
    }

    /// The edit/save toggle button.
    pub fn toggle(&mut self) -> Toggle {
        match &self.state {
            EditorState::Viewing => {
                self.state = EditorState::Selecting;
                Toggle::Selecting
            }
            EditorState::Selecting => {
                self.state = EditorState::Viewing;
                Toggle::Viewing
            }
            EditorState::Editing(session) if session.is_dirty() => Toggle::SaveRequested,
            EditorState::Editing(_) => {
                self.state = EditorState::Viewing;
                Toggle::Viewing
            }
        }
    }

    /// Pick `node` while selecting.
    ///
    /// # Errors
    ///
    /// [`EditError::NotSelecting`] outside selection mode,
    /// [`EditError::NotPlaced`] for nodes without a placement, and
    /// [`EditError::MissingCalibration`] when the floor has no minimap.
    pub fn select(&mut self, node: &Node, calibration: &Calibration) -> Result<(), EditError> {
        if !self.is_selecting() {
            return Err(EditError::NotSelecting);
        }
        let placement = node.placement.ok_or_else(|| EditError::NotPlaced(node.tiles_id.clone()))?;
        if !calibration.is_usable() {
            return Err(EditError::MissingCalibration);
        }

        let percent = coords::percent_position(calibration, &placement);
        let values = WorkingValues {
            x: percent.x,
            y: percent.y,
            rotation_deg: coords::working_degrees(placement.rotation),
            name: node.name.clone(),
        };
        info!(tiles_id = %node.tiles_id, x = values.x, y = values.y, "node selected for edit");

        self.state = EditorState::Editing(EditSession {
            tiles_id: node.tiles_id.clone(),
            snapshot: values.clone(),
            working: values,
            committed: placement,
            committed_name: node.name.clone(),
        });
        Ok(())
    }

    /// Typed input for `field`. Returns the field's value afterwards.
    ///
    /// # Errors
    ///
    /// [`EditError::NotEditing`] when no node is selected.
    pub fn set_input(&mut self, field: EditField, raw: &str) -> Result<f64, EditError> {
        let bounds = self.fields.bounds(field);
        let session = self.session_mut()?;
        if let Some(value) = bounds.accept(raw) {
            session.working.set(field, value);
        }
        Ok(session.working.get(field))
    }

    /// Spinner step for `field`. Returns the field's value afterwards.
    ///
    /// # Errors
    ///
    /// [`EditError::NotEditing`] when no node is selected.
    pub fn step(&mut self, field: EditField, up: bool) -> Result<f64, EditError> {
        let bounds = self.fields.bounds(field);
        let session = self.session_mut()?;
        if let Some(value) = bounds.step_from(session.working.get(field), up) {
            session.working.set(field, value);
        }
        Ok(session.working.get(field))
    }

    /// Drag the marker to a percent position. Raw drag positions are not
    /// subject to the typed-input wrap policy.
    ///
    /// # Errors
    ///
    /// [`EditError::NotEditing`] when no node is selected.
    pub fn move_to(&mut self, position: Point) -> Result<(), EditError> {
        let session = self.session_mut()?;
        session.working.x = position.x;
        session.working.y = position.y;
        Ok(())
    }

    /// # Errors
    ///
    /// [`EditError::NotEditing`] when no node is selected.
    pub fn set_name(&mut self, name: &str) -> Result<(), EditError> {
        self.session_mut()?.working.name = name.to_owned();
        Ok(())
    }

    /// Save is enabled only when something differs from the selection snapshot.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.session().is_some_and(EditSession::is_dirty)
    }

    /// Discard the session and leave edit mode. No writes.
    pub fn cancel(&mut self) {
        if let EditorState::Editing(session) = &self.state {
            info!(tiles_id = %session.tiles_id, "edit cancelled");
        }
        self.state = EditorState::Viewing;
    }

    /// Compute the writes for the current session.
    ///
    /// # Errors
    ///
    /// [`EditError::NotEditing`], [`EditError::NoChanges`] for a clean
    /// session, and [`EditError::MissingCalibration`].
    pub fn plan_save(&self, calibration: &Calibration) -> Result<SavePlan, EditError> {
        let session = self.session().ok_or(EditError::NotEditing)?;
        if !session.is_dirty() {
            return Err(EditError::NoChanges);
        }
        if !calibration.is_usable() {
            return Err(EditError::MissingCalibration);
        }
        let new_name = session.working.name.trim();
        let name = (new_name != session.committed_name.trim() && !new_name.is_empty()).then(|| new_name.to_owned());
        // An unmoved marker keeps its stored pixels exactly.
        let raw = if session.moved() {
            coords::raw_position(calibration, Point::new(session.working.x, session.working.y))
        } else {
            Point::new(session.committed.x, session.committed.y)
        };
        Ok(SavePlan {
            tiles_id: session.tiles_id.clone(),
            raw,
            radians: coords::degrees_to_radians(session.working.rotation_deg),
            name,
            committed: session.committed,
            committed_name: session.committed_name.clone(),
        })
    }

    /// Record the result of [`execute_save`]. Success closes the session.
    ///
    /// # Errors
    ///
    /// Passes through the save error; the session stays open.
    pub fn finish_save(&mut self, result: Result<SavedNode, EditError>) -> Result<SavedNode, EditError> {
        let saved = result?;
        self.state = EditorState::Viewing;
        Ok(saved)
    }

    /// Plan, execute, and finish a save in one call.
    ///
    /// # Errors
    ///
    /// See [`NodeEditor::plan_save`] and [`execute_save`].
    pub async fn save(&mut self, api: &dyn SiteApi, calibration: &Calibration) -> Result<SavedNode, EditError> {
        let plan = self.plan_save(calibration)?;
        let result = execute_save(api, &plan).await;
        self.finish_save(result)
    }

    /// Leaving the enlarged minimap drops any selection.
    pub fn reset(&mut self) {
        self.state = EditorState::Viewing;
    }

    fn session_mut(&mut self) -> Result<&mut EditSession, EditError> {
        match &mut self.state {
            EditorState::Editing(session) => Ok(session),
            _ => Err(EditError::NotEditing),
        }
    }
}

/// Issue the writes of `plan` in order, reverting earlier ones on failure.
///
/// # Errors
///
/// [`EditError::WriteFailed`] naming the failed stage and what compensation achieved.
pub async fn execute_save(api: &dyn SiteApi, plan: &SavePlan) -> Result<SavedNode, EditError> {
    let id = plan.tiles_id.as_str();
    let mut done: Vec<WriteStage> = Vec::with_capacity(3);

    let mut stages = vec![WriteStage::Coordinates, WriteStage::Rotation];
    if plan.name.is_some() {
        stages.push(WriteStage::Name);
    }

    for stage in stages {
        let result = match stage {
            WriteStage::Coordinates => api.update_node_coordinates(id, plan.raw.x, plan.raw.y).await,
            WriteStage::Rotation => api.update_node_rotation(id, plan.radians).await,
            WriteStage::Name => match &plan.name {
                Some(name) => api.update_node_name(id, name).await,
                None => Ok(()),
            },
        };
        if let Err(source) = result {
            error!(tiles_id = %id, %stage, error = %source, "node save failed");
            let compensation = compensate(api, plan, &done).await;
            return Err(EditError::WriteFailed { tiles_id: plan.tiles_id.clone(), stage, source, compensation });
        }
        done.push(stage);
    }

    info!(tiles_id = %id, x = plan.raw.x, y = plan.raw.y, radians = plan.radians, "node saved");
    Ok(SavedNode {
        tiles_id: plan.tiles_id.clone(),
        placement: Placement { x: plan.raw.x, y: plan.raw.y, rotation: plan.radians, ..plan.committed },
        name: plan.name.clone().unwrap_or_else(|| plan.committed_name.clone()),
    })
}

async fn compensate(api: &dyn SiteApi, plan: &SavePlan, done: &[WriteStage]) -> Compensation {
    if done.is_empty() {
        return Compensation::NotNeeded;
    }
    let id = plan.tiles_id.as_str();
    let mut restored = Vec::new();
    let mut failed = Vec::new();
    for &stage in done.iter().rev() {
        let result = match stage {
            WriteStage::Coordinates => api.update_node_coordinates(id, plan.committed.x, plan.committed.y).await,
            WriteStage::Rotation => api.update_node_rotation(id, plan.committed.rotation).await,
            WriteStage::Name => api.update_node_name(id, &plan.committed_name).await,
        };
        match result {
            Ok(()) => restored.push(stage),
            Err(e) => {
                warn!(tiles_id = %id, %stage, error = %e, "revert failed");
                failed.push(stage);
            }
        }
    }
    if failed.is_empty() { Compensation::Restored(restored) } else { Compensation::Incomplete(failed) }
}
