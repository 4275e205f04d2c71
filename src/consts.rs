//! Shared numeric constants for the prism crate.

// ── Minimap geometry ────────────────────────────────────────────

/// Percent scale: a coordinate of 100 sits on the far edge of the floor plan.
pub const PERCENTAGE: f64 = 100.0;

/// Visual margin (in percent) applied when a marker falls outside the map.
pub const NODE_OFFSET: f64 = 5.0;

/// Upper renderable bound for marker positions, in percent.
pub const UPPER_BOUND: f64 = 100.0;

/// Lower renderable bound for marker positions, in percent.
pub const LOWER_BOUND: f64 = 0.0;

// ── Rotation ────────────────────────────────────────────────────

/// Degrees in a full turn.
pub const DEGREES_PER_TURN: f64 = 360.0;

/// Degrees per radian as stored by the minimap editor (five significant digits).
pub const DEGREES_PER_RADIAN: f64 = 57.2958;

/// Base angle (−π/4) added to every marker's rotation so the arrow glyph points up.
pub const MARKER_ROTATION_OFFSET: f64 = -0.785_398;

/// Increment applied by the rotation spinner, in degrees.
pub const ROTATION_STEP_DEG: f64 = 15.0;

// ── Editor bounds ───────────────────────────────────────────────

/// Rotation input bounds in degrees.
pub const ROTATION_MIN: f64 = 0.0;
pub const ROTATION_MAX: f64 = 360.0;

/// Position input bounds in percent.
pub const POSITION_MIN: f64 = 0.0;
pub const POSITION_MAX: f64 = 100.0;

// ── Renderer ────────────────────────────────────────────────────

/// Duration of the animated pan used for info-hotspot navigation.
pub const PAN_DURATION_MS: u64 = 1500;

/// Minimum field of view accepted by the rectilinear view limiter (100°).
pub const FOV_LIMIT_MIN: f64 = 100.0 * std::f64::consts::PI / 180.0;

/// Maximum field of view accepted by the rectilinear view limiter (120°).
pub const FOV_LIMIT_MAX: f64 = 120.0 * std::f64::consts::PI / 180.0;

/// Draw surfaces kept on the render host after a scene finishes loading.
pub const KEEP_CANVASES: usize = 2;

/// Overlay containers kept on the render host after a scene finishes loading.
pub const KEEP_OVERLAYS: usize = 2;
