//! Client and per-site viewer configuration.
//!
//! [`ClientConfig`] comes from the process environment and only describes how
//! to reach the site API. [`ViewerSettings`] is the per-site JSON document the
//! API serves: feature flags plus the view the tour opens on.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::path::Path;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::consts::DEGREES_PER_RADIAN;
use crate::node::ViewParams;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Errors produced while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {var}")]
    MissingVar { var: String },

    #[error("failed to load env file: {0}")]
    EnvFile(String),

    #[error("invalid viewer settings: {0}")]
    Settings(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

/// How to reach the site API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL without trailing slash; endpoint paths start with `/api/`.
    pub api_url: String,
    pub timeouts: ClientTimeouts,
}

impl ClientConfig {
    /// Build client config from environment variables.
    ///
    /// Required:
    /// - `PRISM_API_URL`
    ///
    /// Optional:
    /// - `PRISM_REQUEST_TIMEOUT_SECS`: default 30
    /// - `PRISM_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingVar`] when `PRISM_API_URL` is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_url = std::env::var("PRISM_API_URL")
            .map_err(|_| ConfigError::MissingVar { var: "PRISM_API_URL".into() })?
            .trim_end_matches('/')
            .to_string();
        let timeouts = ClientTimeouts {
            request_secs: env_parse_u64("PRISM_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse_u64("PRISM_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };
        Ok(Self { api_url, timeouts })
    }

    /// Load `path` into the environment, then [`ClientConfig::from_env`].
    ///
    /// Variables already set in the environment win over the file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EnvFile`] if the file cannot be read or parsed.
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        dotenvy::from_path(path.as_ref()).map_err(|e| ConfigError::EnvFile(e.to_string()))?;
        Self::from_env()
    }
}

fn env_parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(v) => v.parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

// =============================================================================
// VIEWER SETTINGS
// =============================================================================

/// Per-site feature toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct FeatureFlags {
    #[serde(default = "enabled")]
    pub timeline: bool,
    /// Rotate minimap markers with the camera.
    #[serde(default = "enabled")]
    pub rotation: bool,
    #[serde(default = "enabled")]
    pub floors: bool,
    /// Show the linked-node navigation list.
    #[serde(default)]
    pub hotspots_nav: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self { timeline: true, rotation: true, floors: true, hotspots_nav: false }
    }
}

fn enabled() -> bool {
    true
}

/// Where the tour opens.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InitialSettings {
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub date: Option<OffsetDateTime>,
    #[serde(default)]
    pub floor: i32,
    #[serde(default)]
    pub pano_id: String,
    #[serde(default)]
    pub yaw: f64,
    #[serde(default)]
    pub pitch: f64,
    #[serde(default)]
    pub fov: f64,
    /// Radians added to every marker rotation so "north" matches the floor plan.
    #[serde(default)]
    pub rotation_offset: f64,
}

impl InitialSettings {
    #[must_use]
    pub fn view(&self) -> ViewParams {
        ViewParams::new(self.yaw, self.pitch, self.fov)
    }

    /// Rotation offset in whole degrees, for display.
    #[must_use]
    pub fn rotation_offset_degrees(&self) -> f64 {
        (self.rotation_offset * DEGREES_PER_RADIAN).round()
    }
}

/// Per-site viewer settings document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ViewerSettings {
    #[serde(default)]
    pub enable: FeatureFlags,
    #[serde(default)]
    pub initial_settings: InitialSettings,
    #[serde(default = "default_mouse_view_mode")]
    pub marzipano_mouse_view_mode: String,
    #[serde(default)]
    pub num_floors: u32,
    #[serde(default)]
    pub site: i64,
}

fn default_mouse_view_mode() -> String {
    "drag".to_string()
}

impl ViewerSettings {
    /// Parse a settings document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Settings`] for malformed JSON.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(|e| ConfigError::Settings(e.to_string()))
    }
}
