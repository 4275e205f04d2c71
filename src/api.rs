//! Persistence collaborator: request/response contracts for the site API.
//!
//! DESIGN
//! ======
//! [`SiteApi`] is the async seam every fetch and write goes through, so the
//! coordinator and editor can be driven by an in-memory fake in tests and by
//! [`crate::http::HttpSiteApi`] in production. Wire records are folded into
//! the normalized [`Node`] here and nowhere else.
//!
//! ERROR HANDLING
//! ==============
//! Every failure is an [`ApiError`]. The API wraps payloads in a
//! `{ success, payload, message }` envelope; `success: false` becomes
//! [`ApiError::Rejected`] carrying the server's message.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use serde::{Deserialize, Deserializer};
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};

use crate::node::{Calibration, HotspotDescription, Node, Placement, SceneFacet, SurveyDate};

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by site API calls.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request could not be sent or its body could not be read.
    #[error("request failed: {0}")]
    Request(String),

    /// The server answered with a non-success HTTP status.
    #[error("server responded with status {status}")]
    Response { status: u16, body: String },

    /// The response body was not the expected JSON.
    #[error("response parse failed: {0}")]
    Parse(String),

    /// The server answered `success: false`.
    #[error("rejected by server: {0}")]
    Rejected(String),

    /// The request was superseded by a newer one and aborted.
    #[error("request superseded")]
    Superseded,

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ApiError {
    /// Stable machine-readable code for logs.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Request(_) => "E_API_REQUEST",
            Self::Response { .. } => "E_API_RESPONSE",
            Self::Parse(_) => "E_API_PARSE",
            Self::Rejected(_) => "E_API_REJECTED",
            Self::Superseded => "E_SUPERSEDED",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    /// Whether repeating the same request could succeed.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Response { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// QUERIES
// =============================================================================

/// Selects one node set: a site's floor on a survey date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveyQuery {
    pub site_id: String,
    pub floor: i32,
    /// `None` asks the server for its default (latest) survey.
    pub date: Option<OffsetDateTime>,
}

impl SurveyQuery {
    /// Survey date as the RFC 3339 string the API expects.
    #[must_use]
    pub fn date_param(&self) -> Option<String> {
        self.date.and_then(format_date)
    }
}

/// Format a survey date for query strings, always in UTC.
#[must_use]
pub fn format_date(date: OffsetDateTime) -> Option<String> {
    match date.to_offset(UtcOffset::UTC).format(&Rfc3339) {
        Ok(s) => Some(s),
        Err(e) => {
            tracing::warn!(error = %e, "unformattable survey date");
            None
        }
    }
}

/// Whether a floor has at least one populated survey.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorExistence {
    pub site_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub floor: String,
    pub floor_populated: bool,
}

// =============================================================================
// TRAIT
// =============================================================================

/// The site API as consumed by the viewer core.
#[async_trait::async_trait]
pub trait SiteApi: Send + Sync {
    /// Node set for one site/floor/date. An unsuccessful envelope yields no nodes.
    async fn fetch_survey_nodes(&self, query: &SurveyQuery) -> Result<Vec<Node>, ApiError>;

    /// Minimap calibration for a floor; an empty record when none was uploaded.
    async fn fetch_calibration(&self, site_id: &str, floor: i32) -> Result<Calibration, ApiError>;

    /// Floors with a populated survey on `date`.
    async fn fetch_floors(&self, site_id: &str, date: Option<&str>) -> Result<Vec<i32>, ApiError>;

    /// Floors that exist but hold no survey yet.
    async fn fetch_empty_floors(&self, site_id: &str) -> Result<Vec<i32>, ApiError>;

    async fn floor_exists(&self, site_id: &str, floor: i32) -> Result<FloorExistence, ApiError>;

    /// All surveys of a site, optionally limited to one floor.
    async fn fetch_surveys(&self, site_id: &str, floor: Option<i32>) -> Result<Vec<SurveyDate>, ApiError>;

    async fn fetch_hotspot_descriptions(&self, tiles_id: &str, site_id: &str)
    -> Result<Vec<HotspotDescription>, ApiError>;

    /// Persist a node's raw pixel position.
    async fn update_node_coordinates(&self, tiles_id: &str, x: f64, y: f64) -> Result<(), ApiError>;

    /// Persist a node's marker rotation in radians.
    async fn update_node_rotation(&self, tiles_id: &str, radians: f64) -> Result<(), ApiError>;

    /// Persist a node's display name.
    async fn update_node_name(&self, tiles_id: &str, name: &str) -> Result<(), ApiError>;

    /// Rename a floor's tag and display name.
    async fn update_floor_details(&self, site_id: &str, floor: i32, tag: &str, name: &str) -> Result<(), ApiError>;

    /// Register a floor that has no survey yet.
    async fn add_empty_floor(&self, site_id: &str, floor: i32) -> Result<(), ApiError>;
}

// =============================================================================
// ENDPOINTS
// =============================================================================

/// A request path and its query parameters. Values are left unencoded; the
/// HTTP client encodes them when the request is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Endpoint {
    pub(crate) path: String,
    pub(crate) query: Vec<(&'static str, String)>,
}

impl Endpoint {
    fn new(path: String) -> Self {
        Self { path, query: Vec::new() }
    }

    fn param(mut self, key: &'static str, value: impl ToString) -> Self {
        self.query.push((key, value.to_string()));
        self
    }

    fn param_opt(self, key: &'static str, value: Option<impl ToString>) -> Self {
        match value {
            Some(v) => self.param(key, v),
            None => self,
        }
    }
}

pub(crate) fn survey_nodes_endpoint(site_id: &str, floor: i32, date: Option<&str>) -> Endpoint {
    Endpoint::new(format!("/api/site/{site_id}/survey/details"))
        .param("floor", floor)
        .param_opt("date", date)
}

pub(crate) fn calibration_endpoint(site_id: &str, floor: i32) -> Endpoint {
    Endpoint::new(format!("/api/site/{site_id}/minimap/details")).param("floor", floor)
}

pub(crate) fn floors_endpoint(site_id: &str, date: Option<&str>) -> Endpoint {
    Endpoint::new(format!("/api/site/{site_id}/minimap/floors")).param_opt("date", date)
}

pub(crate) fn empty_floors_endpoint(site_id: &str) -> Endpoint {
    Endpoint::new(format!("/api/site/{site_id}/emptyFloors"))
}

pub(crate) fn floor_exists_endpoint(site_id: &str, floor: i32) -> Endpoint {
    Endpoint::new(format!("/api/site/{site_id}/{floor}/exists"))
}

pub(crate) fn surveys_endpoint(site_id: &str, floor: Option<i32>) -> Endpoint {
    Endpoint::new(format!("/api/site/{site_id}/survey/details/compact")).param_opt("floor", floor)
}

pub(crate) fn hotspot_descriptions_endpoint(site_id: &str, tiles_id: &str) -> Endpoint {
    Endpoint::new(format!("/api/site/{site_id}/hotspot/details")).param("tilesId", tiles_id)
}

pub(crate) fn node_coordinates_endpoint(tiles_id: &str) -> Endpoint {
    Endpoint::new(format!("/api/node/coords/{tiles_id}"))
}

pub(crate) fn node_rotation_endpoint(tiles_id: &str) -> Endpoint {
    Endpoint::new(format!("/api/node/rotation/{tiles_id}"))
}

pub(crate) fn node_name_endpoint(tiles_id: &str) -> Endpoint {
    Endpoint::new(format!("/api/node/tileName/{tiles_id}"))
}

pub(crate) fn floor_details_endpoint(site_id: &str) -> Endpoint {
    Endpoint::new(format!("/api/site/{site_id}/sitemap"))
}

pub(crate) fn add_empty_floor_endpoint(site_id: &str, floor: i32) -> Endpoint {
    Endpoint::new(format!("/api/site/{site_id}/minimap/newFloor/{floor}"))
}

// =============================================================================
// WIRE TYPES
// =============================================================================

/// `{ success, payload, message }` wrapper around every API response.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub(crate) success: bool,
    pub(crate) payload: Option<T>,
    #[serde(default)]
    pub(crate) message: String,
}

impl<T> Envelope<T> {
    /// The payload of a successful envelope.
    pub(crate) fn into_payload(self) -> Result<T, ApiError> {
        if !self.success {
            return Err(ApiError::Rejected(self.message));
        }
        self.payload
            .ok_or_else(|| ApiError::Parse("successful response without payload".into()))
    }
}

impl<T: Default> Envelope<T> {
    /// The payload, or its default when the server reports no data.
    pub(crate) fn into_payload_or_default(self) -> T {
        if self.success { self.payload.unwrap_or_default() } else { T::default() }
    }
}

/// One node as returned by the survey-details endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct SurveyNodeRecord {
    pub(crate) floor: i32,
    pub(crate) survey_node: SurveyNodeWire,
    pub(crate) x: f64,
    pub(crate) y: f64,
    #[serde(default)]
    pub(crate) rotation: f64,
    #[serde(default)]
    pub(crate) site: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SurveyNodeWire {
    pub(crate) tiles_id: String,
    #[serde(default)]
    pub(crate) tiles_name: String,
    #[serde(flatten)]
    pub(crate) facet: SceneFacet,
}

impl From<SurveyNodeRecord> for Node {
    fn from(record: SurveyNodeRecord) -> Self {
        Node {
            tiles_id: record.survey_node.tiles_id,
            name: record.survey_node.tiles_name,
            site: record.site,
            scene: Some(record.survey_node.facet),
            placement: Some(Placement { floor: record.floor, x: record.x, y: record.y, rotation: record.rotation }),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct EmptyFloorsPayload {
    #[serde(rename = "emptyFloors", default)]
    pub(crate) empty_floors: Vec<i32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FloorRecord {
    pub(crate) floor: i32,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("expected string or number, got {other}"))),
    }
}
