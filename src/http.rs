//! reqwest-backed [`SiteApi`].
//!
//! Every call goes through [`HttpSiteApi::get`] or [`HttpSiteApi::patch`],
//! which map transport failures to [`ApiError::Request`] and non-2xx statuses
//! to [`ApiError::Response`] before the envelope is inspected.

#[cfg(test)]
#[path = "http_test.rs"]
mod http_test;

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api::{
    self, ApiError, EmptyFloorsPayload, Endpoint, Envelope, FloorExistence, FloorRecord, SiteApi,
    SurveyNodeRecord, SurveyQuery,
};
use crate::config::ClientConfig;
use crate::node::{Calibration, HotspotDescription, Node, SurveyDate};

pub struct HttpSiteApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpSiteApi {
    /// Build a client against `config.api_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::HttpClientBuild`] if the TLS backend cannot initialize.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| ApiError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: config.api_url.trim_end_matches('/').to_string() })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &Endpoint) -> Result<Envelope<T>, ApiError> {
        debug!(path = %endpoint.path, "GET");
        let response = self
            .http
            .get(self.url(&endpoint.path))
            .query(&endpoint.query)
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        read_envelope(response).await
    }

    async fn patch(&self, endpoint: &Endpoint, body: &impl Serialize) -> Result<(), ApiError> {
        debug!(path = %endpoint.path, "PATCH");
        let response = self
            .http
            .patch(self.url(&endpoint.path))
            .query(&endpoint.query)
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        let envelope: Envelope<serde_json::Value> = read_envelope(response).await?;
        if envelope.success { Ok(()) } else { Err(ApiError::Rejected(envelope.message)) }
    }
}

async fn read_envelope<T: DeserializeOwned>(response: reqwest::Response) -> Result<Envelope<T>, ApiError> {
    let status = response.status().as_u16();
    let text = response
        .text()
        .await
        .map_err(|e| ApiError::Request(e.to_string()))?;
    parse_envelope(status, &text)
}

pub(crate) fn parse_envelope<T: DeserializeOwned>(status: u16, text: &str) -> Result<Envelope<T>, ApiError> {
    if !(200..300).contains(&status) {
        return Err(ApiError::Response { status, body: text.to_string() });
    }
    serde_json::from_str(text).map_err(|e| ApiError::Parse(e.to_string()))
}

// =============================================================================
// WRITE BODIES
// =============================================================================

#[derive(Serialize)]
struct CoordinatesBody {
    x: f64,
    y: f64,
}

#[derive(Serialize)]
struct RotationBody {
    rotation: f64,
}

#[derive(Serialize)]
struct NameBody<'a> {
    tiles_name: &'a str,
}

#[derive(Serialize)]
pub(crate) struct FloorDetailsBody<'a> {
    pub(crate) floor_name: &'a str,
    pub(crate) floor_tag: &'a str,
    pub(crate) floor: i32,
}

#[async_trait::async_trait]
impl SiteApi for HttpSiteApi {
    async fn fetch_survey_nodes(&self, query: &SurveyQuery) -> Result<Vec<Node>, ApiError> {
        let date = query.date_param();
        let endpoint = api::survey_nodes_endpoint(&query.site_id, query.floor, date.as_deref());
        let records: Vec<SurveyNodeRecord> = self.get(&endpoint).await?.into_payload_or_default();
        Ok(records.into_iter().map(Node::from).collect())
    }

    async fn fetch_calibration(&self, site_id: &str, floor: i32) -> Result<Calibration, ApiError> {
        let envelope: Envelope<Calibration> = self.get(&api::calibration_endpoint(site_id, floor)).await?;
        Ok(envelope.into_payload_or_default())
    }

    async fn fetch_floors(&self, site_id: &str, date: Option<&str>) -> Result<Vec<i32>, ApiError> {
        let records: Vec<FloorRecord> = self.get(&api::floors_endpoint(site_id, date)).await?.into_payload()?;
        Ok(records.into_iter().map(|r| r.floor).collect())
    }

    async fn fetch_empty_floors(&self, site_id: &str) -> Result<Vec<i32>, ApiError> {
        let payload: EmptyFloorsPayload = self.get(&api::empty_floors_endpoint(site_id)).await?.into_payload()?;
        Ok(payload.empty_floors)
    }

    async fn floor_exists(&self, site_id: &str, floor: i32) -> Result<FloorExistence, ApiError> {
        self.get(&api::floor_exists_endpoint(site_id, floor)).await?.into_payload()
    }

    async fn fetch_surveys(&self, site_id: &str, floor: Option<i32>) -> Result<Vec<SurveyDate>, ApiError> {
        let envelope: Envelope<Vec<SurveyDate>> = self.get(&api::surveys_endpoint(site_id, floor)).await?;
        Ok(envelope.into_payload_or_default())
    }

    async fn fetch_hotspot_descriptions(
        &self,
        tiles_id: &str,
        site_id: &str,
    ) -> Result<Vec<HotspotDescription>, ApiError> {
        let envelope: Envelope<Vec<HotspotDescription>> =
            self.get(&api::hotspot_descriptions_endpoint(site_id, tiles_id)).await?;
        Ok(envelope.into_payload_or_default())
    }

    async fn update_node_coordinates(&self, tiles_id: &str, x: f64, y: f64) -> Result<(), ApiError> {
        self.patch(&api::node_coordinates_endpoint(tiles_id), &CoordinatesBody { x, y }).await
    }

    async fn update_node_rotation(&self, tiles_id: &str, radians: f64) -> Result<(), ApiError> {
        self.patch(&api::node_rotation_endpoint(tiles_id), &RotationBody { rotation: radians }).await
    }

    async fn update_node_name(&self, tiles_id: &str, name: &str) -> Result<(), ApiError> {
        self.patch(&api::node_name_endpoint(tiles_id), &NameBody { tiles_name: name }).await
    }

    async fn update_floor_details(&self, site_id: &str, floor: i32, tag: &str, name: &str) -> Result<(), ApiError> {
        let body = FloorDetailsBody { floor_name: name, floor_tag: tag, floor };
        self.patch(&api::floor_details_endpoint(site_id), &body).await
    }

    async fn add_empty_floor(&self, site_id: &str, floor: i32) -> Result<(), ApiError> {
        let envelope: Envelope<serde_json::Value> = self.get(&api::add_empty_floor_endpoint(site_id, floor)).await?;
        if envelope.success { Ok(()) } else { Err(ApiError::Rejected(envelope.message)) }
    }
}
