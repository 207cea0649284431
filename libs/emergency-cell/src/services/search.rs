// libs/emergency-cell/src/services/search.rs
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, error, info, instrument, warn};

use shared_config::{AppConfig, PlaceSearchConfig};

use crate::models::{Coordinate, PlaceRecord, RawPlace, SearchError};

/// Client for the public place-search endpoint (Nominatim-compatible `/search`).
/// One outbound request per call, no retry, no caching.
pub struct ProximitySearchClient {
    client: Client,
    config: PlaceSearchConfig,
}

impl ProximitySearchClient {
    pub fn new(config: &AppConfig) -> Result<Self, SearchError> {
        let client = Client::builder()
            .user_agent(config.place_search.user_agent.clone())
            .timeout(Duration::from_secs(config.place_search.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            config: config.place_search.clone(),
        })
    }

    /// `left,top,right,bottom` box of ±half-span degrees around the origin.
    pub fn viewbox(&self, origin: Coordinate) -> String {
        viewbox_for(origin, self.config.viewbox_half_span_deg)
    }

    /// Search for hospitals inside the viewbox around `origin`.
    /// Records come back in service order.
    #[instrument(skip(self))]
    pub async fn search_hospitals(&self, origin: Coordinate) -> Result<Vec<PlaceRecord>, SearchError> {
        let url = format!("{}/search", self.config.base_url.trim_end_matches('/'));
        let limit = self.config.raw_limit.to_string();
        let viewbox = self.viewbox(origin);

        debug!("Sending place search request to: {} (viewbox={})", url, viewbox);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("format", "json"),
                ("q", self.config.query.as_str()),
                ("limit", limit.as_str()),
                ("bounded", "1"),
                ("viewbox", viewbox.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                error!("Place search request failed: {}", e);
                SearchError::Transport(e)
            })?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            error!("Place search failed: {} - {}", status, response_text);
            return Err(SearchError::Status {
                status: status.as_u16(),
                body: response_text,
            });
        }

        let raw_places: Vec<RawPlace> = serde_json::from_str(&response_text).map_err(|e| {
            error!("Failed to parse place search response: {}", e);
            SearchError::Parse(e)
        })?;

        let total = raw_places.len();
        let places: Vec<PlaceRecord> = raw_places
            .into_iter()
            .filter_map(|raw| match PlaceRecord::try_from(raw) {
                Ok(place) => Some(place),
                Err(e) => {
                    warn!("Skipping place search result: {}", e);
                    None
                }
            })
            .collect();

        info!("Place search returned {} results ({} usable)", total, places.len());
        Ok(places)
    }
}

pub fn viewbox_for(origin: Coordinate, half_span_deg: f64) -> String {
    format!(
        "{},{},{},{}",
        origin.longitude - half_span_deg,
        origin.latitude + half_span_deg,
        origin.longitude + half_span_deg,
        origin.latitude - half_span_deg,
    )
}
