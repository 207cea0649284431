use std::time::Duration;

use serde_json::{json, Value};

use shared_config::AppConfig;

pub struct TestConfig {
    pub place_search_base_url: String,
    pub search_radius_km: f64,
    pub max_results: usize,
    pub acceptance_delay: Duration,
    pub status_period: Duration,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            place_search_base_url: "http://localhost:54321".to_string(),
            search_radius_km: 3.0,
            max_results: 8,
            acceptance_delay: Duration::from_secs(10),
            status_period: Duration::from_secs(3),
        }
    }
}

impl TestConfig {
    /// Point the place search at a mock server.
    pub fn with_search_url(url: impl Into<String>) -> Self {
        Self {
            place_search_base_url: url.into(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        let mut config = AppConfig::default();
        config.bind_address = "127.0.0.1:0".to_string();
        config.place_search.base_url = self.place_search_base_url.clone();
        config.place_search.user_agent = "emergency-cell-tests".to_string();
        config.place_search.timeout_seconds = 2;
        config.locator.search_radius_km = self.search_radius_km;
        config.locator.max_results = self.max_results;
        config.dispatch.acceptance_delay = self.acceptance_delay;
        config.dispatch.status_period = self.status_period;
        config
    }
}

/// One place-search result in the wire format (coordinates as strings).
pub fn place_json(display_name: &str, lat: f64, lon: f64) -> Value {
    json!({
        "place_id": 1,
        "display_name": display_name,
        "lat": lat.to_string(),
        "lon": lon.to_string(),
        "class": "amenity",
        "type": "hospital",
    })
}

/// Places due east of `origin` at the given longitude offsets, named `Hospital {i}, Street {i}, City`.
pub fn places_east_of(origin_lat: f64, origin_lon: f64, lon_offsets: &[f64]) -> Value {
    Value::Array(
        lon_offsets
            .iter()
            .enumerate()
            .map(|(i, offset)| {
                place_json(
                    &format!("Hospital {}, Street {}, City", i, i),
                    origin_lat,
                    origin_lon + offset,
                )
            })
            .collect(),
    )
}
