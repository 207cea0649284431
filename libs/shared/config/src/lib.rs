use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_STATUS_MESSAGES: [&str; 4] = [
    "Connecting to nearby hospitals",
    "Searching for available ambulances",
    "Checking hospital capacity",
    "Contacting emergency response team",
];

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// The always-present local provider injected at the head of every ranked list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticProvider {
    /// Full comma-separated place name, split into name and address like any search result.
    pub display_name: String,
    pub attending_physician: String,
    /// Added to both latitude and longitude of the user's fix.
    pub offset_deg: f64,
    pub distance_km: f64,
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        Self {
            display_name: "ResQMed Hospital, Your Local Area, India".to_string(),
            attending_physician: "Dr. Dummy".to_string(),
            offset_deg: 0.001,
            distance_km: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocatorConfig {
    pub search_radius_km: f64,
    /// Total list length including the synthetic provider.
    pub max_results: usize,
    pub synthetic_provider: SyntheticProvider,
    pub average_speed_kmh: f64,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            search_radius_km: 3.0,
            max_results: 8,
            synthetic_provider: SyntheticProvider::default(),
            average_speed_kmh: 30.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceSearchConfig {
    pub base_url: String,
    pub user_agent: String,
    pub query: String,
    pub raw_limit: u32,
    pub viewbox_half_span_deg: f64,
    pub timeout_seconds: u64,
}

impl Default for PlaceSearchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: "resqmed-emergency-locator/0.1".to_string(),
            query: "hospital".to_string(),
            raw_limit: 30,
            viewbox_half_span_deg: 0.04,
            timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchConfig {
    pub acceptance_delay: Duration,
    pub status_period: Duration,
    pub status_messages: Vec<String>,
    pub volunteer_name: String,
    pub volunteer_eta_minutes: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            acceptance_delay: Duration::from_secs(10),
            status_period: Duration::from_secs(3),
            status_messages: DEFAULT_STATUS_MESSAGES.iter().map(|m| m.to_string()).collect(),
            volunteer_name: "Dummy Helper".to_string(),
            volunteer_eta_minutes: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub bind_address: String,
    /// Sessions untouched for this long are dropped and their timers cancelled.
    pub session_idle_timeout: Duration,
    pub place_search: PlaceSearchConfig,
    pub locator: LocatorConfig,
    pub dispatch: DispatchConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            session_idle_timeout: Duration::from_secs(30 * 60),
            place_search: PlaceSearchConfig::default(),
            locator: LocatorConfig::default(),
            dispatch: DispatchConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(addr) = env_string("BIND_ADDRESS") {
            config.bind_address = addr;
        }
        if let Some(secs) = env_parsed::<u64>("SESSION_IDLE_TIMEOUT_SECONDS") {
            config.session_idle_timeout = Duration::from_secs(secs);
        }
        if let Some(url) = env_string("PLACE_SEARCH_BASE_URL") {
            config.place_search.base_url = url.trim_end_matches('/').to_string();
        } else {
            warn!("PLACE_SEARCH_BASE_URL not set, using default");
        }
        if let Some(agent) = env_string("PLACE_SEARCH_USER_AGENT") {
            config.place_search.user_agent = agent;
        }
        if let Some(secs) = env_parsed::<u64>("PLACE_SEARCH_TIMEOUT_SECONDS") {
            config.place_search.timeout_seconds = secs;
        }
        if let Some(radius) = env_parsed::<f64>("SEARCH_RADIUS_KM") {
            config.locator.search_radius_km = radius;
        }
        if let Some(max) = env_parsed::<usize>("MAX_RESULTS") {
            config.locator.max_results = max;
        }
        if let Some(speed) = env_parsed::<f64>("AVERAGE_SPEED_KMH") {
            config.locator.average_speed_kmh = speed;
        }
        if let Some(name) = env_string("SYNTHETIC_PROVIDER_NAME") {
            config.locator.synthetic_provider.display_name = name;
        }
        if let Some(secs) = env_parsed::<u64>("DISPATCH_ACCEPTANCE_DELAY_SECONDS") {
            config.dispatch.acceptance_delay = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parsed::<u64>("DISPATCH_STATUS_PERIOD_SECONDS") {
            config.dispatch.status_period = Duration::from_secs(secs);
        }

        if let Err(e) = config.validate() {
            warn!("Application configuration is invalid: {}", e);
        }

        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.locator.search_radius_km.is_nan() || self.locator.search_radius_km <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "search_radius_km",
                reason: "must be positive".to_string(),
            });
        }
        if self.locator.max_results == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_results",
                reason: "must leave room for the synthetic provider".to_string(),
            });
        }
        if self.locator.average_speed_kmh.is_nan() || self.locator.average_speed_kmh <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "average_speed_kmh",
                reason: "must be positive".to_string(),
            });
        }
        if self.dispatch.acceptance_delay.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "acceptance_delay",
                reason: "must be non-zero".to_string(),
            });
        }
        if self.dispatch.status_period.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "status_period",
                reason: "must be non-zero".to_string(),
            });
        }
        if self.session_idle_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "session_idle_timeout",
                reason: "must be non-zero".to_string(),
            });
        }
        if self.dispatch.status_messages.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "status_messages",
                reason: "at least one message is required".to_string(),
            });
        }
        Ok(())
    }

    pub fn is_place_search_configured(&self) -> bool {
        !self.place_search.base_url.is_empty() && !self.place_search.user_agent.is_empty()
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parsed<T: FromStr>(key: &str) -> Option<T> {
    let raw = env_string(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("{} has unparsable value '{}', using default", key, raw);
            None
        }
    }
}
