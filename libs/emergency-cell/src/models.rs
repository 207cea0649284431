// libs/emergency-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;

// ==============================================================================
// LOCATION & HOSPITAL MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Shift both axes by the same number of degrees.
    pub fn offset(&self, degrees: f64) -> Self {
        Self {
            latitude: self.latitude + degrees,
            longitude: self.longitude + degrees,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Wire shape of one place-search result. Coordinates arrive as numeric strings.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPlace {
    pub display_name: String,
    pub lat: String,
    pub lon: String,
}

/// A parsed place-search result, before any distance is known.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceRecord {
    pub display_name: String,
    pub location: Coordinate,
}

impl PlaceRecord {
    pub fn new(display_name: impl Into<String>, location: Coordinate) -> Self {
        Self {
            display_name: display_name.into(),
            location,
        }
    }
}

impl TryFrom<RawPlace> for PlaceRecord {
    type Error = SearchError;

    fn try_from(raw: RawPlace) -> Result<Self, Self::Error> {
        let latitude = parse_coordinate_component(&raw.lat, "lat", &raw.display_name)?;
        let longitude = parse_coordinate_component(&raw.lon, "lon", &raw.display_name)?;

        Ok(Self {
            display_name: raw.display_name,
            location: Coordinate::new(latitude, longitude),
        })
    }
}

fn parse_coordinate_component(value: &str, field: &'static str, place: &str) -> Result<f64, SearchError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| SearchError::InvalidCoordinate {
            place: place.to_string(),
            field,
            value: value.to_string(),
        })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HospitalCandidate {
    pub display_name: String,
    /// Secondary line of the place name.
    pub address: String,
    pub location: Coordinate,
    pub distance_km: f64,
    pub synthetic: bool,
}

impl HospitalCandidate {
    pub fn from_place(place: PlaceRecord, distance_km: f64) -> Self {
        let (display_name, address) = split_display_name(&place.display_name);
        Self {
            display_name,
            address,
            location: place.location,
            distance_km,
            synthetic: false,
        }
    }
}

/// First comma-separated segment is the name, the second one the address line.
pub fn split_display_name(full: &str) -> (String, String) {
    let mut parts = full.split(',');
    let name = parts.next().unwrap_or_default().trim().to_string();
    let address = parts.next().unwrap_or_default().trim().to_string();
    (name, address)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedHospitalList {
    pub origin: Coordinate,
    pub hospitals: Vec<HospitalCandidate>,
}

impl RankedHospitalList {
    pub fn synthetic(&self) -> Option<&HospitalCandidate> {
        self.hospitals.first().filter(|h| h.synthetic)
    }

    /// Ranked search results, excluding the injected provider.
    pub fn ranked(&self) -> &[HospitalCandidate] {
        match self.hospitals.first() {
            Some(first) if first.synthetic => &self.hospitals[1..],
            _ => &self.hospitals,
        }
    }

    pub fn len(&self) -> usize {
        self.hospitals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hospitals.is_empty()
    }
}

// ==============================================================================
// GEOLOCATION
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionOptions {
    pub high_accuracy: bool,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self { high_accuracy: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionErrorKind {
    PermissionDenied,
    PositionUnavailable,
    Unsupported,
}

// ==============================================================================
// DISPATCH MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    Idle,
    Searching,
    Accepted,
    VolunteerOffered,
}

impl std::fmt::Display for DispatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DispatchState::Idle => "idle",
            DispatchState::Searching => "searching",
            DispatchState::Accepted => "accepted",
            DispatchState::VolunteerOffered => "volunteer_offered",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchAction {
    SelectVolunteer,
    Back,
    Dismiss,
    ReportFailure,
}

impl std::fmt::Display for DispatchAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DispatchAction::SelectVolunteer => "select_volunteer",
            DispatchAction::Back => "back",
            DispatchAction::Dismiss => "dismiss",
            DispatchAction::ReportFailure => "report_failure",
        };
        f.write_str(name)
    }
}

/// One emergency-help request. `episode` distinguishes successive requests in a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchRequest {
    pub state: DispatchState,
    pub created_at: Option<DateTime<Utc>>,
    pub episode: u64,
}

impl DispatchRequest {
    pub fn idle(episode: u64) -> Self {
        Self {
            state: DispatchState::Idle,
            created_at: None,
            episode,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchSnapshot {
    pub state: DispatchState,
    pub created_at: Option<DateTime<Utc>>,
    pub status_message: Option<String>,
    pub eta_minutes: Option<u32>,
    pub provider_name: Option<String>,
    pub attending_physician: Option<String>,
    pub volunteer_name: Option<String>,
    pub volunteer_eta_minutes: Option<u32>,
    pub last_failure: Option<String>,
    pub revision: u64,
}

// ==============================================================================
// REQUEST / RESPONSE DTOS
// ==============================================================================

/// What the browser reports after running its own position request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocateRequest {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub error: Option<PositionErrorKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeolocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Position unavailable")]
    PositionUnavailable,

    #[error("Geolocation is not supported")]
    Unsupported,
}

impl From<PositionErrorKind> for GeolocationError {
    fn from(kind: PositionErrorKind) -> Self {
        match kind {
            PositionErrorKind::PermissionDenied => GeolocationError::PermissionDenied,
            PositionErrorKind::PositionUnavailable => GeolocationError::PositionUnavailable,
            PositionErrorKind::Unsupported => GeolocationError::Unsupported,
        }
    }
}

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Place search request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Place search returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse place search response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Place '{place}' has invalid {field} value '{value}'")]
    InvalidCoordinate {
        place: String,
        field: &'static str,
        value: String,
    },
}

#[derive(Error, Debug)]
pub enum LocatorError {
    #[error("Location unavailable: {0}")]
    LocationUnavailable(#[from] GeolocationError),

    #[error("Hospital search failed: {0}")]
    SearchFailed(#[from] SearchError),

    #[error("A hospital lookup is already in progress for this session")]
    LookupInProgress,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("Cannot {action} while {from}")]
    InvalidTransition {
        from: DispatchState,
        action: DispatchAction,
    },

    #[error("Emergency session not found")]
    SessionNotFound,
}

impl From<LocatorError> for AppError {
    fn from(err: LocatorError) -> Self {
        match err {
            LocatorError::LocationUnavailable(e) => AppError::LocationUnavailable(e.to_string()),
            LocatorError::SearchFailed(_) => {
                AppError::SearchFailed("Failed to fetch hospitals.".to_string())
            }
            LocatorError::LookupInProgress => AppError::LookupInProgress(err.to_string()),
        }
    }
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::InvalidTransition { .. } => AppError::InvalidTransition(err.to_string()),
            DispatchError::SessionNotFound => AppError::NotFound(err.to_string()),
        }
    }
}
