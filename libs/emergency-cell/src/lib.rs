// libs/emergency-cell/src/lib.rs
//! # Emergency Cell
//!
//! Hospital locator and emergency dispatch simulation for the patient front-end.
//!
//! ## Flow
//!
//! 1. The client obtains a single position fix and reports it (or the error it got).
//! 2. The place-search API is queried for hospitals in a ±0.04° box around the fix.
//! 3. Results are ranked by great-circle distance, cut at the search radius, and a
//!    fixed local provider is injected at the head of the list.
//! 4. "Request help" starts the dispatch state machine: a rotating status message
//!    while searching, automatic acceptance after a fixed delay, and an optional
//!    nearby-volunteer offer.
//!
//! ```text
//! +-----------------------------------------------------+
//! |                  Emergency Cell                     |
//! +-----------------------------------------------------+
//! |  handlers.rs      |  HTTP endpoint handlers         |
//! |  router.rs        |  Route definitions              |
//! |  models.rs        |  Domain types, DTOs, errors     |
//! |  services/        |                                 |
//! |    geolocation.rs |  Position provider seam         |
//! |    search.rs      |  Place-search API client        |
//! |    ranking.rs     |  Haversine ranking              |
//! |    locator.rs     |  Geolocate -> search -> rank    |
//! |    scheduler.rs   |  Tokio and virtual timers       |
//! |    dispatch.rs    |  Dispatch state machine, ETA    |
//! |    session.rs     |  Per-session state              |
//! +-----------------------------------------------------+
//! ```
//!
//! ## API Endpoints
//!
//! - `GET /emergency/health` - Health check
//! - `POST /emergency/sessions` - Start a session
//! - `DELETE /emergency/sessions/{id}` - End a session, cancelling its timers
//! - `POST /emergency/sessions/{id}/locate` - Report a position fix and rank hospitals
//! - `GET /emergency/sessions/{id}/hospitals` - Last ranked list
//! - `POST /emergency/sessions/{id}/dispatch` - Request emergency help
//! - `GET /emergency/sessions/{id}/dispatch` - Current dispatch snapshot
//! - `POST /emergency/sessions/{id}/dispatch/volunteer` - Switch to a nearby volunteer
//! - `POST /emergency/sessions/{id}/dispatch/back` - Return to the hospital acceptance
//! - `POST /emergency/sessions/{id}/dispatch/dismiss` - Close the accepted request
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use emergency_cell::{emergency_routes, EmergencyHandlers, TokioScheduler};
//! use shared_config::AppConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(AppConfig::from_env());
//! let scheduler = Arc::new(TokioScheduler::from_current()?);
//! let handlers = Arc::new(EmergencyHandlers::new(config, scheduler)?);
//! let routes = emergency_routes(handlers);
//! # let _ = routes;
//! # Ok(())
//! # }
//! ```

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{
    Coordinate, DispatchAction, DispatchError, DispatchSnapshot, DispatchState, GeolocationError,
    HospitalCandidate, LocatorError, PlaceRecord, PositionOptions, RankedHospitalList, SearchError,
};

pub use services::{
    DispatchSettings, DispatchStateMachine, DistanceRanker, GeolocationProvider, HospitalLocatorService,
    ProximitySearchClient, ReportedPosition, Scheduler, SessionStore, TokioScheduler, VirtualScheduler,
};

pub use handlers::EmergencyHandlers;
pub use router::emergency_routes;
