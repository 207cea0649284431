// libs/emergency-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::{info, instrument};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{CreateSessionResponse, DispatchSnapshot, LocateRequest, RankedHospitalList, SearchError};
use crate::services::{DispatchSettings, HospitalLocatorService, ReportedPosition, Scheduler, SessionStore};

pub struct EmergencyHandlers {
    config: Arc<AppConfig>,
    locator: HospitalLocatorService,
    sessions: SessionStore,
}

impl EmergencyHandlers {
    pub fn new(config: Arc<AppConfig>, scheduler: Arc<dyn Scheduler>) -> Result<Self, SearchError> {
        let locator = HospitalLocatorService::new(&config)?;
        let settings = DispatchSettings::new(&config.dispatch, &config.locator);

        Ok(Self {
            sessions: SessionStore::new(scheduler, settings, config.session_idle_timeout),
            locator,
            config,
        })
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }
}

// ==============================================================================
// HEALTH
// ==============================================================================

pub async fn emergency_health_check(State(handlers): State<Arc<EmergencyHandlers>>) -> Json<Value> {
    let configured = handlers.config.is_place_search_configured();
    let status = if configured { "healthy" } else { "not_configured" };
    Json(json!({
        "status": status,
        "service": "emergency-cell",
        "place_search_configured": configured,
        "active_sessions": handlers.sessions.len().await,
    }))
}

// ==============================================================================
// SESSION HANDLERS
// ==============================================================================

#[instrument(skip(handlers))]
pub async fn create_session(
    State(handlers): State<Arc<EmergencyHandlers>>,
) -> (StatusCode, Json<CreateSessionResponse>) {
    let session = handlers.sessions.create().await;
    (
        StatusCode::CREATED,
        Json(CreateSessionResponse { session_id: session.id }),
    )
}

#[instrument(skip(handlers))]
pub async fn delete_session(
    State(handlers): State<Arc<EmergencyHandlers>>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    handlers.sessions.remove(session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ==============================================================================
// HOSPITAL LOCATOR HANDLERS
// ==============================================================================

#[instrument(skip(handlers, payload))]
pub async fn locate_hospitals(
    State(handlers): State<Arc<EmergencyHandlers>>,
    Path(session_id): Path<Uuid>,
    payload: Result<Json<LocateRequest>, JsonRejection>,
) -> Result<Json<RankedHospitalList>, AppError> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let session = handlers.sessions.get(session_id).await?;

    let provider = ReportedPosition::from(request);
    let hospitals = session.locate(&handlers.locator, &provider).await?;

    Ok(Json(hospitals))
}

#[instrument(skip(handlers))]
pub async fn get_hospitals(
    State(handlers): State<Arc<EmergencyHandlers>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<RankedHospitalList>, AppError> {
    let session = handlers.sessions.get(session_id).await?;
    session
        .hospitals()
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No hospital list for this session yet".to_string()))
}

// ==============================================================================
// DISPATCH HANDLERS
// ==============================================================================

#[instrument(skip(handlers))]
pub async fn request_help(
    State(handlers): State<Arc<EmergencyHandlers>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<DispatchSnapshot>, AppError> {
    let session = handlers.sessions.get(session_id).await?;
    info!("Emergency help requested for session {}", session_id);
    Ok(Json(session.dispatch().request_help()))
}

#[instrument(skip(handlers))]
pub async fn get_dispatch(
    State(handlers): State<Arc<EmergencyHandlers>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<DispatchSnapshot>, AppError> {
    let session = handlers.sessions.get(session_id).await?;
    Ok(Json(session.dispatch().snapshot()))
}

#[instrument(skip(handlers))]
pub async fn select_volunteer(
    State(handlers): State<Arc<EmergencyHandlers>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<DispatchSnapshot>, AppError> {
    let session = handlers.sessions.get(session_id).await?;
    Ok(Json(session.dispatch().select_volunteer()?))
}

#[instrument(skip(handlers))]
pub async fn back_to_accepted(
    State(handlers): State<Arc<EmergencyHandlers>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<DispatchSnapshot>, AppError> {
    let session = handlers.sessions.get(session_id).await?;
    Ok(Json(session.dispatch().back()?))
}

#[instrument(skip(handlers))]
pub async fn dismiss_dispatch(
    State(handlers): State<Arc<EmergencyHandlers>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<DispatchSnapshot>, AppError> {
    let session = handlers.sessions.get(session_id).await?;
    Ok(Json(session.dispatch().dismiss()?))
}
