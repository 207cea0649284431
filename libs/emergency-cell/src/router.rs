// libs/emergency-cell/src/router.rs
use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::handlers::*;

/// Routes for the hospital locator and emergency dispatch flow.
pub fn emergency_routes(handlers: Arc<EmergencyHandlers>) -> Router {
    Router::new()
        .route("/health", get(emergency_health_check))
        .route("/sessions", post(create_session))
        .route("/sessions/{session_id}", delete(delete_session))
        // Hospital locator
        .route("/sessions/{session_id}/locate", post(locate_hospitals))
        .route("/sessions/{session_id}/hospitals", get(get_hospitals))
        // Dispatch lifecycle
        .route("/sessions/{session_id}/dispatch", post(request_help).get(get_dispatch))
        .route("/sessions/{session_id}/dispatch/volunteer", post(select_volunteer))
        .route("/sessions/{session_id}/dispatch/back", post(back_to_accepted))
        .route("/sessions/{session_id}/dispatch/dismiss", post(dismiss_dispatch))
        .with_state(handlers)
}
