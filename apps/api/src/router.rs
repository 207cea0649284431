use std::sync::Arc;

use axum::{routing::get, Router};

use emergency_cell::{emergency_routes, EmergencyHandlers};

pub fn create_router(emergency: Arc<EmergencyHandlers>) -> Router {
    Router::new()
        .route("/", get(|| async { "ResQMed Emergency API is running!" }))
        .nest("/emergency", emergency_routes(emergency))
}
