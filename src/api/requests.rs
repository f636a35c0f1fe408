use axum::{
    routing::{get, post},
    Router,
};

use crate::app_state::AppState;
use crate::db::queries::requests::{
    create_request, get_generated_requests, get_received_requests, get_request,
    get_request_history, get_subdirector_requests, transition_request,
};

/// Register request workflow routes
pub fn request_routes() -> Router<AppState> {
    Router::new()
        .route("/solicitudes", post(create_request))
        // Static segments are matched before `{id}`.
        .route("/solicitudes/recibidas", get(get_received_requests))
        .route("/solicitudes/generadas", get(get_generated_requests))
        .route(
            "/solicitudes/{id}",
            get(get_request).patch(transition_request),
        )
        .route("/solicitudes/{id}/historial", get(get_request_history))
        .route("/sub-direccion/solicitudes", get(get_subdirector_requests))
}
