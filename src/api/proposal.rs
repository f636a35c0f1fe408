use axum::{
    routing::{get, post},
    Router,
};

use crate::app_state::AppState;
use crate::db::queries::proposal::{
    advance_proposal_stage, cancel_proposal, get_all_proposals, get_proposal, import_proposal,
};

/// Register proposal routes
pub fn proposal_routes() -> Router<AppState> {
    Router::new()
        .route("/propuesta", get(get_all_proposals))
        .route("/propuesta/importar", post(import_proposal))
        .route("/propuesta/{id}", get(get_proposal))
        .route("/propuesta/{id}/avanzar", post(advance_proposal_stage))
        .route("/propuesta/{id}/cancelar", post(cancel_proposal))
}
