use axum::{routing::get, Router};

use crate::app_state::AppState;
use crate::db::queries::opportunity::{get_all_opportunities, get_opportunity};

pub fn opportunity_routes() -> Router<AppState> {
    Router::new()
        .route("/oportunidad", get(get_all_opportunities))
        .route("/oportunidad/{id}", get(get_opportunity))
}
