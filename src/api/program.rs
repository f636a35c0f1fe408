use axum::{routing::get, Router};

use crate::app_state::AppState;
use crate::db::queries::program::{get_all_programs, get_program};

pub fn program_routes() -> Router<AppState> {
    Router::new()
        .route("/programa", get(get_all_programs))
        .route("/programa/{id}", get(get_program))
}
