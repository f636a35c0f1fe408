use axum::{routing::get, Router};

use crate::app_state::AppState;
use crate::db::queries::vendor::get_vendors;

pub fn vendor_routes() -> Router<AppState> {
    Router::new().route("/vendedores", get(get_vendors))
}
