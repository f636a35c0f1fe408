use axum::{
    routing::{get, post, put},
    Router,
};

use crate::app_state::AppState;
use crate::db::queries::user::{
    get_all_users, get_google_user_list, get_google_users, get_marketing_user, get_me,
    update_key_crm, update_vacations,
};

/// Register user routes, local and proxied to the auth service
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/usuario", get(get_all_users))
        .route("/usuario/me", get(get_me))
        .route("/usuario/google", get(get_google_users))
        .route("/usuario/google/list", get(get_google_user_list))
        .route("/usuario/{id}/key-crm", put(update_key_crm))
        .route("/usuario-marketing/{id}", get(get_marketing_user))
        .route("/usuario-marketing/{id}/vacaciones", post(update_vacations))
}
