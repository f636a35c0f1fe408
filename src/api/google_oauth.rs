use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::get,
    Router,
};
use serde::Serialize;
use tracing::{info, warn};
use utoipa::{OpenApi, ToSchema};

use crate::api::auth::{issue_jwt, SecurityAddon};
use crate::app_state::AppState;
use crate::db::models::user::UserSummary;
use crate::utils::api_response::ApiResponse;
use crate::utils::error::{AppError, AppResult};

#[derive(Serialize, ToSchema)]
pub struct AuthToken {
    pub token: String,
    pub usuario: UserSummary,
}

/// Forwarded `Cookie` header, required by every call to the auth service.
pub fn session_cookie(headers: &HeaderMap) -> AppResult<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Falta la cookie de sesión de Google".into()))
}

/// Exchange a Google session for an API token
///
/// The session cookie is checked against the auth service; the returned
/// email must belong to a registered user.
#[utoipa::path(
    get,
    path = "/auth/google/session",
    tag = "Google OAuth",
    responses(
        (status = 200, description = "Token issued", body = AuthToken),
        (status = 401, description = "Missing or rejected session"),
        (status = 403, description = "Email not registered"),
        (status = 503, description = "Auth service unavailable")
    )
)]
pub async fn exchange_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<ApiResponse<AuthToken>, ApiResponse<()>> {
    let cookie = session_cookie(&headers)?;
    let profile = state.auth_service.me(cookie).await?;

    let email = profile
        .get("email")
        .and_then(|v| v.as_str())
        .ok_or_else(|| AppError::Upstream("La sesión no incluye un email".into()))?;

    let usuario = sqlx::query_as::<_, UserSummary>(
        "SELECT id, nombre, rol FROM usuarios WHERE lower(email) = lower($1)",
    )
    .bind(email)
    .fetch_optional(&state.pool)
    .await
    .map_err(AppError::from)?
    .ok_or_else(|| {
        warn!(email, "Google session for unregistered email");
        AppError::Forbidden(format!("El email {email} no está registrado"))
    })?;

    let token = issue_jwt(&state.config, &usuario)?;
    info!(user_id = usuario.id, "Issued token from Google session");

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Sesión validada",
        AuthToken { token, usuario },
    ))
}

pub fn g_auth_routes() -> Router<AppState> {
    Router::new().route("/auth/google/session", get(exchange_session))
}

#[derive(OpenApi)]
#[openapi(
    paths(exchange_session),
    components(schemas(AuthToken, UserSummary)),
    tags((name = "Google OAuth", description = "Google session exchange")),
    modifiers(&SecurityAddon)
)]
pub struct GoogleOAuthDoc;
