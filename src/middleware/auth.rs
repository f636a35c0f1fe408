use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use moka::sync::Cache;
use serde_json::json;
use sqlx::PgPool;
use tracing::error;

use crate::api::auth::Claims;
use crate::app_state::AppState;
use crate::config::Config;
use crate::db::models::user::UserSummary;
use crate::utils::api_response::ApiResponse;

/// Authenticated users keyed by id.
pub type UserCache = Arc<Cache<i32, UserSummary>>;

pub fn create_user_cache(ttl: Duration) -> UserCache {
    Arc::new(Cache::builder().time_to_live(ttl).max_capacity(10_000).build())
}

/// Validates the bearer token and stores its [`Claims`] in the request.
pub async fn jwt_middleware(
    State(config): State<Arc<Config>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let auth_header = req.headers().get("Authorization").ok_or_else(|| {
        tracing::debug!("Missing Authorization header");
        ApiResponse::<()>::error(StatusCode::UNAUTHORIZED, "Missing Authorization header", None)
            .into_response()
    })?;

    let token_str = auth_header.to_str().map_err(|_| {
        ApiResponse::<()>::error(StatusCode::BAD_REQUEST, "Invalid Authorization header format", None)
            .into_response()
    })?;

    let token = token_str.strip_prefix("Bearer ").ok_or_else(|| {
        ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "Invalid token format (missing 'Bearer ' prefix)",
            None,
        )
        .into_response()
    })?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::new(config.jwt_algorithm),
    )
    .map_err(|e| {
        tracing::warn!("JWT decoding failed: {:?}", e);
        ApiResponse::<()>::error(
            StatusCode::UNAUTHORIZED,
            "Invalid token",
            Some(json!({ "error": e.to_string() })),
        )
        .into_response()
    })?;

    tracing::debug!(sub = %token_data.claims.sub, "JWT decoded");
    req.extensions_mut().insert(token_data.claims);

    Ok(next.run(req).await)
}

/// Resolves the token subject to a [`UserSummary`], through the TTL cache.
pub async fn current_user_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let claims = req.extensions().get::<Claims>().cloned().ok_or_else(|| {
        error!("Missing JWT claims in request");
        ApiResponse::<()>::error(StatusCode::UNAUTHORIZED, "Missing JWT claims in request", None)
            .into_response()
    })?;

    let user_id = claims.user_id().map_err(IntoResponse::into_response)?;

    if let Some(user) = state.user_cache.get(&user_id) {
        req.extensions_mut().insert(user);
        return Ok(next.run(req).await);
    }

    let user = match fetch_user(&state.pool, user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return Err(ApiResponse::<()>::error(
                StatusCode::UNAUTHORIZED,
                "Usuario del token no existe",
                None,
            )
            .into_response());
        }
        Err(err) => {
            error!("Database query failed: {:?}", err);
            return Err(ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load user",
                Some(json!({ "error": err.to_string() })),
            )
            .into_response());
        }
    };

    state.user_cache.insert(user_id, user.clone());
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

async fn fetch_user(pool: &PgPool, user_id: i32) -> Result<Option<UserSummary>, sqlx::Error> {
    sqlx::query_as::<_, UserSummary>("SELECT id, nombre, rol FROM usuarios WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}
