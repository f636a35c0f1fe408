use axum::http::StatusCode;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::openapi::Components;
use utoipa::Modify;

use crate::config::Config;
use crate::db::models::user::UserSummary;
use crate::utils::api_response::ApiResponse;
use crate::utils::error::{AppError, AppResult};

/// Lifetime of tokens issued by this service.
pub const TOKEN_TTL_HOURS: i64 = 8;

/// JWT Claims used for authentication.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject - User ID as String
    pub sub: String,
    /// Display name of the authenticated user.
    pub username: String,
    /// Role label, e.g. `JP` or `DAF`.
    pub role: String,
    /// Expiration timestamp (UNIX TIME)
    pub exp: usize,
}

impl Claims {
    pub fn for_user(user: &UserSummary, ttl: Duration) -> Self {
        Claims {
            sub: user.id.to_string(),
            username: user.nombre.clone(),
            role: user.rol.as_str().to_string(),
            exp: (Utc::now() + ttl).timestamp().max(0) as usize,
        }
    }

    /// Converts `sub` (user ID) to `i32`, or returns a descriptive error.
    pub fn user_id(&self) -> Result<i32, ApiResponse<()>> {
        self.sub.parse::<i32>().map_err(|_| {
            ApiResponse::error(
                StatusCode::BAD_REQUEST,
                "Invalid user ID format in token",
                None,
            )
        })
    }
}

/// Signs a token for `user` with the configured secret and algorithm.
pub fn issue_jwt(config: &Config, user: &UserSummary) -> AppResult<String> {
    let claims = Claims::for_user(user, Duration::hours(TOKEN_TTL_HOURS));
    encode(
        &Header::new(config.jwt_algorithm),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token generation failed: {e}")))
}

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let mut components = openapi.components.clone().unwrap_or(Components::default());
        components.add_security_scheme(
            "bearerAuth",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
        openapi.components = Some(components);
    }
}
