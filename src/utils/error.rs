use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::utils::api_response::ApiResponse;

pub type AppResult<T> = Result<T, AppError>;

/// Errors raised by queries, workflow rules and upstream clients.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Falta el campo requerido: {0}")]
    MissingField(&'static str),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    /// The upstream answered, but not with something usable.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// The upstream could not be reached or timed out.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::MissingField(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            Self::UpstreamUnavailable(err.to_string())
        } else {
            Self::Upstream(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<AppError> for ApiResponse<()> {
    fn from(err: AppError) -> Self {
        let status = err.status_code();
        if status.is_server_error() {
            tracing::error!(error = %err, status = status.as_u16(), "request failed");
            // Internal messages are surfaced as-is to the caller.
            let message = match &err {
                AppError::Database(_) | AppError::Internal(_) => "Error interno del servidor",
                AppError::Upstream(_) => "Servicio externo respondió con error",
                _ => "Servicio externo no disponible",
            };
            ApiResponse::error(status, message, Some(json!({ "error": err.to_string() })))
        } else {
            tracing::debug!(error = %err, status = status.as_u16(), "client error");
            let errors = match &err {
                AppError::MissingField(field) => Some(json!({ "field": field })),
                _ => None,
            };
            ApiResponse::error(status, err.to_string(), errors)
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        ApiResponse::<()>::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_taxonomy_to_status_codes() {
        assert_eq!(AppError::MissingField("monto").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::Upstream("x".into()).status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            AppError::UpstreamUnavailable("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::Database(sqlx::Error::RowNotFound).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn missing_field_names_the_field() {
        let resp = ApiResponse::<()>::from(AppError::MissingField("monto"));
        assert_eq!(resp.status_code, 400);
        assert!(resp.message.contains("monto"));
        assert_eq!(resp.errors.unwrap()["field"], "monto");
    }

    #[test]
    fn internal_errors_surface_the_message() {
        let resp = ApiResponse::<()>::from(AppError::Internal("boom".into()));
        assert_eq!(resp.status_code, 500);
        assert_eq!(resp.errors.unwrap()["error"], "boom");
    }
}
