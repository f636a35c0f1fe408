pub mod auth_service;
pub mod lambda;

use reqwest::{Response, StatusCode};

use crate::utils::error::{AppError, AppResult};

/// Maps non-success upstream answers onto the error taxonomy.
pub(crate) async fn check_status(service: &str, response: Response) -> AppResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(service, status = status.as_u16(), body = %body, "upstream returned an error");
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AppError::Unauthorized(format!("{service}: sesión no válida"))
        }
        StatusCode::NOT_FOUND => AppError::NotFound(format!("{service}: recurso no encontrado")),
        StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            AppError::UpstreamUnavailable(format!("{service} respondió {status}"))
        }
        _ => AppError::Upstream(format!("{service} respondió {status}")),
    })
}
