use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::Json;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::utils::api_response::ApiResponse;

/// JSON body extractor that answers malformed input with a 400 envelope
/// naming the offending field, instead of axum's plain-text rejection.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiResponse<()>;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(rejection_response(&rejection)),
        }
    }
}

fn rejection_response(rejection: &JsonRejection) -> ApiResponse<()> {
    let text = rejection.body_text();
    let detail = text
        .split_once("target type: ")
        .map_or(text.as_str(), |(_, detail)| detail);

    let (message, errors) = match offending_field(detail) {
        Some(field) => (
            format!("Campo inválido: {field}"),
            json!({ "field": field, "error": detail }),
        ),
        None => ("Cuerpo JSON inválido".to_string(), json!({ "error": detail })),
    };
    tracing::debug!(error = %text, "rejected JSON body");
    ApiResponse::error(StatusCode::BAD_REQUEST, message, Some(errors))
}

/// Field named by a serde error, e.g. `valor: unknown variant ...` or
/// ``missing field `tipo` at line 1 column 2``.
fn offending_field(detail: &str) -> Option<String> {
    if let Some(rest) = detail.strip_prefix("missing field `") {
        return rest.split('`').next().map(str::to_string);
    }
    let (path, _) = detail.split_once(": ")?;
    (!path.is_empty() && !path.contains(' ')).then(|| path.to_string())
}
