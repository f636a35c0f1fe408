use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Extension,
};
use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use tracing::info;
use utoipa::OpenApi;

use crate::api::auth::SecurityAddon;
use crate::api::google_oauth::session_cookie;
use crate::app_state::AppState;
use crate::db::models::user::{
    Cartera, KeyCrmUpdate, MarketingUser, User, UserRole, UserSummary, VacationUpdate,
};
use crate::utils::api_response::ApiResponse;
use crate::utils::extract::ApiJson;
use crate::utils::error::{AppError, AppResult};
use crate::utils::pagination::{Page, PageParams};

const USER_COLUMNS: &str =
    "id, nombre, email, rol, periodos_vacaciones, dias_pendientes, created_at";

/// Lowest id holding `role`, used to route new requests.
pub async fn first_user_with_role(conn: &mut PgConnection, role: UserRole) -> AppResult<Option<i32>> {
    let id = sqlx::query_scalar::<_, i32>("SELECT id FROM usuarios WHERE rol = $1 ORDER BY id LIMIT 1")
        .bind(role)
        .fetch_optional(conn)
        .await?;
    Ok(id)
}

pub async fn user_name(conn: &mut PgConnection, id: i32) -> AppResult<Option<String>> {
    let name = sqlx::query_scalar::<_, String>("SELECT nombre FROM usuarios WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(name)
}

async fn fetch_user(pool: &PgPool, id: i32) -> AppResult<User> {
    let sql = format!("SELECT {USER_COLUMNS} FROM usuarios WHERE id = $1");
    sqlx::query_as::<_, User>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Usuario {id} no encontrado")))
}

/// Checks the JSON shapes the vacation columns expect.
fn validate_vacations(update: &VacationUpdate) -> AppResult<()> {
    if !update.periodos.is_array() {
        return Err(AppError::BadRequest(
            "periodos debe ser una lista de {inicio, fin}".into(),
        ));
    }
    if !update.dias_pendientes.is_object() {
        return Err(AppError::BadRequest(
            "dias_pendientes debe ser un objeto periodo -> días".into(),
        ));
    }
    Ok(())
}

/// List local users
#[utoipa::path(
    get,
    path = "/usuario",
    params(PageParams),
    responses(
        (status = 200, description = "Users retrieved successfully", body = Page<User>),
        (status = 500, description = "Failed to retrieve users")
    ),
    tag = "Usuarios",
    security(("bearerAuth" = []))
)]
pub async fn get_all_users(
    State(pool): State<PgPool>,
    Query(params): Query<PageParams>,
) -> Result<ApiResponse<Page<User>>, ApiResponse<()>> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM usuarios")
        .fetch_one(&pool)
        .await
        .map_err(AppError::from)?;

    let sql = format!("SELECT {USER_COLUMNS} FROM usuarios ORDER BY nombre, id LIMIT $1 OFFSET $2");
    let users = sqlx::query_as::<_, User>(&sql)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&pool)
        .await
        .map_err(AppError::from)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Users retrieved successfully",
        Page::new(users, total, &params),
    ))
}

/// Get a product manager with their portfolios
#[utoipa::path(
    get,
    path = "/usuario-marketing/{id}",
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "Marketing user found", body = MarketingUser),
        (status = 404, description = "User not found or not a product manager")
    ),
    tag = "Usuarios",
    security(("bearerAuth" = []))
)]
pub async fn get_marketing_user(
    State(pool): State<PgPool>,
    Path(id): Path<i32>,
) -> Result<ApiResponse<MarketingUser>, ApiResponse<()>> {
    let usuario = fetch_user(&pool, id).await?;
    if usuario.rol != UserRole::ProductManager {
        return Err(AppError::not_found(format!("Usuario {id} no es jefe de producto")).into());
    }

    let carteras = sqlx::query_as::<_, Cartera>(
        "SELECT id, nombre, usuario_id FROM carteras WHERE usuario_id = $1 ORDER BY nombre",
    )
    .bind(id)
    .fetch_all(&pool)
    .await
    .map_err(AppError::from)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Usuario de marketing encontrado",
        MarketingUser { usuario, carteras },
    ))
}

/// Update vacation periods of a product manager
///
/// The vacation service is notified first; a failure there aborts the update.
#[utoipa::path(
    post,
    path = "/usuario-marketing/{id}/vacaciones",
    params(("id" = i32, Path, description = "User ID")),
    request_body = VacationUpdate,
    responses(
        (status = 200, description = "Vacations stored", body = User),
        (status = 400, description = "Malformed periods"),
        (status = 404, description = "User not found"),
        (status = 502, description = "Vacation service answered with an error"),
        (status = 503, description = "Vacation service unreachable")
    ),
    tag = "Usuarios",
    security(("bearerAuth" = []))
)]
pub async fn update_vacations(
    State(state): State<AppState>,
    Extension(caller): Extension<UserSummary>,
    Path(id): Path<i32>,
    ApiJson(payload): ApiJson<VacationUpdate>,
) -> Result<ApiResponse<User>, ApiResponse<()>> {
    validate_vacations(&payload)?;
    fetch_user(&state.pool, id).await?;

    state.lambdas.update_vacations(id, &payload).await?;

    let sql = format!(
        "UPDATE usuarios SET periodos_vacaciones = $1, dias_pendientes = $2 WHERE id = $3
         RETURNING {USER_COLUMNS}"
    );
    let usuario = sqlx::query_as::<_, User>(&sql)
        .bind(&payload.periodos)
        .bind(&payload.dias_pendientes)
        .bind(id)
        .fetch_one(&state.pool)
        .await
        .map_err(AppError::from)?;

    info!(user_id = id, updated_by = caller.id, "Vacations updated");
    Ok(ApiResponse::success(StatusCode::OK, "Vacaciones actualizadas", usuario))
}

/// Profile of the Google session behind the request cookie
#[utoipa::path(
    get,
    path = "/usuario/me",
    responses(
        (status = 200, description = "Session profile"),
        (status = 401, description = "Missing or rejected session"),
        (status = 502, description = "Auth service error"),
        (status = 503, description = "Auth service unreachable")
    ),
    tag = "Usuarios",
    security(("bearerAuth" = []))
)]
pub async fn get_me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<ApiResponse<Value>, ApiResponse<()>> {
    let profile = state.auth_service.me(session_cookie(&headers)?).await?;
    Ok(ApiResponse::success(StatusCode::OK, "Sesión activa", profile))
}

/// Users registered in the auth service
#[utoipa::path(
    get,
    path = "/usuario/google",
    responses(
        (status = 200, description = "Auth service users"),
        (status = 502, description = "Auth service error"),
        (status = 503, description = "Auth service unreachable")
    ),
    tag = "Usuarios",
    security(("bearerAuth" = []))
)]
pub async fn get_google_users(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<ApiResponse<Value>, ApiResponse<()>> {
    let users = state.auth_service.users(session_cookie(&headers)?).await?;
    Ok(ApiResponse::success(StatusCode::OK, "Usuarios de Google", users))
}

/// Compact user listing from the auth service
#[utoipa::path(
    get,
    path = "/usuario/google/list",
    responses(
        (status = 200, description = "Auth service user list"),
        (status = 502, description = "Auth service error"),
        (status = 503, description = "Auth service unreachable")
    ),
    tag = "Usuarios",
    security(("bearerAuth" = []))
)]
pub async fn get_google_user_list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<ApiResponse<Value>, ApiResponse<()>> {
    let users = state.auth_service.users_list(session_cookie(&headers)?).await?;
    Ok(ApiResponse::success(StatusCode::OK, "Listado de usuarios", users))
}

/// Set the CRM key of an auth service user
#[utoipa::path(
    put,
    path = "/usuario/{id}/key-crm",
    params(("id" = String, Path, description = "Auth service user ID")),
    request_body = KeyCrmUpdate,
    responses(
        (status = 200, description = "Key stored"),
        (status = 400, description = "Empty key"),
        (status = 502, description = "Auth service error"),
        (status = 503, description = "Auth service unreachable")
    ),
    tag = "Usuarios",
    security(("bearerAuth" = []))
)]
pub async fn update_key_crm(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<KeyCrmUpdate>,
) -> Result<ApiResponse<Value>, ApiResponse<()>> {
    if payload.key_crm.trim().is_empty() {
        return Err(AppError::MissingField("key_crm").into());
    }
    let cookie = session_cookie(&headers)?;
    let updated = state
        .auth_service
        .set_key_crm(cookie, &id, payload.key_crm.trim())
        .await?;
    Ok(ApiResponse::success(StatusCode::OK, "Key CRM actualizada", updated))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        get_all_users,
        get_marketing_user,
        update_vacations,
        get_me,
        get_google_users,
        get_google_user_list,
        update_key_crm
    ),
    components(schemas(User, UserRole, Cartera, MarketingUser, VacationUpdate, KeyCrmUpdate)),
    tags((name = "Usuarios", description = "Local users and auth service proxy")),
    modifiers(&SecurityAddon)
)]
pub struct UserDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn vacation_shapes_are_checked() {
        let ok = VacationUpdate {
            periodos: json!([{ "inicio": "2024-01-02", "fin": "2024-01-15" }]),
            dias_pendientes: json!({ "2024": 5 }),
        };
        assert!(validate_vacations(&ok).is_ok());

        let bad = VacationUpdate {
            periodos: json!({ "inicio": "2024-01-02" }),
            dias_pendientes: json!({}),
        };
        let err = validate_vacations(&bad).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
