use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use utoipa::OpenApi;

use crate::api::auth::SecurityAddon;
use crate::db::models::program::{Program, ProgramFilterParams};
use crate::utils::api_response::ApiResponse;
use crate::utils::error::AppError;
use crate::utils::pagination::{Page, PageParams};

const PROGRAM_COLUMNS: &str =
    "p.id, p.codigo, p.nombre, p.cartera_id, p.precio_lista, p.fecha_inauguracion, p.no_abrir, p.no_computar";

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, params: &ProgramFilterParams) {
    if let Some(propuesta_id) = params.propuesta_id {
        builder
            .push(" JOIN propuesta_programas pp ON pp.programa_id = p.id AND pp.propuesta_id = ")
            .push_bind(propuesta_id);
    }
}

/// List programs
#[utoipa::path(
    get,
    path = "/programa",
    params(ProgramFilterParams),
    responses(
        (status = 200, description = "Programs retrieved", body = Page<Program>),
        (status = 500, description = "Internal server error")
    ),
    tag = "Programas",
    security(("bearerAuth" = []))
)]
pub async fn get_all_programs(
    State(pool): State<PgPool>,
    Query(params): Query<ProgramFilterParams>,
) -> Result<ApiResponse<Page<Program>>, ApiResponse<()>> {
    let page_params = PageParams {
        page: params.page,
        size: params.size,
    };

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM programas p");
    push_filters(&mut count, &params);
    let total: i64 = count
        .build_query_scalar()
        .fetch_one(&pool)
        .await
        .map_err(AppError::from)?;

    let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {PROGRAM_COLUMNS} FROM programas p"));
    push_filters(&mut select, &params);
    select
        .push(" ORDER BY p.codigo LIMIT ")
        .push_bind(page_params.limit())
        .push(" OFFSET ")
        .push_bind(page_params.offset());
    let programs = select
        .build_query_as::<Program>()
        .fetch_all(&pool)
        .await
        .map_err(AppError::from)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Programas",
        Page::new(programs, total, &page_params),
    ))
}

/// Get a single program
#[utoipa::path(
    get,
    path = "/programa/{id}",
    params(("id" = i32, Path, description = "Program ID")),
    responses(
        (status = 200, description = "Program found", body = Program),
        (status = 404, description = "Program not found")
    ),
    tag = "Programas",
    security(("bearerAuth" = []))
)]
pub async fn get_program(
    State(pool): State<PgPool>,
    Path(id): Path<i32>,
) -> Result<ApiResponse<Program>, ApiResponse<()>> {
    let sql = format!("SELECT {PROGRAM_COLUMNS} FROM programas p WHERE p.id = $1");
    let program = sqlx::query_as::<_, Program>(&sql)
        .bind(id)
        .fetch_optional(&pool)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found(format!("Programa {id} no encontrado")))?;

    Ok(ApiResponse::success(StatusCode::OK, "Programa encontrado", program))
}

#[derive(OpenApi)]
#[openapi(
    paths(get_all_programs, get_program),
    components(schemas(Program)),
    tags((name = "Programas", description = "Programs offered in a proposal")),
    modifiers(&SecurityAddon)
)]
pub struct ProgramDoc;
