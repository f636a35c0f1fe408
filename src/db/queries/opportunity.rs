use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use utoipa::OpenApi;

use crate::api::auth::SecurityAddon;
use crate::db::models::opportunity::{Opportunity, OpportunityFilterParams};
use crate::utils::api_response::ApiResponse;
use crate::utils::error::AppError;
use crate::utils::pagination::{Page, PageParams};

const OPPORTUNITY_COLUMNS: &str = "id, nombre, propuesta_id, programa_id, vendedor_id, monto_propuesto, \
     descuento, etapa_venta, fecha_matricula, becado, descuento_atipico, ratio_atipico, eliminado";

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, params: &OpportunityFilterParams) {
    builder.push(" WHERE TRUE");
    if !params.incluir_eliminados.unwrap_or(false) {
        builder.push(" AND NOT eliminado");
    }
    if let Some(propuesta_id) = params.propuesta_id {
        builder.push(" AND propuesta_id = ").push_bind(propuesta_id);
    }
    if let Some(programa_id) = params.programa_id {
        builder.push(" AND programa_id = ").push_bind(programa_id);
    }
}

/// List opportunities
///
/// Soft-deleted opportunities are hidden unless `incluir_eliminados=true`.
#[utoipa::path(
    get,
    path = "/oportunidad",
    params(OpportunityFilterParams),
    responses(
        (status = 200, description = "Opportunities retrieved", body = Page<Opportunity>),
        (status = 500, description = "Internal server error")
    ),
    tag = "Oportunidades",
    security(("bearerAuth" = []))
)]
pub async fn get_all_opportunities(
    State(pool): State<PgPool>,
    Query(params): Query<OpportunityFilterParams>,
) -> Result<ApiResponse<Page<Opportunity>>, ApiResponse<()>> {
    let page_params = PageParams {
        page: params.page,
        size: params.size,
    };

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM oportunidades");
    push_filters(&mut count, &params);
    let total: i64 = count
        .build_query_scalar()
        .fetch_one(&pool)
        .await
        .map_err(AppError::from)?;

    let mut select =
        QueryBuilder::<Postgres>::new(format!("SELECT {OPPORTUNITY_COLUMNS} FROM oportunidades"));
    push_filters(&mut select, &params);
    select
        .push(" ORDER BY nombre, id LIMIT ")
        .push_bind(page_params.limit())
        .push(" OFFSET ")
        .push_bind(page_params.offset());
    let items = select
        .build_query_as::<Opportunity>()
        .fetch_all(&pool)
        .await
        .map_err(AppError::from)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Oportunidades",
        Page::new(items, total, &page_params),
    ))
}

/// Get a single opportunity
#[utoipa::path(
    get,
    path = "/oportunidad/{id}",
    params(("id" = i32, Path, description = "Opportunity ID")),
    responses(
        (status = 200, description = "Opportunity found", body = Opportunity),
        (status = 404, description = "Opportunity not found")
    ),
    tag = "Oportunidades",
    security(("bearerAuth" = []))
)]
pub async fn get_opportunity(
    State(pool): State<PgPool>,
    Path(id): Path<i32>,
) -> Result<ApiResponse<Opportunity>, ApiResponse<()>> {
    let sql = format!("SELECT {OPPORTUNITY_COLUMNS} FROM oportunidades WHERE id = $1");
    let opportunity = sqlx::query_as::<_, Opportunity>(&sql)
        .bind(id)
        .fetch_optional(&pool)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found(format!("Oportunidad {id} no encontrada")))?;

    Ok(ApiResponse::success(StatusCode::OK, "Oportunidad encontrada", opportunity))
}

#[derive(OpenApi)]
#[openapi(
    paths(get_all_opportunities, get_opportunity),
    components(schemas(Opportunity)),
    tags((name = "Oportunidades", description = "Student enrollments")),
    modifiers(&SecurityAddon)
)]
pub struct OpportunityDoc;
