use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::info;
use utoipa::OpenApi;

use crate::api::auth::SecurityAddon;
use crate::app_state::AppState;
use crate::db::models::program::Program;
use crate::db::models::proposal::{
    AdvanceResponse, ImportRequest, ImportSummary, NewProposal, Proposal, ProposalDetail,
    ProposalFilterParams, ProposalStage,
};
use crate::db::models::request::{RequestType, RequestValue};
use crate::db::models::user::{UserRole, UserSummary};
use crate::db::queries::importer::run_import;
use crate::utils::api_response::ApiResponse;
use crate::utils::extract::ApiJson;
use crate::utils::error::{AppError, AppResult};
use crate::utils::pagination::{Page, PageParams};
use crate::workflow::stage::{evaluate_advance, AdvanceDecision, FinanceBlocker, OwnRequest};

const PROPOSAL_COLUMNS: &str = "id, nombre, periodo, estado, created_at";

/// Stages selected by the `estado` filter. Without one, closed stages are hidden.
pub fn stages_for_filter(raw: Option<&str>) -> AppResult<Vec<ProposalStage>> {
    let raw = raw.map(str::trim).filter(|r| !r.is_empty());
    let Some(raw) = raw else {
        return Ok(ProposalStage::ORDER
            .iter()
            .chain(std::iter::once(&ProposalStage::Cancelada))
            .copied()
            .filter(|s| !ProposalStage::CLOSED.contains(s))
            .collect());
    };

    let mut stages = Vec::new();
    for part in raw.split(',').filter(|p| !p.trim().is_empty()) {
        let stage = ProposalStage::parse(part)
            .ok_or_else(|| AppError::BadRequest(format!("Estado desconocido: {}", part.trim())))?;
        if !stages.contains(&stage) {
            stages.push(stage);
        }
    }
    Ok(stages)
}

fn push_stage_filter(builder: &mut QueryBuilder<'_, Postgres>, stages: &[ProposalStage]) {
    builder.push(" WHERE estado IN (");
    let mut separated = builder.separated(", ");
    for stage in stages {
        separated.push_bind(*stage);
    }
    separated.push_unseparated(")");
}

pub(crate) async fn fetch_proposal(pool: &PgPool, id: i32) -> AppResult<Proposal> {
    let sql = format!("SELECT {PROPOSAL_COLUMNS} FROM propuestas WHERE id = $1");
    sqlx::query_as::<_, Proposal>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Propuesta {id} no encontrada")))
}

/// Advances a proposal one stage, or explains what blocks it.
pub async fn advance_proposal(
    pool: &PgPool,
    user: &UserSummary,
    proposal_id: i32,
) -> AppResult<AdvanceResponse> {
    let mut tx = pool.begin().await?;

    let current: ProposalStage =
        sqlx::query_scalar("SELECT estado FROM propuestas WHERE id = $1 FOR UPDATE")
            .bind(proposal_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Propuesta {proposal_id} no encontrada")))?;

    // Requests the caller opened, whichever side currently holds them.
    let own_open: Vec<OwnRequest> = sqlx::query_as::<_, (RequestType, RequestValue)>(
        "SELECT tipo, valor FROM solicitudes
         WHERE propuesta_id = $1 AND creador_id = $2 AND abierta",
    )
    .bind(proposal_id)
    .bind(user.id)
    .fetch_all(&mut *tx)
    .await?
    .into_iter()
    .map(|(tipo, valor)| OwnRequest { tipo, valor })
    .collect();

    let finance_blockers = if current == ProposalStage::Preconciliada {
        sqlx::query_as::<_, FinanceBlocker>(
            "SELECT u.nombre, COUNT(s.id) AS pendientes
             FROM usuarios u
             JOIN solicitudes s ON s.generador_id = u.id OR s.receptor_id = u.id
             WHERE u.rol = $1 AND s.propuesta_id = $2 AND s.abierta AND s.valor <> $3
             GROUP BY u.id, u.nombre
             ORDER BY u.id",
        )
        .bind(UserRole::FinanceSupervisor)
        .bind(proposal_id)
        .bind(RequestValue::Aceptado)
        .fetch_all(&mut *tx)
        .await?
    } else {
        Vec::new()
    };

    match evaluate_advance(current, user.rol, &own_open, &finance_blockers)? {
        AdvanceDecision::Refused(mensaje) => {
            info!(proposal_id, user_id = user.id, %mensaje, "Stage advance refused");
            Ok(AdvanceResponse {
                avanzada: false,
                estado: current,
                mensaje,
                solicitudes_cerradas: 0,
            })
        }
        AdvanceDecision::Advance { to, close_own } => {
            let solicitudes_cerradas = if close_own {
                sqlx::query(
                    "UPDATE solicitudes SET abierta = FALSE
                     WHERE propuesta_id = $1 AND creador_id = $2 AND abierta AND tipo <> $3",
                )
                .bind(proposal_id)
                .bind(user.id)
                .bind(RequestType::AprobacionJp)
                .execute(&mut *tx)
                .await?
                .rows_affected()
            } else {
                0
            };

            sqlx::query("UPDATE propuestas SET estado = $1 WHERE id = $2")
                .bind(to)
                .bind(proposal_id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;

            info!(
                proposal_id,
                from = current.as_str(),
                to = to.as_str(),
                solicitudes_cerradas,
                "Proposal advanced"
            );
            Ok(AdvanceResponse {
                avanzada: true,
                estado: to,
                mensaje: format!("Propuesta avanzada a {}", to.as_str()),
                solicitudes_cerradas,
            })
        }
    }
}

/// List proposals
#[utoipa::path(
    get,
    path = "/propuesta",
    params(ProposalFilterParams),
    responses(
        (status = 200, description = "Proposals retrieved", body = Page<Proposal>),
        (status = 400, description = "Unknown stage in filter")
    ),
    tag = "Propuestas",
    security(("bearerAuth" = []))
)]
pub async fn get_all_proposals(
    State(pool): State<PgPool>,
    Query(params): Query<ProposalFilterParams>,
) -> Result<ApiResponse<Page<Proposal>>, ApiResponse<()>> {
    let stages = stages_for_filter(params.estado.as_deref())?;
    let page_params = PageParams {
        page: params.page,
        size: params.size,
    };
    if stages.is_empty() {
        return Ok(ApiResponse::success(
            StatusCode::OK,
            "Propuestas",
            Page::new(Vec::new(), 0, &page_params),
        ));
    }

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM propuestas");
    push_stage_filter(&mut count, &stages);
    let total: i64 = count
        .build_query_scalar()
        .fetch_one(&pool)
        .await
        .map_err(AppError::from)?;

    let mut select =
        QueryBuilder::<Postgres>::new(format!("SELECT {PROPOSAL_COLUMNS} FROM propuestas"));
    push_stage_filter(&mut select, &stages);
    select
        .push(" ORDER BY created_at DESC, id DESC LIMIT ")
        .push_bind(page_params.limit())
        .push(" OFFSET ")
        .push_bind(page_params.offset());
    let items = select
        .build_query_as::<Proposal>()
        .fetch_all(&pool)
        .await
        .map_err(AppError::from)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Propuestas",
        Page::new(items, total, &page_params),
    ))
}

/// Get a proposal with its programs
#[utoipa::path(
    get,
    path = "/propuesta/{id}",
    params(("id" = i32, Path, description = "Proposal ID")),
    responses(
        (status = 200, description = "Proposal found", body = ProposalDetail),
        (status = 404, description = "Proposal not found")
    ),
    tag = "Propuestas",
    security(("bearerAuth" = []))
)]
pub async fn get_proposal(
    State(pool): State<PgPool>,
    Path(id): Path<i32>,
) -> Result<ApiResponse<ProposalDetail>, ApiResponse<()>> {
    let propuesta = fetch_proposal(&pool, id).await?;
    let programas = sqlx::query_as::<_, Program>(
        "SELECT p.id, p.codigo, p.nombre, p.cartera_id, p.precio_lista, p.fecha_inauguracion,
                p.no_abrir, p.no_computar
         FROM programas p
         JOIN propuesta_programas pp ON pp.programa_id = p.id
         WHERE pp.propuesta_id = $1
         ORDER BY p.codigo",
    )
    .bind(id)
    .fetch_all(&pool)
    .await
    .map_err(AppError::from)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Propuesta encontrada",
        ProposalDetail {
            propuesta,
            programas,
        },
    ))
}

/// Advance a proposal one stage
///
/// A refusal is a normal answer with `avanzada = false` and the reason.
#[utoipa::path(
    post,
    path = "/propuesta/{id}/avanzar",
    params(("id" = i32, Path, description = "Proposal ID")),
    responses(
        (status = 200, description = "Advanced, or refused with a reason", body = AdvanceResponse),
        (status = 404, description = "Proposal not found"),
        (status = 409, description = "Proposal is in a terminal stage")
    ),
    tag = "Propuestas",
    security(("bearerAuth" = []))
)]
pub async fn advance_proposal_stage(
    State(pool): State<PgPool>,
    Extension(user): Extension<UserSummary>,
    Path(id): Path<i32>,
) -> Result<ApiResponse<AdvanceResponse>, ApiResponse<()>> {
    let outcome = advance_proposal(&pool, &user, id).await?;
    let message = outcome.mensaje.clone();
    Ok(ApiResponse::success(StatusCode::OK, message, outcome))
}

/// Cancel a proposal
#[utoipa::path(
    post,
    path = "/propuesta/{id}/cancelar",
    params(("id" = i32, Path, description = "Proposal ID")),
    responses(
        (status = 200, description = "Proposal cancelled", body = Proposal),
        (status = 403, description = "Caller may not cancel proposals"),
        (status = 404, description = "Proposal not found"),
        (status = 409, description = "Proposal already closed")
    ),
    tag = "Propuestas",
    security(("bearerAuth" = []))
)]
pub async fn cancel_proposal(
    State(pool): State<PgPool>,
    Extension(user): Extension<UserSummary>,
    Path(id): Path<i32>,
) -> Result<ApiResponse<Proposal>, ApiResponse<()>> {
    if user.rol == UserRole::ProductManager {
        return Err(ApiResponse::error(
            StatusCode::FORBIDDEN,
            "Un jefe de producto no puede cancelar propuestas",
            None,
        ));
    }

    let sql = format!(
        "UPDATE propuestas SET estado = $1 WHERE id = $2 AND estado NOT IN ($3, $4)
         RETURNING {PROPOSAL_COLUMNS}"
    );
    let updated = sqlx::query_as::<_, Proposal>(&sql)
        .bind(ProposalStage::Cancelada)
        .bind(id)
        .bind(ProposalStage::Conciliada)
        .bind(ProposalStage::Cancelada)
        .fetch_optional(&pool)
        .await
        .map_err(AppError::from)?;

    match updated {
        Some(propuesta) => {
            info!(proposal_id = id, user_id = user.id, "Proposal cancelled");
            Ok(ApiResponse::success(StatusCode::OK, "Propuesta cancelada", propuesta))
        }
        None => {
            let existing = fetch_proposal(&pool, id).await?;
            Err(AppError::Conflict(format!(
                "La propuesta ya está en estado {}",
                existing.estado.as_str()
            ))
            .into())
        }
    }
}

/// Import a reconciliation CSV into a new proposal
#[utoipa::path(
    post,
    path = "/propuesta/importar",
    request_body = ImportRequest,
    responses(
        (status = 201, description = "Proposal created from the CSV", body = ImportSummary),
        (status = 400, description = "Malformed CSV or download failure"),
        (status = 500, description = "Import rolled back")
    ),
    tag = "Propuestas",
    security(("bearerAuth" = []))
)]
pub async fn import_proposal(
    State(state): State<AppState>,
    Extension(user): Extension<UserSummary>,
    ApiJson(payload): ApiJson<ImportRequest>,
) -> Result<ApiResponse<ImportSummary>, ApiResponse<()>> {
    let summary = run_import(&state, &payload).await?;
    info!(
        proposal_id = summary.propuesta_id,
        user_id = user.id,
        oportunidades = summary.oportunidades,
        omitidas = summary.filas_omitidas,
        "CSV import finished"
    );
    Ok(ApiResponse::success(
        StatusCode::CREATED,
        "Propuesta importada",
        summary,
    ))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        get_all_proposals,
        get_proposal,
        advance_proposal_stage,
        cancel_proposal,
        import_proposal
    ),
    components(schemas(
        Proposal,
        ProposalStage,
        ProposalDetail,
        AdvanceResponse,
        NewProposal,
        ImportRequest,
        ImportSummary
    )),
    tags((name = "Propuestas", description = "Reconciliation proposals")),
    modifiers(&SecurityAddon)
)]
pub struct ProposalDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_hides_closed_stages() {
        let stages = stages_for_filter(None).unwrap();
        assert!(!stages.contains(&ProposalStage::Conciliada));
        assert!(!stages.contains(&ProposalStage::Cancelada));
        assert_eq!(stages.len(), 4);
        assert_eq!(stages_for_filter(Some("  ")).unwrap(), stages);
    }

    #[test]
    fn explicit_filter_is_exact() {
        assert_eq!(
            stages_for_filter(Some("CONCILIADA")).unwrap(),
            vec![ProposalStage::Conciliada]
        );
        assert_eq!(
            stages_for_filter(Some("creada, preconciliada,CREADA")).unwrap(),
            vec![ProposalStage::Creada, ProposalStage::Preconciliada]
        );
    }

    #[test]
    fn unknown_stage_is_a_client_error() {
        let err = stages_for_filter(Some("CREADA,ABIERTA")).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    mod advance {
        use super::*;
        use bigdecimal::BigDecimal;
        use tokio_test::assert_ok;

        use crate::db::models::request::{NewRequest, TransitionRequest};
        use crate::db::queries::fixtures;
        use crate::db::queries::requests::{apply_transition, open_request};

        fn answer(valor: RequestValue, monto: Option<i32>) -> TransitionRequest {
            TransitionRequest {
                valor,
                comentario: String::new(),
                monto: monto.map(BigDecimal::from),
                fecha: None,
            }
        }

        #[sqlx::test(migrations = "./migrations")]
        async fn request_bounced_by_finance_blocks_its_author(pool: PgPool) {
            let state = fixtures::state(pool.clone());
            let jp = fixtures::user(&pool, "Bruno", UserRole::ProductManager).await;
            let daf = fixtures::user(&pool, "Daniela", UserRole::FinanceSupervisor).await;
            let propuesta = fixtures::proposal(&pool, ProposalStage::RevisionJp).await;
            let programa = fixtures::program(&pool, propuesta, "MBA-01", "1000000").await;
            let oportunidad = fixtures::opportunity(&pool, propuesta, programa, "MATRICULADO").await;

            let opened = assert_ok!(
                open_request(
                    &state,
                    &jp,
                    &NewRequest {
                        tipo: RequestType::EdicionAlumno,
                        oportunidad_id: Some(oportunidad),
                        programa_id: None,
                        propuesta_id: None,
                        comentario: "descuento acordado".into(),
                        monto: Some(BigDecimal::from(800000)),
                        fecha: None,
                    },
                )
                .await
            );
            let id = opened.solicitud.id;

            // Finance counters, so the request now sits with the JP.
            assert_ok!(
                apply_transition(&state, &daf, id, &answer(RequestValue::Rechazado, Some(900000)))
                    .await
            );
            let refused = assert_ok!(advance_proposal(&pool, &jp, propuesta).await);
            assert!(!refused.avanzada);
            assert_eq!(refused.estado, ProposalStage::RevisionJp);

            assert_ok!(apply_transition(&state, &jp, id, &answer(RequestValue::Aceptado, None)).await);
            let advanced = assert_ok!(advance_proposal(&pool, &jp, propuesta).await);
            assert!(advanced.avanzada);
            assert_eq!(advanced.estado, ProposalStage::RevisionSubdireccion);
            assert_eq!(advanced.solicitudes_cerradas, 1);

            let abierta: bool = sqlx::query_scalar("SELECT abierta FROM solicitudes WHERE id = $1")
                .bind(id)
                .fetch_one(&pool)
                .await
                .unwrap();
            assert!(!abierta);
            let estado: ProposalStage =
                sqlx::query_scalar("SELECT estado FROM propuestas WHERE id = $1")
                    .bind(propuesta)
                    .fetch_one(&pool)
                    .await
                    .unwrap();
            assert_eq!(estado, ProposalStage::RevisionSubdireccion);
        }

        #[sqlx::test(migrations = "./migrations")]
        async fn preconciled_proposal_waits_for_finance(pool: PgPool) {
            let state = fixtures::state(pool.clone());
            let jp = fixtures::user(&pool, "Bruno", UserRole::ProductManager).await;
            let daf = fixtures::user(&pool, "Daniela", UserRole::FinanceSupervisor).await;
            let propuesta = fixtures::proposal(&pool, ProposalStage::Preconciliada).await;

            assert_ok!(
                open_request(
                    &state,
                    &jp,
                    &NewRequest {
                        tipo: RequestType::AprobacionDaf,
                        oportunidad_id: None,
                        programa_id: None,
                        propuesta_id: Some(propuesta),
                        comentario: String::new(),
                        monto: None,
                        fecha: None,
                    },
                )
                .await
            );

            let refused = assert_ok!(advance_proposal(&pool, &daf, propuesta).await);
            assert!(!refused.avanzada);
            assert!(refused.mensaje.contains("Daniela"), "{}", refused.mensaje);
            assert_eq!(refused.solicitudes_cerradas, 0);
        }
    }
}
