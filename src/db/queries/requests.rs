use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension,
};
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool};
use tracing::{info, warn};
use utoipa::OpenApi;

use crate::api::auth::SecurityAddon;
use crate::app_state::AppState;
use crate::db::models::audit_log::AuditLogEntry;
use crate::db::models::opportunity::STAGE_PENDING_ADD;
use crate::db::models::request::{
    NewRequest, OpportunityLink, ProgramLink, Request, RequestDetail, RequestType, RequestValue,
    TransitionRequest,
};
use crate::db::models::user::{UserRole, UserSummary};
use crate::db::queries::audit_log::{insert_entry, resolve_names};
use crate::db::queries::user::first_user_with_role;
use crate::utils::api_response::ApiResponse;
use crate::utils::extract::ApiJson;
use crate::utils::error::{AppError, AppResult};
use crate::utils::pagination::{Page, PageParams};
use crate::workflow::creation::{validate_new_request, CreationTarget};
use crate::workflow::negotiation::{
    comment_entry, Decision, Effect, RequestKind, RequestState, TransitionInput,
};

pub(crate) const REQUEST_COLUMNS: &str = "id, creador_id, generador_id, receptor_id, propuesta_id, \
     tipo, valor, abierta, comentario, invertida, version, created_at";

const OPPORTUNITY_LINK_COLUMNS: &str = "solicitud_id, oportunidad_id, monto_propuesto, monto_objetado, \
     etapa_anterior, fecha_matricula_anterior";

pub(crate) async fn fetch_request(conn: &mut PgConnection, id: i32) -> AppResult<Request> {
    let sql = format!("SELECT {REQUEST_COLUMNS} FROM solicitudes WHERE id = $1");
    sqlx::query_as::<_, Request>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Solicitud {id} no encontrada")))
}

async fn fetch_links(
    conn: &mut PgConnection,
    id: i32,
) -> AppResult<(Option<OpportunityLink>, Option<ProgramLink>)> {
    let sql = format!(
        "SELECT {OPPORTUNITY_LINK_COLUMNS} FROM solicitud_oportunidad WHERE solicitud_id = $1"
    );
    let opportunity = sqlx::query_as::<_, OpportunityLink>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    let program = sqlx::query_as::<_, ProgramLink>(
        "SELECT solicitud_id, programa_id, fecha_inauguracion_propuesta, fecha_objetada
         FROM solicitud_programa WHERE solicitud_id = $1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok((opportunity, program))
}

async fn load_detail(conn: &mut PgConnection, id: i32) -> AppResult<RequestDetail> {
    let solicitud = fetch_request(&mut *conn, id).await?;
    let (oportunidad, programa) = fetch_links(&mut *conn, id).await?;
    Ok(RequestDetail {
        solicitud,
        oportunidad,
        programa,
    })
}

/// Opens a request, attaches its detail link and applies creation side effects.
pub async fn open_request(
    state: &AppState,
    user: &UserSummary,
    payload: &NewRequest,
) -> AppResult<RequestDetail> {
    let target = validate_new_request(payload)?;
    let now = state.clock.now();
    let mut tx = state.pool.begin().await?;

    let receptor_id = match first_user_with_role(&mut tx, payload.tipo.receiver_role()).await? {
        Some(id) => id,
        None => {
            warn!(
                role = payload.tipo.receiver_role().as_str(),
                fallback = state.config.default_supervisor_id,
                "No user holds the receiver role, using the default supervisor"
            );
            state.config.default_supervisor_id
        }
    };

    // Stage and enrollment date of the opportunity, remembered for
    // add-student requests so an inverted accept can restore them.
    let mut previous: (Option<String>, Option<NaiveDate>) = (None, None);
    let propuesta_id = match target {
        CreationTarget::Opportunity(id) => {
            let (propuesta_id, etapa, fecha): (i32, Option<String>, Option<NaiveDate>) =
                sqlx::query_as(
                    "SELECT propuesta_id, etapa_venta, fecha_matricula
                     FROM oportunidades WHERE id = $1 FOR UPDATE",
                )
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::not_found(format!("Oportunidad {id} no encontrada")))?;
            previous = (etapa, fecha);
            propuesta_id
        }
        CreationTarget::Program(id) => {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM programas WHERE id = $1)")
                    .bind(id)
                    .fetch_one(&mut *tx)
                    .await?;
            if !exists {
                return Err(AppError::not_found(format!("Programa {id} no encontrado")));
            }
            match payload.propuesta_id {
                Some(propuesta_id) => propuesta_id,
                None => sqlx::query_scalar(
                    "SELECT propuesta_id FROM propuesta_programas
                     WHERE programa_id = $1 ORDER BY propuesta_id DESC LIMIT 1",
                )
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(AppError::MissingField("propuesta_id"))?,
            }
        }
        CreationTarget::Proposal(id) => id,
    };

    let proposal_exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM propuestas WHERE id = $1)")
            .bind(propuesta_id)
            .fetch_one(&mut *tx)
            .await?;
    if !proposal_exists {
        return Err(AppError::not_found(format!(
            "Propuesta {propuesta_id} no encontrada"
        )));
    }

    let comentario = if payload.comentario.trim().is_empty() {
        String::new()
    } else {
        comment_entry(now, &user.nombre, "PENDIENTE", &payload.comentario)
    };

    let sql = format!(
        "INSERT INTO solicitudes
             (creador_id, generador_id, receptor_id, propuesta_id, tipo, comentario, created_at)
         VALUES ($1, $1, $2, $3, $4, $5, $6)
         RETURNING {REQUEST_COLUMNS}"
    );
    let solicitud = sqlx::query_as::<_, Request>(&sql)
        .bind(user.id)
        .bind(receptor_id)
        .bind(propuesta_id)
        .bind(payload.tipo)
        .bind(&comentario)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

    let mut oportunidad = None;
    let mut programa = None;
    match target {
        CreationTarget::Opportunity(oportunidad_id) => {
            let (etapa_anterior, fecha_anterior) = if payload.tipo == RequestType::AgregarAlumno {
                sqlx::query(
                    "UPDATE oportunidades SET etapa_venta = $1, fecha_matricula = $2 WHERE id = $3",
                )
                .bind(STAGE_PENDING_ADD)
                .bind(state.clock.today())
                .bind(oportunidad_id)
                .execute(&mut *tx)
                .await?;
                previous
            } else {
                (None, None)
            };

            let sql = format!(
                "INSERT INTO solicitud_oportunidad
                     (solicitud_id, oportunidad_id, monto_propuesto, etapa_anterior,
                      fecha_matricula_anterior)
                 VALUES ($1, $2, $3, $4, $5)
                 RETURNING {OPPORTUNITY_LINK_COLUMNS}"
            );
            oportunidad = Some(
                sqlx::query_as::<_, OpportunityLink>(&sql)
                    .bind(solicitud.id)
                    .bind(oportunidad_id)
                    .bind(&payload.monto)
                    .bind(etapa_anterior)
                    .bind(fecha_anterior)
                    .fetch_one(&mut *tx)
                    .await?,
            );
        }
        CreationTarget::Program(programa_id) => {
            programa = Some(
                sqlx::query_as::<_, ProgramLink>(
                    "INSERT INTO solicitud_programa
                         (solicitud_id, programa_id, fecha_inauguracion_propuesta)
                     VALUES ($1, $2, $3)
                     RETURNING solicitud_id, programa_id, fecha_inauguracion_propuesta, fecha_objetada",
                )
                .bind(solicitud.id)
                .bind(programa_id)
                .bind(payload.fecha)
                .fetch_one(&mut *tx)
                .await?,
            );
        }
        CreationTarget::Proposal(_) => {}
    }

    let current = RequestState::from_rows(&solicitud, oportunidad.as_ref(), programa.as_ref())?;
    let names = resolve_names(&mut tx, &current).await?;
    insert_entry(&mut tx, &current, &names, "CREADA", now).await?;

    tx.commit().await?;
    info!(
        request_id = solicitud.id,
        tipo = ?solicitud.tipo,
        generador = user.id,
        receptor = receptor_id,
        "Request opened"
    );

    Ok(RequestDetail {
        solicitud,
        oportunidad,
        programa,
    })
}

/// Accepts or rejects a request inside one transaction.
pub async fn apply_transition(
    state: &AppState,
    user: &UserSummary,
    request_id: i32,
    payload: &TransitionRequest,
) -> AppResult<RequestDetail> {
    let decision = Decision::try_from(payload.valor)?;
    let now = state.clock.now();
    let mut tx = state.pool.begin().await?;

    let request = fetch_request(&mut tx, request_id).await?;
    let (opportunity, program) = fetch_links(&mut tx, request_id).await?;
    let mut current = RequestState::from_rows(&request, opportunity.as_ref(), program.as_ref())?;
    current.ensure_can_act(user.id, user.is_admin())?;

    let list_price: Option<BigDecimal> = match &current.kind {
        RequestKind::StudentEdit { opportunity_id, .. } => sqlx::query_scalar::<_, Option<BigDecimal>>(
            "SELECT p.precio_lista FROM oportunidades o
             JOIN programas p ON p.id = o.programa_id
             WHERE o.id = $1",
        )
        .bind(opportunity_id)
        .fetch_optional(&mut *tx)
        .await?
        .flatten(),
        _ => None,
    };

    let input = TransitionInput {
        decision,
        author: &user.nombre,
        comment: &payload.comentario,
        counter_amount: payload.monto.clone(),
        counter_date: payload.fecha,
        list_price: list_price.as_ref(),
        now,
    };
    let effects = current.transition(&input)?;

    for effect in &effects {
        apply_effect(&mut tx, effect).await?;
    }
    save_state(&mut tx, &current, request.version).await?;
    save_link(&mut tx, &current).await?;

    let names = resolve_names(&mut tx, &current).await?;
    let event = decision.value();
    insert_entry(&mut tx, &current, &names, event_label(event), now).await?;

    let detail = load_detail(&mut tx, request_id).await?;
    tx.commit().await?;

    info!(
        request_id,
        valor = ?event,
        invertida = current.is_inverted(),
        effects = effects.len(),
        "Request transitioned"
    );
    Ok(detail)
}

fn event_label(value: RequestValue) -> &'static str {
    match value {
        RequestValue::Aceptado => "ACEPTADO",
        RequestValue::Rechazado => "RECHAZADO",
        RequestValue::Pendiente => "PENDIENTE",
    }
}

async fn apply_effect(conn: &mut PgConnection, effect: &Effect) -> AppResult<()> {
    let (result, what, id) = match effect {
        Effect::ProgramExclusion {
            program_id,
            excluded,
        } => (
            sqlx::query("UPDATE programas SET no_abrir = $1, no_computar = $1 WHERE id = $2")
                .bind(excluded)
                .bind(program_id)
                .execute(&mut *conn)
                .await?,
            "Programa",
            *program_id,
        ),
        Effect::ProgramInauguration { program_id, date } => (
            sqlx::query("UPDATE programas SET fecha_inauguracion = $1 WHERE id = $2")
                .bind(date)
                .bind(program_id)
                .execute(&mut *conn)
                .await?,
            "Programa",
            *program_id,
        ),
        Effect::OpportunityStage {
            opportunity_id,
            stage,
        } => (
            sqlx::query("UPDATE oportunidades SET etapa_venta = $1 WHERE id = $2")
                .bind(stage)
                .bind(opportunity_id)
                .execute(&mut *conn)
                .await?,
            "Oportunidad",
            *opportunity_id,
        ),
        Effect::OpportunityRestore {
            opportunity_id,
            stage,
            enrollment_date,
        } => (
            sqlx::query(
                "UPDATE oportunidades SET etapa_venta = $1, fecha_matricula = $2 WHERE id = $3",
            )
            .bind(stage)
            .bind(enrollment_date)
            .bind(opportunity_id)
            .execute(&mut *conn)
            .await?,
            "Oportunidad",
            *opportunity_id,
        ),
        Effect::OpportunitySoftDelete {
            opportunity_id,
            deleted,
        } => (
            sqlx::query("UPDATE oportunidades SET eliminado = $1 WHERE id = $2")
                .bind(deleted)
                .bind(opportunity_id)
                .execute(&mut *conn)
                .await?,
            "Oportunidad",
            *opportunity_id,
        ),
        Effect::OpportunityAmount {
            opportunity_id,
            amount,
            discount,
        } => (
            sqlx::query(
                "UPDATE oportunidades SET monto_propuesto = $1, descuento = COALESCE($2, descuento)
                 WHERE id = $3",
            )
            .bind(amount)
            .bind(discount)
            .bind(opportunity_id)
            .execute(&mut *conn)
            .await?,
            "Oportunidad",
            *opportunity_id,
        ),
    };

    if result.rows_affected() == 0 {
        return Err(AppError::not_found(format!("{what} {id} no encontrado")));
    }
    Ok(())
}

/// Writes the request row back, guarded by the version read at load time.
async fn save_state(conn: &mut PgConnection, state: &RequestState, version: i32) -> AppResult<()> {
    let result = sqlx::query(
        "UPDATE solicitudes
         SET generador_id = $1, receptor_id = $2, valor = $3, abierta = $4,
             comentario = $5, invertida = $6, created_at = $7, version = version + 1
         WHERE id = $8 AND version = $9",
    )
    .bind(state.generator_id)
    .bind(state.receiver_id)
    .bind(state.value)
    .bind(state.open)
    .bind(&state.comment)
    .bind(state.is_inverted())
    .bind(state.updated_at)
    .bind(state.id)
    .bind(version)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::Conflict(format!(
            "La solicitud {} fue modificada por otro usuario, recarga e intenta nuevamente",
            state.id
        )));
    }
    Ok(())
}

async fn save_link(conn: &mut PgConnection, state: &RequestState) -> AppResult<()> {
    match &state.kind {
        RequestKind::StudentEdit { amounts, .. } => {
            sqlx::query(
                "UPDATE solicitud_oportunidad SET monto_propuesto = $1, monto_objetado = $2
                 WHERE solicitud_id = $3",
            )
            .bind(&amounts.proposed)
            .bind(&amounts.objected)
            .bind(state.id)
            .execute(conn)
            .await?;
        }
        RequestKind::DateChange { dates, .. } => {
            sqlx::query(
                "UPDATE solicitud_programa SET fecha_inauguracion_propuesta = $1, fecha_objetada = $2
                 WHERE solicitud_id = $3",
            )
            .bind(dates.proposed)
            .bind(dates.objected)
            .bind(state.id)
            .execute(conn)
            .await?;
        }
        _ => {}
    }
    Ok(())
}

#[derive(Clone, Copy)]
enum Party {
    Receiver,
    Generator,
}

async fn open_requests_for(
    pool: &PgPool,
    user_id: i32,
    party: Party,
    types: Option<&[RequestType]>,
    params: &PageParams,
) -> AppResult<Page<Request>> {
    let column = match party {
        Party::Receiver => "receptor_id",
        Party::Generator => "generador_id",
    };

    let mut count = sqlx::QueryBuilder::<sqlx::Postgres>::new(format!(
        "SELECT COUNT(*) FROM solicitudes WHERE abierta AND {column} = "
    ));
    count.push_bind(user_id);
    let mut select = sqlx::QueryBuilder::<sqlx::Postgres>::new(format!(
        "SELECT {REQUEST_COLUMNS} FROM solicitudes WHERE abierta AND {column} = "
    ));
    select.push_bind(user_id);

    if let Some(types) = types {
        for builder in [&mut count, &mut select] {
            builder.push(" AND tipo IN (");
            let mut separated = builder.separated(", ");
            for tipo in types {
                separated.push_bind(*tipo);
            }
            separated.push_unseparated(")");
        }
    }

    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    select
        .push(" ORDER BY created_at DESC, id DESC LIMIT ")
        .push_bind(params.limit())
        .push(" OFFSET ")
        .push_bind(params.offset());
    let items = select.build_query_as::<Request>().fetch_all(pool).await?;

    Ok(Page::new(items, total, params))
}

/// Open a new request
#[utoipa::path(
    post,
    path = "/solicitudes",
    request_body = NewRequest,
    responses(
        (status = 201, description = "Request opened", body = RequestDetail),
        (status = 400, description = "Missing field or invalid type"),
        (status = 404, description = "Referenced entity not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Solicitudes",
    security(("bearerAuth" = []))
)]
pub async fn create_request(
    State(state): State<AppState>,
    Extension(user): Extension<UserSummary>,
    ApiJson(payload): ApiJson<NewRequest>,
) -> Result<ApiResponse<RequestDetail>, ApiResponse<()>> {
    let detail = open_request(&state, &user, &payload).await?;
    Ok(ApiResponse::success(
        StatusCode::CREATED,
        "Solicitud creada",
        detail,
    ))
}

/// Accept or reject a request
#[utoipa::path(
    patch,
    path = "/solicitudes/{id}",
    params(("id" = i32, Path, description = "Request ID")),
    request_body = TransitionRequest,
    responses(
        (status = 200, description = "Request updated", body = RequestDetail),
        (status = 400, description = "Invalid target value, closed request or missing link"),
        (status = 403, description = "Caller is not the current receiver"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Concurrent modification"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Solicitudes",
    security(("bearerAuth" = []))
)]
pub async fn transition_request(
    State(state): State<AppState>,
    Extension(user): Extension<UserSummary>,
    Path(id): Path<i32>,
    ApiJson(payload): ApiJson<TransitionRequest>,
) -> Result<ApiResponse<RequestDetail>, ApiResponse<()>> {
    let detail = apply_transition(&state, &user, id, &payload).await?;
    Ok(ApiResponse::success(StatusCode::OK, "Solicitud actualizada", detail))
}

/// Get a request with its detail link
#[utoipa::path(
    get,
    path = "/solicitudes/{id}",
    params(("id" = i32, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request found", body = RequestDetail),
        (status = 404, description = "Request not found")
    ),
    tag = "Solicitudes",
    security(("bearerAuth" = []))
)]
pub async fn get_request(
    State(pool): State<PgPool>,
    Path(id): Path<i32>,
) -> Result<ApiResponse<RequestDetail>, ApiResponse<()>> {
    let mut conn = pool.acquire().await.map_err(AppError::from)?;
    let detail = load_detail(&mut conn, id).await?;
    Ok(ApiResponse::success(StatusCode::OK, "Solicitud encontrada", detail))
}

/// Audit timeline of a request, oldest first
#[utoipa::path(
    get,
    path = "/solicitudes/{id}/historial",
    params(("id" = i32, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Timeline", body = [AuditLogEntry]),
        (status = 404, description = "Request not found")
    ),
    tag = "Solicitudes",
    security(("bearerAuth" = []))
)]
pub async fn get_request_history(
    State(pool): State<PgPool>,
    Path(id): Path<i32>,
) -> Result<ApiResponse<Vec<AuditLogEntry>>, ApiResponse<()>> {
    let mut conn = pool.acquire().await.map_err(AppError::from)?;
    fetch_request(&mut conn, id).await?;
    let entries = crate::db::queries::audit_log::entries_for(&mut conn, id).await?;
    Ok(ApiResponse::success(StatusCode::OK, "Historial de la solicitud", entries))
}

/// Open requests addressed to the caller
#[utoipa::path(
    get,
    path = "/solicitudes/recibidas",
    params(PageParams),
    responses((status = 200, description = "Received requests", body = Page<Request>)),
    tag = "Solicitudes",
    security(("bearerAuth" = []))
)]
pub async fn get_received_requests(
    State(pool): State<PgPool>,
    Extension(user): Extension<UserSummary>,
    Query(params): Query<PageParams>,
) -> Result<ApiResponse<Page<Request>>, ApiResponse<()>> {
    let page = open_requests_for(&pool, user.id, Party::Receiver, None, &params).await?;
    Ok(ApiResponse::success(StatusCode::OK, "Solicitudes recibidas", page))
}

/// Open requests generated by the caller
#[utoipa::path(
    get,
    path = "/solicitudes/generadas",
    params(PageParams),
    responses((status = 200, description = "Generated requests", body = Page<Request>)),
    tag = "Solicitudes",
    security(("bearerAuth" = []))
)]
pub async fn get_generated_requests(
    State(pool): State<PgPool>,
    Extension(user): Extension<UserSummary>,
    Query(params): Query<PageParams>,
) -> Result<ApiResponse<Page<Request>>, ApiResponse<()>> {
    let page = open_requests_for(&pool, user.id, Party::Generator, None, &params).await?;
    Ok(ApiResponse::success(StatusCode::OK, "Solicitudes generadas", page))
}

/// Open sub-director approvals addressed to the caller
#[utoipa::path(
    get,
    path = "/sub-direccion/solicitudes",
    params(PageParams),
    responses(
        (status = 200, description = "Pending approvals", body = Page<Request>),
        (status = 403, description = "Caller is not a sub-director")
    ),
    tag = "Sub-dirección",
    security(("bearerAuth" = []))
)]
pub async fn get_subdirector_requests(
    State(pool): State<PgPool>,
    Extension(user): Extension<UserSummary>,
    Query(params): Query<PageParams>,
) -> Result<ApiResponse<Page<Request>>, ApiResponse<()>> {
    if !matches!(
        user.rol,
        UserRole::SubDirector | UserRole::CommercialSubDirector | UserRole::Admin
    ) {
        return Err(ApiResponse::error(
            StatusCode::FORBIDDEN,
            "Solo sub-dirección puede revisar aprobaciones",
            None,
        ));
    }
    let types = [RequestType::AprobacionJp, RequestType::AprobacionComercial];
    let page = open_requests_for(&pool, user.id, Party::Receiver, Some(&types), &params).await?;
    Ok(ApiResponse::success(StatusCode::OK, "Aprobaciones pendientes", page))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        create_request,
        transition_request,
        get_request,
        get_request_history,
        get_received_requests,
        get_generated_requests,
        get_subdirector_requests
    ),
    components(schemas(
        NewRequest,
        TransitionRequest,
        Request,
        RequestDetail,
        OpportunityLink,
        ProgramLink,
        RequestType,
        RequestValue,
        AuditLogEntry
    )),
    tags(
        (name = "Solicitudes", description = "Request approval workflow"),
        (name = "Sub-dirección", description = "Sub-director approvals")
    ),
    modifiers(&SecurityAddon)
)]
pub struct RequestDoc;
