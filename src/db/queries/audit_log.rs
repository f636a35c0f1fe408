use chrono::NaiveDateTime;
use sqlx::PgConnection;

use crate::db::models::audit_log::AuditLogEntry;
use crate::db::queries::user::user_name;
use crate::utils::error::AppResult;
use crate::workflow::negotiation::{audit_snapshot, AuditNames, RequestState};

/// Looks up the display names the snapshot needs. Missing rows stay `None`.
pub async fn resolve_names(conn: &mut PgConnection, state: &RequestState) -> AppResult<AuditNames> {
    let generator = user_name(&mut *conn, state.generator_id).await?;
    let receiver = user_name(&mut *conn, state.receiver_id).await?;

    let program = match state.kind.program_id() {
        Some(id) => {
            sqlx::query_scalar::<_, String>("SELECT nombre FROM programas WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?
        }
        None => None,
    };
    let opportunity = match state.kind.opportunity_id() {
        Some(id) => {
            sqlx::query_scalar::<_, String>("SELECT nombre FROM oportunidades WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?
        }
        None => None,
    };

    Ok(AuditNames {
        generator,
        receiver,
        program,
        opportunity,
    })
}

pub async fn insert_entry(
    conn: &mut PgConnection,
    state: &RequestState,
    names: &AuditNames,
    event: &str,
    now: NaiveDateTime,
) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO log_solicitudes (solicitud_id, tipo, created_at, cuerpo) VALUES ($1, $2, $3, $4)",
    )
    .bind(state.id)
    .bind(state.kind.request_type())
    .bind(now)
    .bind(audit_snapshot(state, names, event))
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn entries_for(conn: &mut PgConnection, request_id: i32) -> AppResult<Vec<AuditLogEntry>> {
    let entries = sqlx::query_as::<_, AuditLogEntry>(
        "SELECT id, solicitud_id, tipo, created_at, cuerpo FROM log_solicitudes
         WHERE solicitud_id = $1 ORDER BY created_at, id",
    )
    .bind(request_id)
    .fetch_all(conn)
    .await?;
    Ok(entries)
}
