//! Loads a reconciliation CSV into a fresh proposal.
//!
//! Users, carteras and programs are matched against existing rows by their
//! natural keys. Each opportunity is written under its own savepoint so one bad
//! row is skipped without losing the batch; anything else rolls back the whole
//! import.

use std::collections::HashMap;

use sqlx::{Connection, PgConnection};
use tracing::{debug, warn};

use crate::app_state::AppState;
use crate::db::models::proposal::{ImportRequest, ImportSummary};
use crate::db::models::user::UserRole;
use crate::utils::error::{AppError, AppResult};
use crate::workflow::import::{parse_rows, plan_import, ImportError, PlannedOpportunity, PlannedUser};

/// Largest CSV accepted for one import.
pub const MAX_CSV_BYTES: usize = 20 * 1024 * 1024;

async fn download(http: &reqwest::Client, url: &str, limit: usize) -> Result<Vec<u8>, ImportError> {
    let mut response = http
        .get(url)
        .send()
        .await
        .map_err(|e| ImportError::Download(e.to_string()))?;
    if !response.status().is_success() {
        return Err(ImportError::Download(format!("HTTP {}", response.status())));
    }
    if response.content_length().is_some_and(|len| len > limit as u64) {
        return Err(ImportError::TooLarge(limit));
    }

    let mut body = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| ImportError::Download(e.to_string()))?
    {
        if body.len() + chunk.len() > limit {
            return Err(ImportError::TooLarge(limit));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

async fn find_or_create_user(conn: &mut PgConnection, user: &PlannedUser) -> AppResult<i32> {
    let existing: Option<i32> = match &user.email {
        Some(email) => {
            sqlx::query_scalar("SELECT id FROM usuarios WHERE lower(email) = lower($1)")
                .bind(email)
                .fetch_optional(&mut *conn)
                .await?
        }
        None => {
            sqlx::query_scalar(
                "SELECT id FROM usuarios WHERE lower(nombre) = lower($1) ORDER BY id LIMIT 1",
            )
            .bind(&user.nombre)
            .fetch_optional(&mut *conn)
            .await?
        }
    };
    if let Some(id) = existing {
        return Ok(id);
    }

    let id: i32 = sqlx::query_scalar(
        "INSERT INTO usuarios (nombre, email, rol) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(&user.nombre)
    .bind(&user.email)
    .bind(UserRole::ProductManager)
    .fetch_one(conn)
    .await?;
    debug!(user_id = id, nombre = %user.nombre, "Created user from import");
    Ok(id)
}

async fn insert_opportunity(
    conn: &mut PgConnection,
    proposal_id: i32,
    program_id: i32,
    opportunity: &PlannedOpportunity,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO oportunidades
             (nombre, propuesta_id, programa_id, monto_propuesto, descuento, etapa_venta,
              becado, descuento_atipico, ratio_atipico)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(&opportunity.nombre)
    .bind(proposal_id)
    .bind(program_id)
    .bind(&opportunity.monto)
    .bind(&opportunity.descuento)
    .bind(&opportunity.etapa)
    .bind(opportunity.becado)
    .bind(opportunity.descuento_atipico)
    .bind(opportunity.ratio_atipico)
    .execute(conn)
    .await?;
    Ok(())
}

/// Downloads, parses and stores one CSV. Always creates a new proposal.
pub async fn run_import(state: &AppState, payload: &ImportRequest) -> AppResult<ImportSummary> {
    if payload.url.trim().is_empty() {
        return Err(AppError::MissingField("url"));
    }
    if payload.propuesta.nombre.trim().is_empty() {
        return Err(AppError::MissingField("propuesta.nombre"));
    }

    let body = download(&state.http, payload.url.trim(), MAX_CSV_BYTES).await?;
    let (rows, parse_skipped) = parse_rows(&body)?;
    let plan = plan_import(&rows, parse_skipped);

    let mut tx = state.pool.begin().await?;

    let proposal_id: i32 = sqlx::query_scalar(
        "INSERT INTO propuestas (nombre, periodo, created_at) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(payload.propuesta.nombre.trim())
    .bind(&payload.propuesta.periodo)
    .bind(state.clock.now())
    .fetch_one(&mut *tx)
    .await?;

    let mut user_ids: HashMap<&str, i32> = HashMap::new();
    for user in &plan.users {
        let id = find_or_create_user(&mut tx, user).await?;
        user_ids.insert(user.key.as_str(), id);
    }

    let mut cartera_ids: HashMap<&str, i32> = HashMap::new();
    for cartera in &plan.carteras {
        let id: i32 = sqlx::query_scalar(
            "INSERT INTO carteras (nombre, usuario_id) VALUES ($1, $2)
             ON CONFLICT (nombre) DO UPDATE SET usuario_id = COALESCE(carteras.usuario_id, EXCLUDED.usuario_id)
             RETURNING id",
        )
        .bind(&cartera.nombre)
        .bind(user_ids.get(cartera.owner_key.as_str()).copied())
        .fetch_one(&mut *tx)
        .await?;
        cartera_ids.insert(cartera.nombre.as_str(), id);
    }

    let mut program_ids: HashMap<&str, i32> = HashMap::new();
    for program in &plan.programs {
        let id: i32 = sqlx::query_scalar(
            "INSERT INTO programas (codigo, nombre, cartera_id, precio_lista, fecha_inauguracion)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (codigo) DO UPDATE SET
                 nombre = EXCLUDED.nombre,
                 cartera_id = COALESCE(EXCLUDED.cartera_id, programas.cartera_id),
                 precio_lista = COALESCE(EXCLUDED.precio_lista, programas.precio_lista),
                 fecha_inauguracion = COALESCE(EXCLUDED.fecha_inauguracion, programas.fecha_inauguracion)
             RETURNING id",
        )
        .bind(&program.codigo)
        .bind(&program.nombre)
        .bind(cartera_ids.get(program.cartera.as_str()).copied())
        .bind(&program.precio_lista)
        .bind(program.fecha_inauguracion)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO propuesta_programas (propuesta_id, programa_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(proposal_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        program_ids.insert(program.codigo.as_str(), id);
    }

    let mut inserted = 0;
    let mut row_failures = 0;
    for opportunity in &plan.opportunities {
        let Some(&program_id) = program_ids.get(opportunity.programa_codigo.as_str()) else {
            row_failures += 1;
            continue;
        };

        let mut savepoint = Connection::begin(&mut *tx).await?;
        match insert_opportunity(&mut savepoint, proposal_id, program_id, opportunity).await {
            Ok(()) => {
                savepoint.commit().await?;
                inserted += 1;
            }
            Err(err) => {
                warn!(
                    nombre = %opportunity.nombre,
                    programa = %opportunity.programa_codigo,
                    error = %err,
                    "Skipping opportunity that failed to insert"
                );
                savepoint.rollback().await?;
                row_failures += 1;
            }
        }
    }

    tx.commit().await?;

    Ok(ImportSummary {
        propuesta_id: proposal_id,
        usuarios: plan.users.len(),
        carteras: plan.carteras.len(),
        programas: plan.programs.len(),
        oportunidades: inserted,
        filas_omitidas: plan.skipped + row_failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::Router;
    use sqlx::PgPool;
    use tokio_test::{assert_err, assert_ok};

    use crate::db::models::proposal::{NewProposal, ProposalStage};
    use crate::db::queries::fixtures;

    const HEADER: &str = "usuario.nombre,usuario.email,cartera.nombre,programa.codigo,programa.nombre,programa.precio_lista,programa.fecha_inauguracion,oportunidad.nombre,oportunidad.monto,oportunidad.descuento,oportunidad.etapa,oportunidad.becado";

    /// Serves `body` at `/archivo.csv` on an ephemeral port and returns its URL.
    async fn serve(body: String) -> String {
        let app = Router::new().route("/archivo.csv", get(move || async move { body }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/archivo.csv")
    }

    fn client() -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(2))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn unreachable_url_is_a_download_error() {
        let url = "http://127.0.0.1:9/archivo.csv";
        let err = assert_err!(download(&client(), url, MAX_CSV_BYTES).await);
        assert!(matches!(err, ImportError::Download(_)));
        let app_err: AppError = err.into();
        assert_eq!(app_err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn body_within_limit_is_returned() {
        let url = serve(format!("{HEADER}\n")).await;
        let body = assert_ok!(download(&client(), &url, MAX_CSV_BYTES).await);
        assert!(body.starts_with(b"usuario.nombre,"));
    }

    #[tokio::test]
    async fn oversized_body_is_refused() {
        let url = serve("x".repeat(64)).await;
        let err = assert_err!(download(&client(), &url, 16).await);
        assert!(matches!(err, ImportError::TooLarge(16)));
        let app_err: AppError = err.into();
        assert_eq!(app_err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn existing_program_code_is_updated_in_place(pool: PgPool) {
        let older = fixtures::proposal(&pool, ProposalStage::Conciliada).await;
        let existing = fixtures::program(&pool, older, "MBA01", "900").await;

        let csv = format!(
            "{HEADER}\n\
             Ana,ana@u.cl,Salud,MBA01,MBA Salud,1000,2024-04-01,Juan,800,0.2,MATRICULADO,\n\
             Ana,ana@u.cl,Salud,MBA01,MBA Salud,1000,2024-04-01,Pedro,1000,0,MATRICULADO,\n"
        );
        let url = serve(csv).await;
        let state = fixtures::state(pool.clone());
        let payload = ImportRequest {
            url,
            propuesta: NewProposal {
                nombre: "Conciliación abril".into(),
                periodo: Some("2024-04".into()),
            },
        };

        let summary = assert_ok!(run_import(&state, &payload).await);
        assert_ne!(summary.propuesta_id, older);
        assert_eq!(summary.programas, 1);
        assert_eq!(summary.oportunidades, 2);
        assert_eq!(summary.filas_omitidas, 0);

        let rows: Vec<(i32, String, String)> = sqlx::query_as(
            "SELECT id, nombre, precio_lista::TEXT FROM programas WHERE codigo = 'MBA01'",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        assert_eq!(rows, vec![(existing, "MBA Salud".to_string(), "1000.00".to_string())]);

        let linked: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM oportunidades WHERE propuesta_id = $1 AND programa_id = $2",
        )
        .bind(summary.propuesta_id)
        .bind(existing)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(linked, 2);

        let proposals: Vec<i32> = sqlx::query_scalar(
            "SELECT propuesta_id FROM propuesta_programas WHERE programa_id = $1 ORDER BY propuesta_id",
        )
        .bind(existing)
        .fetch_all(&pool)
        .await
        .unwrap();
        assert_eq!(proposals, vec![older, summary.propuesta_id]);
    }
}
