//! Row builders shared by the database-backed tests.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use sqlx::PgPool;

use crate::app_state::AppState;
use crate::config::Config;
use crate::db::models::proposal::ProposalStage;
use crate::db::models::user::{UserRole, UserSummary};

pub fn state(pool: PgPool) -> AppState {
    let config = Config::from_lookup(|key| match key {
        "DATABASE_URL" => Some("postgres://unused".into()),
        "JWT_SECRET" => Some("test-secret".into()),
        "AUTH_SERVICE_URL" => Some("http://127.0.0.1:9".into()),
        "HTTP_TIMEOUT_SECS" => Some("2".into()),
        _ => None,
    })
    .unwrap();
    AppState::new(pool, config).unwrap()
}

pub async fn user(pool: &PgPool, nombre: &str, rol: UserRole) -> UserSummary {
    let id: i32 = sqlx::query_scalar("INSERT INTO usuarios (nombre, rol) VALUES ($1, $2) RETURNING id")
        .bind(nombre)
        .bind(rol)
        .fetch_one(pool)
        .await
        .unwrap();
    UserSummary {
        id,
        nombre: nombre.to_string(),
        rol,
    }
}

pub async fn proposal(pool: &PgPool, estado: ProposalStage) -> i32 {
    sqlx::query_scalar("INSERT INTO propuestas (nombre, estado) VALUES ('Propuesta 2024-1', $1) RETURNING id")
        .bind(estado)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn program(pool: &PgPool, propuesta_id: i32, codigo: &str, precio_lista: &str) -> i32 {
    let id: i32 = sqlx::query_scalar(
        "INSERT INTO programas (codigo, nombre, precio_lista) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(codigo)
    .bind(format!("Programa {codigo}"))
    .bind(BigDecimal::from_str(precio_lista).unwrap())
    .fetch_one(pool)
    .await
    .unwrap();
    sqlx::query("INSERT INTO propuesta_programas (propuesta_id, programa_id) VALUES ($1, $2)")
        .bind(propuesta_id)
        .bind(id)
        .execute(pool)
        .await
        .unwrap();
    id
}

pub async fn opportunity(pool: &PgPool, propuesta_id: i32, programa_id: i32, etapa: &str) -> i32 {
    sqlx::query_scalar(
        "INSERT INTO oportunidades (nombre, propuesta_id, programa_id, etapa_venta, fecha_matricula)
         VALUES ('Camila Rojas', $1, $2, $3, DATE '2024-01-15') RETURNING id",
    )
    .bind(propuesta_id)
    .bind(programa_id)
    .bind(etapa)
    .fetch_one(pool)
    .await
    .unwrap()
}
