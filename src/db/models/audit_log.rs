use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::ToSchema;

use super::request::RequestType;

/// Append-only snapshot of a request at the moment it changed.
#[derive(Serialize, Deserialize, Debug, Clone, FromRow, ToSchema)]
pub struct AuditLogEntry {
    pub id: i32,
    pub solicitud_id: i32,
    pub tipo: RequestType,
    pub created_at: NaiveDateTime,
    #[schema(value_type = Object)]
    pub cuerpo: Value,
}
