use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, ToSchema)]
#[sqlx(type_name = "rol_usuario")]
pub enum UserRole {
    /// Jefe de producto.
    #[sqlx(rename = "JP")]
    #[serde(rename = "JP")]
    ProductManager,
    #[sqlx(rename = "SUBDIRECTOR")]
    #[serde(rename = "SUBDIRECTOR")]
    SubDirector,
    #[sqlx(rename = "SUBDIRECTOR_COMERCIAL")]
    #[serde(rename = "SUBDIRECTOR_COMERCIAL")]
    CommercialSubDirector,
    /// Finance supervisor.
    #[sqlx(rename = "DAF")]
    #[serde(rename = "DAF")]
    FinanceSupervisor,
    #[sqlx(rename = "ADMIN")]
    #[serde(rename = "ADMIN")]
    Admin,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ProductManager => "JP",
            Self::SubDirector => "SUBDIRECTOR",
            Self::CommercialSubDirector => "SUBDIRECTOR_COMERCIAL",
            Self::FinanceSupervisor => "DAF",
            Self::Admin => "ADMIN",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, FromRow, ToSchema)]
pub struct User {
    pub id: i32,
    pub nombre: String,
    pub email: Option<String>,
    pub rol: UserRole,
    #[schema(value_type = Object)]
    pub periodos_vacaciones: Value,
    #[schema(value_type = Object)]
    pub dias_pendientes: Value,
    pub created_at: NaiveDateTime,
}

/// Minimal identity attached to authenticated requests.
#[derive(Serialize, Deserialize, Debug, Clone, FromRow, ToSchema)]
pub struct UserSummary {
    pub id: i32,
    pub nombre: String,
    pub rol: UserRole,
}

impl UserSummary {
    pub fn is_admin(&self) -> bool {
        self.rol == UserRole::Admin
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, FromRow, ToSchema)]
pub struct Cartera {
    pub id: i32,
    pub nombre: String,
    pub usuario_id: Option<i32>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct MarketingUser {
    pub usuario: User,
    pub carteras: Vec<Cartera>,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct VacationUpdate {
    /// List of `{inicio, fin}` periods.
    #[schema(value_type = Object)]
    pub periodos: Value,
    /// Map of period label to pending days.
    #[schema(value_type = Object)]
    pub dias_pendientes: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct KeyCrmUpdate {
    pub key_crm: String,
}
