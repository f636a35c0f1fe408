use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::user::UserRole;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, ToSchema)]
#[sqlx(type_name = "tipo_solicitud", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestType {
    ExclusionPrograma,
    EliminacionBecado,
    EdicionAlumno,
    AgregarAlumno,
    AprobacionJp,
    AprobacionComercial,
    AprobacionDaf,
    FechaCambiada,
}

/// Which side table a request type carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Opportunity,
    Program,
    None,
}

impl RequestType {
    pub fn link_kind(self) -> LinkKind {
        match self {
            Self::EliminacionBecado | Self::EdicionAlumno | Self::AgregarAlumno => {
                LinkKind::Opportunity
            }
            Self::ExclusionPrograma | Self::FechaCambiada => LinkKind::Program,
            Self::AprobacionJp | Self::AprobacionComercial | Self::AprobacionDaf => LinkKind::None,
        }
    }

    /// Role of the user who receives a freshly opened request.
    pub fn receiver_role(self) -> UserRole {
        match self {
            Self::AprobacionJp => UserRole::SubDirector,
            Self::AprobacionComercial => UserRole::CommercialSubDirector,
            _ => UserRole::FinanceSupervisor,
        }
    }

    pub fn is_approval(self) -> bool {
        matches!(
            self,
            Self::AprobacionJp | Self::AprobacionComercial | Self::AprobacionDaf
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(type_name = "valor_solicitud", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestValue {
    Aceptado,
    Rechazado,
    Pendiente,
}

#[derive(Debug, Serialize, Deserialize, Clone, FromRow, ToSchema)]
pub struct Request {
    pub id: i32,
    /// Who opened the request. Unlike `generador_id` it never moves.
    pub creador_id: i32,
    pub generador_id: i32,
    pub receptor_id: i32,
    pub propuesta_id: Option<i32>,
    pub tipo: RequestType,
    pub valor: RequestValue,
    pub abierta: bool,
    pub comentario: String,
    pub invertida: bool,
    pub version: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone, FromRow, ToSchema)]
pub struct OpportunityLink {
    pub solicitud_id: i32,
    pub oportunidad_id: i32,
    #[schema(value_type = Option<String>)]
    pub monto_propuesto: Option<BigDecimal>,
    #[schema(value_type = Option<String>)]
    pub monto_objetado: Option<BigDecimal>,
    pub etapa_anterior: Option<String>,
    pub fecha_matricula_anterior: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize, Clone, FromRow, ToSchema)]
pub struct ProgramLink {
    pub solicitud_id: i32,
    pub programa_id: i32,
    pub fecha_inauguracion_propuesta: Option<NaiveDate>,
    pub fecha_objetada: Option<NaiveDate>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RequestDetail {
    pub solicitud: Request,
    pub oportunidad: Option<OpportunityLink>,
    pub programa: Option<ProgramLink>,
}

#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct NewRequest {
    pub tipo: RequestType,
    pub oportunidad_id: Option<i32>,
    pub programa_id: Option<i32>,
    /// Required for approval types, which carry no detail link.
    pub propuesta_id: Option<i32>,
    #[serde(default)]
    pub comentario: String,
    #[schema(value_type = Option<String>)]
    pub monto: Option<BigDecimal>,
    pub fecha: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct TransitionRequest {
    pub valor: RequestValue,
    #[serde(default)]
    pub comentario: String,
    /// Counter-offer when rejecting an amount negotiation.
    #[schema(value_type = Option<String>)]
    pub monto: Option<BigDecimal>,
    /// Counter-offer when rejecting a date negotiation.
    pub fecha: Option<NaiveDate>,
}
