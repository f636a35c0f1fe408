use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

/// Stage stamped when an add-student request is opened.
pub const STAGE_PENDING_ADD: &str = "PENDIENTE_AGREGAR";
/// Stage stamped when an add-student request is accepted.
pub const STAGE_ADDED: &str = "AGREGADO";

/// A student enrollment inside a proposal.
#[derive(Serialize, Deserialize, Debug, Clone, FromRow, ToSchema)]
pub struct Opportunity {
    pub id: i32,
    pub nombre: String,
    pub propuesta_id: i32,
    pub programa_id: i32,
    pub vendedor_id: Option<i32>,
    #[schema(value_type = Option<String>)]
    pub monto_propuesto: Option<BigDecimal>,
    #[schema(value_type = Option<String>)]
    pub descuento: Option<BigDecimal>,
    pub etapa_venta: Option<String>,
    pub fecha_matricula: Option<NaiveDate>,
    pub becado: bool,
    pub descuento_atipico: bool,
    pub ratio_atipico: bool,
    pub eliminado: bool,
}

#[derive(Deserialize, Debug, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OpportunityFilterParams {
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub propuesta_id: Option<i32>,
    pub programa_id: Option<i32>,
    pub incluir_eliminados: Option<bool>,
}
