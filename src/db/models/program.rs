use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

#[derive(Serialize, Deserialize, Debug, Clone, FromRow, ToSchema)]
pub struct Program {
    pub id: i32,
    pub codigo: String,
    pub nombre: String,
    pub cartera_id: Option<i32>,
    #[schema(value_type = Option<String>)]
    pub precio_lista: Option<BigDecimal>,
    pub fecha_inauguracion: Option<NaiveDate>,
    /// Do not open the program this period.
    pub no_abrir: bool,
    /// Exclude from reconciliation totals.
    pub no_computar: bool,
}

#[derive(Deserialize, Debug, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProgramFilterParams {
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub propuesta_id: Option<i32>,
}
