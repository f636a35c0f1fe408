use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct Vendor {
    pub nombre: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Any other attribute the listing endpoint returns.
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct VendorListing {
    pub vendedores: Vec<Vendor>,
    /// Set when the upstream listing failed and an empty list was served.
    pub degraded: bool,
}
