use axum::{extract::State, http::StatusCode};
use utoipa::OpenApi;

use crate::api::auth::SecurityAddon;
use crate::clients::lambda::LambdaClient;
use crate::db::models::vendor::{Vendor, VendorListing};
use crate::utils::api_response::ApiResponse;

/// List vendors
///
/// An upstream failure is served as an empty list with `degraded = true`.
#[utoipa::path(
    get,
    path = "/vendedores",
    responses((status = 200, description = "Vendor listing", body = VendorListing)),
    tag = "Vendedores",
    security(("bearerAuth" = []))
)]
pub async fn get_vendors(
    State(lambdas): State<LambdaClient>,
) -> Result<ApiResponse<VendorListing>, ApiResponse<()>> {
    let listing = lambdas.list_vendors().await;
    let message = if listing.degraded {
        "Servicio de vendedores no disponible"
    } else {
        "Vendedores"
    };
    Ok(ApiResponse::success(StatusCode::OK, message, listing))
}

#[derive(OpenApi)]
#[openapi(
    paths(get_vendors),
    components(schemas(Vendor, VendorListing)),
    tags((name = "Vendedores", description = "Vendor directory")),
    modifiers(&SecurityAddon)
)]
pub struct VendorDoc;
