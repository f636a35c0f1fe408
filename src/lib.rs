//! Back office for sales reconciliation: proposals, programs, opportunities
//! and the request ("solicitud") approval workflow between product managers,
//! sub-directors and finance.

pub mod api;
pub mod app_state;
pub mod clients;
pub mod config;
pub mod db;
pub mod middleware;
pub mod utils;
pub mod workflow;

use std::time::Duration;

use axum::middleware::{from_fn, from_fn_with_state};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::api::google_oauth::GoogleOAuthDoc;
use crate::app_state::AppState;
use crate::db::queries::opportunity::OpportunityDoc;
use crate::db::queries::program::ProgramDoc;
use crate::db::queries::proposal::ProposalDoc;
use crate::db::queries::requests::RequestDoc;
use crate::db::queries::user::UserDoc;
use crate::db::queries::vendor::VendorDoc;
use crate::middleware::auth::{current_user_middleware, jwt_middleware};
use crate::middleware::request_logger::{log_requests, RequestUuid};

/// Upper bound on handling one inbound request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// OpenAPI document for every resource.
pub fn openapi() -> utoipa::openapi::OpenApi {
    GoogleOAuthDoc::openapi()
        .merge_from(ProposalDoc::openapi())
        .merge_from(ProgramDoc::openapi())
        .merge_from(OpportunityDoc::openapi())
        .merge_from(RequestDoc::openapi())
        .merge_from(UserDoc::openapi())
        .merge_from(VendorDoc::openapi())
}

/// Full application router with auth and request tracing applied.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .merge(api::health::health_routes())
        .merge(api::google_oauth::g_auth_routes());

    let private_routes = Router::new()
        .merge(api::proposal::proposal_routes())
        .merge(api::program::program_routes())
        .merge(api::opportunity::opportunity_routes())
        .merge(api::requests::request_routes())
        .merge(api::user::user_routes())
        .merge(api::vendor::vendor_routes())
        .route_layer(from_fn_with_state(state.clone(), current_user_middleware))
        .route_layer(from_fn_with_state(state.clone(), jwt_middleware));

    Router::new()
        .merge(public_routes)
        .merge(private_routes)
        .layer(from_fn(log_requests))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(RequestUuid))
        .with_state(state)
}
