use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::clients::auth_service::AuthServiceClient;
use crate::clients::lambda::LambdaClient;
use crate::config::Config;
use crate::middleware::auth::{create_user_cache, UserCache};
use crate::utils::clock::LocalClock;

/// Everything handlers need, built once in `main` and cloned per request.
#[derive(Clone, FromRef)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub clock: LocalClock,
    /// Plain client for one-off downloads such as import files.
    pub http: reqwest::Client,
    pub auth_service: AuthServiceClient,
    pub lambdas: LambdaClient,
    pub user_cache: UserCache,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;

        Ok(Self {
            pool,
            clock: LocalClock::new(config.timezone),
            auth_service: AuthServiceClient::new(http.clone(), &config.auth_service_url),
            lambdas: LambdaClient::new(
                http.clone(),
                &config.vendors_lambda_url,
                &config.vacations_lambda_url,
            ),
            http,
            user_cache: create_user_cache(config.permission_cache_ttl),
            config: Arc::new(config),
        })
    }
}
