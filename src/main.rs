use std::path::Path;

use anyhow::Context;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use utoipa_rapidoc::RapiDoc;
use utoipa_swagger_ui::SwaggerUi;

use conciliacion_backend::app_state::AppState;
use conciliacion_backend::config::Config;
use conciliacion_backend::db::pool::{get_db_pool, run_migrations};
use conciliacion_backend::{openapi, router};

/// Logs to stdout, or to a daily rolling file when `LOG_DIR` is set.
fn init_tracing(log_dir: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,tower_http=info"));

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let file_appender = tracing_appender::rolling::daily(dir, "conciliacion.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_ansi(false)
                .with_writer(non_blocking)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .init();
            Ok(None)
        }
    }
}

async fn shutdown_signal(pool: PgPool) {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {e}");
    }
    info!("Shutdown requested, closing database pool");
    pool.close().await;
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let _log_guard = init_tracing(config.log_dir.as_deref())?;

    let pool = get_db_pool(&config)
        .await
        .context("Failed to connect to the database")?;
    if config.run_migrations {
        run_migrations(&pool)
            .await
            .context("Failed to run database migrations")?;
        info!("Migrations applied");
    }

    let addr = config.bind_addr;
    let state = AppState::new(pool.clone(), config).context("Failed to build HTTP client")?;

    let doc = openapi();
    let app = router(state)
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", doc.clone()))
        .merge(RapiDoc::with_openapi("/api-docs/rapidoc.json", doc).path("/rapidoc"))
        .layer(CorsLayer::permissive());

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server running at http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(pool))
        .await
        .context("Server encountered an error")?;

    info!("Shutdown complete");
    Ok(())
}
