use std::sync::Arc;

use robot_dispatch::api;
use robot_dispatch::catalog::MemoryCatalog;
use robot_dispatch::config::Config;
use robot_dispatch::error::AppError;
use robot_dispatch::state::AppState;
use robot_dispatch::store::memory::MemoryStore;
use robot_dispatch::store::sqlite::SqliteStore;
use robot_dispatch::store::OrderStore;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let store: Arc<dyn OrderStore> = match &config.database_url {
        Some(url) => Arc::new(SqliteStore::connect(url).await?),
        None => Arc::new(MemoryStore::new()),
    };
    tracing::info!(store = store.backend(), "order store selected");

    let app_state = AppState::new(store, Arc::new(MemoryCatalog::new()), &config);
    let app = api::rest::router(Arc::new(app_state));

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        request_timeout_ms = config.request_timeout.as_millis() as u64,
        cancel_check_every = config.cancel_check_every,
        "http server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
