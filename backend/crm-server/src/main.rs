use crm_server::{AppState, build_router, logger};
use crm_webhooks::WebhookDispatcher;

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use log::info;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Pull in a local .env before the config reads its CRM_* overrides
    let _ = dotenvy::dotenv();

    // Load and validate configuration
    let config = crm_config::Config::load()?;
    config.validate()?;

    // Construct log file path if configured
    let log_file_path: Option<std::path::PathBuf> = if let Some(ref filename) = config.logging.file
    {
        let config_dir = crm_config::Config::config_dir()?;
        let log_dir = config_dir.join(&config.logging.dir);

        // Ensure log directory exists
        std::fs::create_dir_all(&log_dir)?;

        Some(log_dir.join(filename))
    } else {
        None
    };

    // Initialize logger (before any other logging)
    logger::initialize(config.logging.level, log_file_path, config.logging.colored)?;

    info!("Starting crm-server v{}", env!("CARGO_PKG_VERSION"));
    config.log_summary();

    // Initialize database pool and run migrations
    let database_path = config.database_path()?;
    info!("Connecting to database: {}", database_path.display());
    let pool = crm_db::create_pool(&database_path, config.database.max_connections).await?;
    info!("Database ready");

    // Shared webhook dispatcher (one HTTP client for every delivery)
    let dispatcher = Arc::new(WebhookDispatcher::new(
        pool.clone(),
        Duration::from_secs(config.webhooks.request_timeout_secs),
    )?);

    let state = AppState::new(
        pool,
        dispatcher,
        Duration::from_secs(config.transition.persist_timeout_secs),
    );
    let app = build_router(state);

    // Create TCP listener
    let bind_addr = config.bind_addr();
    let listener = TcpListener::bind(&bind_addr).await?;
    let actual_addr = listener.local_addr()?;
    info!("Server listening on {}", actual_addr);

    // Start server with graceful shutdown on Ctrl+C
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received SIGINT (Ctrl+C), shutting down");
            }
        })
        .await?;

    Ok(())
}
