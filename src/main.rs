// src/main.rs

use std::sync::Arc;

use dotenvy::dotenv;
use exam_backend::config::{Config, StoreBackend};
use exam_backend::routes;
use exam_backend::state::AppState;
use exam_backend::store::{ExamStore, MemoryStore, PgStore};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env()?;

    let file_appender = tracing_appender::rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let store = build_store(&config).await?;
    tracing::info!(
        "Store backend: {:?}, scoring mode: {:?}",
        config.store_backend,
        config.scoring_mode
    );

    let state = AppState {
        store,
        config: config.clone(),
    };

    // Create the Axum application router
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Server running on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn build_store(config: &Config) -> Result<Arc<dyn ExamStore>, Box<dyn std::error::Error>> {
    match config.store_backend {
        StoreBackend::Postgres => {
            let store = PgStore::connect(config).await?;

            // Run Migrations Automatically
            tracing::info!("Running migrations...");
            store.migrate().await?;
            tracing::info!("Migrations applied successfully.");

            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            let store = match &config.fixture_path {
                Some(path) => MemoryStore::from_fixture(path).await?,
                None => {
                    tracing::warn!("Memory backend started without FIXTURE_PATH; no exams loaded");
                    MemoryStore::new()
                }
            };
            Ok(Arc::new(store))
        }
    }
}
