use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{prelude::*, EnvFilter};

use linkshelf_backend::db::PoolStats;
use linkshelf_backend::{realtime, router, AppConfig, AppState, ChangeBus, Database};

fn init_tracing(dev_mode: bool) {
    let env_filter = || EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    if dev_mode {
        let console_layer = console_subscriber::ConsoleLayer::builder()
            .server_addr(([127, 0, 0, 1], 6669)) // Default tokio-console port
            .spawn();

        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_filter(env_filter()))
            .with(console_layer)
            .init();

        tracing::info!("Tokio console enabled (connect with: tokio-console)");
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let config = AppConfig::from_env()?;
    init_tracing(config.dev_mode);

    let pool_api = PgPoolOptions::new()
        .max_connections(config.pool_api_max)
        .min_connections(2)
        .connect(&config.database_url)
        .await?;

    // Change listener holds one connection for LISTEN
    let pool_listen = PgPoolOptions::new()
        .max_connections(config.pool_listen_max)
        .min_connections(1)
        .connect(&config.database_url)
        .await?;

    tracing::info!(
        api_max = config.pool_api_max,
        listen_max = config.pool_listen_max,
        "Connected to database"
    );

    sqlx::migrate!("./migrations").run(&pool_api).await?;
    tracing::info!("Migrations complete");

    let db = Database::new(pool_api);
    let changes = Arc::new(ChangeBus::default());

    tokio::spawn(realtime::run_change_listener(pool_listen.clone(), changes.clone()));

    let metrics_db = db.clone();
    let metrics_changes = changes.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            metrics_db.pool_stats().log("api");
            PoolStats::of(&pool_listen).log("listen");
            tracing::info!(
                subscribers = metrics_changes.receiver_count(),
                "Change stream subscribers"
            );
        }
    });

    let bind_address = config.bind_address.clone();
    tracing::info!(
        provider = %config.oauth.provider,
        public_url = %config.public_url,
        "OAuth sign-in configured"
    );

    let state = Arc::new(AppState::new(db, config, changes)?);
    let app = router::build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Linkshelf listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
