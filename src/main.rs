use sqlx::sqlite::SqliteConnectOptions;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod database;
mod provider;
mod refresh;
mod resolve;
mod routes;
mod utils;

use config::Config;
use database::Database;
use provider::{init_current_cache, openmeteo::OpenMeteoClient};
use refresh::RefreshService;
use resolve::Resolver;
use routes::{create_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weather_tracker_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize database
    let connect_options =
        SqliteConnectOptions::from_str(&config.database_url)?.create_if_missing(true);
    let pool = sqlx::SqlitePool::connect_with(connect_options).await?;
    let database = Arc::new(Database::new(pool));
    database.init_tables().await?;

    // Initialize weather client and services
    let weather_client = Arc::new(OpenMeteoClient::new(&config));
    let refresh = Arc::new(RefreshService::new(database.clone(), weather_client.clone()));
    let resolver = Arc::new(Resolver::new(database.clone()));

    // Periodic fleet refresh; the first tick runs right away.
    refresh
        .clone()
        .spawn_interval(Duration::from_secs(config.refresh_interval_minutes * 60));

    // Create application state
    let state = AppState {
        database,
        weather_client,
        refresh,
        resolver,
        current_cache: init_current_cache(),
    };

    let app = create_router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server starting on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
