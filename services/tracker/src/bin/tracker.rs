//! services/tracker/src/bin/tracker.rs

use employee_tracker_core::{
    ports::{DocumentStore, LocalCache},
    remote::RemoteRepository,
    services::Services,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tracker_lib::{
    adapters::{FirebaseStore, MemoryStore, SqliteCache},
    config::{Config, RemoteBackend},
    error::ApiError,
    web::{router, state::AppState},
};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Open the Local Cache & Prepare the Schema ---
    info!("Opening local cache at {}...", config.database_url);
    let cache = SqliteCache::connect(&config.database_url, 5).await?;
    cache.prepare_schema().await?;
    if cache
        .seed_admin(&config.seed_admin.email, &config.seed_admin.password)
        .await?
    {
        info!("Local cache was empty; seeded the admin account.");
    }
    let cache: Arc<dyn LocalCache> = Arc::new(cache);

    // --- 3. Connect the Remote Store ---
    let store: Arc<dyn DocumentStore> = match &config.remote {
        RemoteBackend::Memory => {
            info!("Using the in-memory remote store.");
            Arc::new(MemoryStore::new())
        }
        RemoteBackend::Firebase { url, auth } => {
            info!("Using the Firebase remote store at {}", url);
            Arc::new(FirebaseStore::new(reqwest::Client::new(), url.clone(), auth.clone()))
        }
    };
    let remote = RemoteRepository::new(store);

    // --- 4. Build the Shared AppState ---
    let services = Services::new(remote, cache);
    let app_state = Arc::new(AppState::new(config.clone(), services));

    // --- 5. Create the Web Router ---
    let app = router(app_state);

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
