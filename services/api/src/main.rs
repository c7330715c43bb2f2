use anyhow::Result;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

mod error;
mod middleware;
mod models;
mod repositories;
mod routes;
mod state;

use std::sync::Arc;

use common::store::{HttpRecordStore, RecordStore, StoreConfig};

use crate::models::USERS_TABLE;
use crate::repositories::{CityRepository, SessionRepository, UserRepository};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting API service");

    // Initialize the record-store client
    let store_config = StoreConfig::from_env()?;
    let store = HttpRecordStore::new(&store_config)?;

    // Check record-store connectivity
    if store.health_check(USERS_TABLE).await? {
        info!("Record store connection successful");
    } else {
        anyhow::bail!("Failed to reach the record store");
    }

    info!("API service initialized successfully");

    // Initialize repositories
    let record_store: Arc<dyn RecordStore> = Arc::new(store);
    let user_repository = UserRepository::new(record_store.clone());
    let city_repository = CityRepository::new(record_store.clone());
    let session_repository = SessionRepository::new(record_store);

    let app_state = AppState {
        user_repository,
        city_repository,
        session_repository,
    };

    // Start the web server
    let app = routes::create_router(app_state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3001").await?;
    info!("API service listening on 0.0.0.0:3001");

    axum::serve(listener, app).await?;

    Ok(())
}
