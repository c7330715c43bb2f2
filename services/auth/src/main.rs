use anyhow::Result;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

mod middleware;
mod models;
mod password;
mod rate_limiter;
mod repositories;
mod routes;
mod session;
mod token;
mod validation;

use std::sync::Arc;

use common::store::{HttpRecordStore, RecordStore, StoreConfig};

use crate::models::USERS_TABLE;
use crate::rate_limiter::{LoginThrottle, LoginThrottleConfig};
use crate::repositories::TokenRepository;
use crate::session::SessionManager;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionManager,
    pub tokens: TokenRepository,
    pub login_throttle: LoginThrottle,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting session service");

    // Initialize the record-store client
    let store_config = StoreConfig::from_env()?;
    let store = HttpRecordStore::new(&store_config)?;

    // Check record-store connectivity
    if store.health_check(USERS_TABLE).await? {
        info!("Record store connection successful");
    } else {
        anyhow::bail!("Failed to reach the record store");
    }

    info!("Session service initialized successfully");

    let record_store: Arc<dyn RecordStore> = Arc::new(store);
    let sessions = SessionManager::new(record_store.clone());
    let tokens = TokenRepository::new(record_store);
    let login_throttle = LoginThrottle::new(LoginThrottleConfig::default());

    let app_state = AppState {
        sessions,
        tokens,
        login_throttle,
    };

    // Start the web server
    let app = routes::create_router(app_state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    info!("Session service listening on 0.0.0.0:3000");

    axum::serve(listener, app).await?;

    Ok(())
}
