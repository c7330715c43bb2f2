use anyhow::Result;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

mod client;
mod cookies;
mod models;
mod resilient;
mod routes;

use std::sync::Arc;

use crate::client::{CalendarApi, CalendarConfig, GoogleCalendarClient};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub client: Arc<dyn CalendarApi>,
    pub cookie_secure: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting calendar service");

    // Initialize the upstream calendar client
    let config = CalendarConfig::from_env()?;
    let client = GoogleCalendarClient::new(&config)?;

    info!("Calendar service initialized successfully");

    let app_state = AppState {
        client: Arc::new(client),
        cookie_secure: config.cookie_secure,
    };

    // Start the web server
    let app = routes::create_router(app_state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3002").await?;
    info!("Calendar service listening on 0.0.0.0:3002");

    axum::serve(listener, app).await?;

    Ok(())
}
