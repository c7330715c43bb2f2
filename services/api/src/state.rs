//! Application state shared across handlers

use crate::repositories::{CityRepository, SessionRepository, UserRepository};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub user_repository: UserRepository,
    pub city_repository: CityRepository,
    pub session_repository: SessionRepository,
}
