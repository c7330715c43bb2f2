//! Session service models

pub mod city;
pub mod token;
pub mod user;

// Re-export for convenience
pub use city::{CITIES_TABLE, CitySummary};
pub use token::{
    ACCESS_TOKENS_TABLE, AccessToken, REFRESH_TOKENS_TABLE, RefreshToken, SIGNUP_TOKENS_TABLE,
    SignupToken,
};
pub use user::{USERS_TABLE, User, UserSummary};
