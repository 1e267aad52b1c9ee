use std::env;

use crate::error::SyncError;

/// Connection settings for the remote API, injected by the host.
/// One base URL covers all three endpoints.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub token: String,
}

impl Config {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    /// Read `CANVAS_BASE_URL` and `CANVAS_TOKEN` from the environment,
    /// loading a `.env` file first if one is present.
    pub fn from_env() -> Result<Self, SyncError> {
        dotenvy::dotenv().ok();
        let base_url = env::var("CANVAS_BASE_URL")
            .map_err(|_| SyncError::Validation("CANVAS_BASE_URL not set".into()))?;
        let token = env::var("CANVAS_TOKEN")
            .map_err(|_| SyncError::Validation("CANVAS_TOKEN not set".into()))?;
        Ok(Self { base_url, token })
    }
}
