//! Configuration module
//!
//! Handles CLI configuration: the backend URL from flags or environment, and
//! the tracker settings derived from it.

use anyhow::{Context, Result};
use sandwatch_tracker::TrackerConfig;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the analysis backend
    pub backend_url: String,
}

impl Config {
    /// Tracker configuration with environment overrides applied
    pub fn tracker_config(&self) -> Result<TrackerConfig> {
        let config = TrackerConfig::new(self.backend_url.trim_end_matches('/')).with_env_overrides();
        config
            .validate()
            .with_context(|| format!("Invalid configuration for backend {}", self.backend_url))?;
        Ok(config)
    }
}
