#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use crate::utils::error::Result;
use crate::utils::validation::{validate_range, validate_url, Validate};
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 120;
pub const DEFAULT_ROOT: &str = "./storage/perpetual";

/// Connection settings for the Autonomi directory API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl ArchiveConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

impl Validate for ArchiveConfig {
    fn validate(&self) -> Result<()> {
        validate_url("archive.api_url", &self.base_url)?;
        validate_range("archive.timeout_seconds", self.timeout_seconds, 1, 3600)?;
        Ok(())
    }
}
