use crate::config::{ArchiveConfig, DEFAULT_API_URL, DEFAULT_ROOT, DEFAULT_TIMEOUT_SECONDS};
use crate::utils::error::{Result, StorageError};
use crate::utils::validation::{validate_path, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterConfig {
    pub storage: StorageSection,
    #[serde(default)]
    pub archive: Option<ArchiveSection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSection {
    pub root: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveSection {
    #[serde(default)]
    pub enabled: bool,
    pub api_url: Option<String>,
    pub timeout_seconds: Option<u64>,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            storage: StorageSection {
                root: DEFAULT_ROOT.to_string(),
            },
            archive: None,
        }
    }
}

impl AdapterConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| StorageError::ConfigError {
            message: format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string, expanding `${VAR}` references first
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| StorageError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    // Unset variables are left as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| StorageError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// Connection settings when archival is switched on.
    pub fn archive_config(&self) -> Option<ArchiveConfig> {
        let archive = self.archive.as_ref().filter(|archive| archive.enabled)?;
        Some(ArchiveConfig {
            base_url: archive
                .api_url
                .clone()
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            timeout_seconds: archive.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS),
        })
    }

    pub fn archive_mut(&mut self) -> &mut ArchiveSection {
        self.archive.get_or_insert_with(ArchiveSection::default)
    }
}

impl Validate for AdapterConfig {
    fn validate(&self) -> Result<()> {
        validate_path("storage.root", &self.storage.root)?;

        if let Some(archive) = self.archive_config() {
            archive.validate()?;
        }

        Ok(())
    }
}
