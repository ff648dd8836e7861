use crate::config::toml_config::AdapterConfig;
use crate::domain::model::{OperationType, Visibility};
use crate::utils::error::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "perpetual")]
#[command(about = "Local file storage with optional Autonomi directory archival")]
pub struct CliConfig {
    /// Storage root (defaults to ./storage/perpetual)
    #[arg(long, global = true)]
    pub root: Option<String>,

    /// Enable Autonomi integration for directories
    #[arg(long, global = true)]
    pub archive: bool,

    /// Base URL of the Autonomi API
    #[arg(long, global = true)]
    pub archive_url: Option<String>,

    #[arg(long, global = true)]
    pub timeout_seconds: Option<u64>,

    /// TOML configuration file; flags override its values
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Write a file, from an argument or by streaming a local file
    Write {
        path: String,
        content: Option<String>,
        #[arg(long, conflicts_with = "content")]
        from: Option<PathBuf>,
        #[arg(long)]
        visibility: Option<Visibility>,
    },
    /// Print a file to stdout
    Read { path: String },
    /// List a directory
    Ls {
        #[arg(default_value = "")]
        path: String,
        #[arg(short, long)]
        recursive: bool,
    },
    /// Show size, modification time, visibility and MIME type
    Stat { path: String },
    Rm { path: String },
    Rmdir { path: String },
    Mkdir {
        path: String,
        #[arg(long)]
        private: bool,
    },
    Mv { source: String, destination: String },
    Cp { source: String, destination: String },
    /// Get or set the visibility of a file
    Visibility {
        path: String,
        value: Option<Visibility>,
    },
    /// Upload a directory below the root to Autonomi
    Upload {
        path: String,
        #[arg(long)]
        public: bool,
    },
    /// Download an archived directory into the root
    Download {
        path: String,
        #[arg(long)]
        data_map: Option<String>,
        #[arg(long)]
        public_address: Option<String>,
    },
    /// List archive transactions
    Transactions {
        /// YYYY-MM-DD
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        operation_type: Option<OperationType>,
    },
    /// Show archive statistics
    Stats {
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
}

impl CliConfig {
    /// Merge the optional configuration file with command-line overrides.
    pub fn adapter_config(&self) -> Result<AdapterConfig> {
        let mut config = match &self.config {
            Some(path) => AdapterConfig::from_file(path)?,
            None => AdapterConfig::default(),
        };

        if let Some(root) = &self.root {
            config.storage.root = root.clone();
        }
        if self.archive {
            config.archive_mut().enabled = true;
        }
        if let Some(url) = &self.archive_url {
            config.archive_mut().api_url = Some(url.clone());
        }
        if let Some(timeout) = self.timeout_seconds {
            config.archive_mut().timeout_seconds = Some(timeout);
        }

        Ok(config)
    }
}
