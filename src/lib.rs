pub mod adapters;
#[cfg(feature = "cli")]
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliConfig;

pub use adapters::{autonomi::AutonomiBridge, local::LocalStorage};
pub use config::{toml_config::AdapterConfig, ArchiveConfig};
pub use core::{ArchiveMode, PerpetualAdapter};
pub use domain::model::{
    ArchiveOperationResult, DirectoryEntry, FileMetadata, OperationType, StatsRecord,
    TransactionRecord, Visibility, WriteOptions,
};
pub use domain::ports::{ArchiveService, ByteStream, DirectoryListing, FilesystemAdapter};
pub use utils::error::{ErrorCategory, InvalidArgumentReason, Result, StorageError};
