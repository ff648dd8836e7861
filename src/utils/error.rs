use std::fmt;
use thiserror::Error;

/// Why an argument was rejected before any I/O happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidArgumentReason {
    /// The local path handed to an upload is not an existing directory.
    NotADirectory(String),
    /// Neither a data map nor a public address was supplied to a download.
    MissingKey,
}

impl fmt::Display for InvalidArgumentReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidArgumentReason::NotADirectory(path) => {
                write!(f, "directory not found: {}", path)
            }
            InvalidArgumentReason::MissingKey => {
                write!(f, "either a data map or a public address must be provided")
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Path escapes the storage root: {path}")]
    PathTraversal { path: String },

    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: InvalidArgumentReason },

    #[error("File does not exist at {path}")]
    NotFound { path: String },

    #[error("Unable to check existence for {path}: {source}")]
    CheckFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to write file at {path}: {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to read file at {path}: {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to delete file at {path}: {source}")]
    DeleteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to delete directory at {path} (failed on {step}): {source}")]
    DeleteDirectoryFailed {
        path: String,
        step: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to create directory at {path}: {source}")]
    CreateDirectoryFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to set visibility for file at {path}: {source}")]
    SetVisibilityFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to retrieve the {attribute} for file at {path}: {source}")]
    MetadataFailed {
        path: String,
        attribute: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to list contents at {path}: {source}")]
    ListFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to move file from {source_path} to {destination}: {source}")]
    MoveFailed {
        source_path: String,
        destination: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to copy file from {source_path} to {destination}: {source}")]
    CopyFailed {
        source_path: String,
        destination: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Error connecting to Autonomi API during {operation}: {source}")]
    RemoteError {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("Error decoding Autonomi API response for {operation}: {source}")]
    ResponseParseError {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Autonomi integration for directories is not enabled")]
    ArchiveNotEnabled,

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid configuration value for '{field}': {value} ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

/// Coarse grouping of [`StorageError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Argument,
    NotFound,
    Io,
    Remote,
    Configuration,
}

impl StorageError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            StorageError::PathTraversal { .. } | StorageError::InvalidArgument { .. } => {
                ErrorCategory::Argument
            }
            StorageError::NotFound { .. } => ErrorCategory::NotFound,
            StorageError::RemoteError { .. } | StorageError::ResponseParseError { .. } => {
                ErrorCategory::Remote
            }
            StorageError::ArchiveNotEnabled
            | StorageError::ConfigError { .. }
            | StorageError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            _ => ErrorCategory::Io,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Argument => format!("Invalid request: {}", self),
            ErrorCategory::NotFound => format!("Nothing found: {}", self),
            ErrorCategory::Io => format!("Local storage failure: {}", self),
            ErrorCategory::Remote => format!("Archive service failure: {}", self),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
        }
    }

    pub(crate) fn not_found(path: &str) -> Self {
        StorageError::NotFound {
            path: path.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
