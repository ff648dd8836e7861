use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    /// Permission bits for a file with this visibility.
    pub fn file_mode(self) -> u32 {
        match self {
            Visibility::Public => 0o644,
            Visibility::Private => 0o600,
        }
    }

    /// Permission bits for a directory with this visibility.
    pub fn directory_mode(self) -> u32 {
        match self {
            Visibility::Public => 0o755,
            Visibility::Private => 0o700,
        }
    }

    /// Public when anyone besides the owner may read.
    pub fn from_mode(mode: u32) -> Self {
        if mode & 0o044 != 0 {
            Visibility::Public
        } else {
            Visibility::Private
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Public => write!(f, "public"),
            Visibility::Private => write!(f, "private"),
        }
    }
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            other => Err(format!("unknown visibility '{}'", other)),
        }
    }
}

/// Per-call options for writes, moves, copies and directory creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Applied to the written file once its contents are in place.
    pub visibility: Option<Visibility>,
    /// Used for any directory the call has to create. Public when unset.
    pub directory_visibility: Option<Visibility>,
}

impl WriteOptions {
    pub fn with_visibility(visibility: Visibility) -> Self {
        Self {
            visibility: Some(visibility),
            ..Self::default()
        }
    }

    pub(crate) fn directory_mode(&self) -> u32 {
        self.directory_visibility
            .unwrap_or(Visibility::Public)
            .directory_mode()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl FileMetadata {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            size: None,
            last_modified: None,
            visibility: None,
            mime_type: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DirectoryEntry {
    File(FileMetadata),
    Directory { path: String },
}

impl DirectoryEntry {
    pub fn path(&self) -> &str {
        match self {
            DirectoryEntry::File(meta) => &meta.path,
            DirectoryEntry::Directory { path } => path,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, DirectoryEntry::File(_))
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, DirectoryEntry::Directory { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Upload,
    Download,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Upload => "upload",
            OperationType::Download => "download",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "upload" => Ok(OperationType::Upload),
            "download" => Ok(OperationType::Download),
            other => Err(format!("unknown operation type '{}'", other)),
        }
    }
}

/// Response of an archive upload or download.
///
/// The body the service sent is kept untouched in `raw`. The named fields are
/// read from it when their value has a usable type and are `None` otherwise.
/// The tokens are not stored anywhere by this crate, so callers who want to
/// fetch an archive later must keep `data_map` / `public_address`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub struct ArchiveOperationResult {
    pub status: Option<String>,
    pub cost: Option<f64>,
    pub data_map: Option<String>,
    pub public_address: Option<String>,
    pub raw: Value,
}

impl ArchiveOperationResult {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.raw.get(key)
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// Cost arrives either as a JSON number or as a decimal string.
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn token(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

impl From<Value> for ArchiveOperationResult {
    fn from(raw: Value) -> Self {
        let status = raw.get("status").and_then(scalar_text);
        let cost = raw.get("cost").and_then(numeric);
        let data_map = raw.get("data_map").and_then(token);
        let public_address = raw.get("public_address").and_then(token);

        Self {
            status,
            cost,
            data_map,
            public_address,
            raw,
        }
    }
}

impl From<ArchiveOperationResult> for Value {
    fn from(result: ArchiveOperationResult) -> Self {
        if !result.raw.is_null() {
            return result.raw;
        }

        let mut object = serde_json::Map::new();
        if let Some(status) = result.status {
            object.insert("status".to_string(), Value::String(status));
        }
        if let Some(cost) = result.cost {
            object.insert("cost".to_string(), Value::from(cost));
        }
        if let Some(data_map) = result.data_map {
            object.insert("data_map".to_string(), Value::String(data_map));
        }
        if let Some(public_address) = result.public_address {
            object.insert("public_address".to_string(), Value::String(public_address));
        }
        Value::Object(object)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionRecord(pub serde_json::Value);

impl TransactionRecord {
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn into_inner(self) -> serde_json::Value {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatsRecord(pub serde_json::Value);

impl StatsRecord {
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn into_inner(self) -> serde_json::Value {
        self.0
    }
}
