use crate::domain::model::{
    ArchiveOperationResult, DirectoryEntry, FileMetadata, OperationType, StatsRecord,
    TransactionRecord, Visibility, WriteOptions,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::path::Path;
use tokio::io::AsyncRead;

/// Forward-only byte stream handed to `write_stream` and returned by `read_stream`.
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// Lazily walked directory listing. Entries are produced as the caller pulls them.
pub type DirectoryListing = Box<dyn Iterator<Item = Result<DirectoryEntry>> + Send>;

/// Path-addressed filesystem capabilities.
///
/// Paths are relative to the adapter's root and use `/` as separator.
#[async_trait]
pub trait FilesystemAdapter: Send + Sync {
    async fn file_exists(&self, path: &str) -> Result<bool>;
    async fn directory_exists(&self, path: &str) -> Result<bool>;

    async fn write(&self, path: &str, contents: &[u8], options: WriteOptions) -> Result<()>;
    /// Takes ownership of `contents`; it is dropped before this returns.
    async fn write_stream(
        &self,
        path: &str,
        contents: ByteStream,
        options: WriteOptions,
    ) -> Result<()>;

    async fn read(&self, path: &str) -> Result<Vec<u8>>;
    async fn read_stream(&self, path: &str) -> Result<ByteStream>;

    /// Succeeds when nothing exists at `path`.
    async fn delete(&self, path: &str) -> Result<()>;
    /// Succeeds when nothing exists at `path`.
    async fn delete_directory(&self, path: &str) -> Result<()>;
    async fn create_directory(&self, path: &str, options: WriteOptions) -> Result<()>;

    async fn set_visibility(&self, path: &str, visibility: Visibility) -> Result<()>;
    async fn visibility(&self, path: &str) -> Result<Visibility>;
    async fn mime_type(&self, path: &str) -> Result<String>;
    async fn last_modified(&self, path: &str) -> Result<DateTime<Utc>>;
    async fn file_size(&self, path: &str) -> Result<u64>;
    async fn metadata(&self, path: &str) -> Result<FileMetadata>;

    async fn list_contents(&self, path: &str, deep: bool) -> Result<DirectoryListing>;

    async fn move_file(&self, source: &str, destination: &str, options: WriteOptions)
        -> Result<()>;
    async fn copy(&self, source: &str, destination: &str, options: WriteOptions) -> Result<()>;
}

/// Remote directory archival.
#[async_trait]
pub trait ArchiveService: Send + Sync {
    async fn upload_directory(
        &self,
        directory: &Path,
        is_public: bool,
    ) -> Result<ArchiveOperationResult>;

    async fn download_directory(
        &self,
        destination: &Path,
        data_map: Option<&str>,
        public_address: Option<&str>,
    ) -> Result<ArchiveOperationResult>;

    async fn list_transactions(
        &self,
        date: Option<NaiveDate>,
        operation_type: Option<OperationType>,
    ) -> Result<Vec<TransactionRecord>>;

    async fn stats(&self, days: u32) -> Result<StatsRecord>;
}
