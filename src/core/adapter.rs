use crate::adapters::autonomi::AutonomiBridge;
use crate::adapters::local::LocalStorage;
use crate::config::toml_config::AdapterConfig;
use crate::config::ArchiveConfig;
use crate::domain::model::{
    ArchiveOperationResult, FileMetadata, OperationType, StatsRecord, TransactionRecord,
    Visibility, WriteOptions,
};
use crate::domain::ports::{ArchiveService, ByteStream, DirectoryListing, FilesystemAdapter};
use crate::utils::error::{Result, StorageError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Whether archival operations are available, fixed at construction.
#[derive(Clone)]
pub enum ArchiveMode {
    Disabled,
    Enabled(Arc<dyn ArchiveService>),
}

impl fmt::Debug for ArchiveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveMode::Disabled => f.write_str("Disabled"),
            ArchiveMode::Enabled(_) => f.write_str("Enabled(..)"),
        }
    }
}

/// Local storage with optional whole-directory archival on Autonomi.
///
/// File operations always go to the local root. The archive methods fail with
/// [`StorageError::ArchiveNotEnabled`] unless the adapter was built with an
/// archive service, and in that case no request is ever made.
#[derive(Debug, Clone)]
pub struct PerpetualAdapter {
    local: LocalStorage,
    archive: ArchiveMode,
}

impl PerpetualAdapter {
    /// `archive_url` is only consulted when `use_archive` is set, and falls back
    /// to `http://localhost:8000`.
    pub fn new(
        root: impl AsRef<Path>,
        use_archive: bool,
        archive_url: Option<&str>,
    ) -> Result<Self> {
        let archive = if use_archive {
            let config = archive_url.map(ArchiveConfig::new).unwrap_or_default();
            ArchiveMode::Enabled(Arc::new(AutonomiBridge::new(&config)?))
        } else {
            ArchiveMode::Disabled
        };

        Ok(Self {
            local: LocalStorage::new(root)?,
            archive,
        })
    }

    pub fn local_only(root: impl AsRef<Path>) -> Result<Self> {
        Self::new(root, false, None)
    }

    pub fn with_archive_service(
        root: impl AsRef<Path>,
        service: Arc<dyn ArchiveService>,
    ) -> Result<Self> {
        Ok(Self {
            local: LocalStorage::new(root)?,
            archive: ArchiveMode::Enabled(service),
        })
    }

    pub fn from_config(config: &AdapterConfig) -> Result<Self> {
        let archive = match config.archive_config() {
            Some(archive_config) => {
                ArchiveMode::Enabled(Arc::new(AutonomiBridge::new(&archive_config)?))
            }
            None => ArchiveMode::Disabled,
        };

        Ok(Self {
            local: LocalStorage::new(&config.storage.root)?,
            archive,
        })
    }

    pub fn local(&self) -> &LocalStorage {
        &self.local
    }

    pub fn archive_enabled(&self) -> bool {
        matches!(self.archive, ArchiveMode::Enabled(_))
    }

    fn archive(&self) -> Result<&dyn ArchiveService> {
        match &self.archive {
            ArchiveMode::Enabled(service) => Ok(service.as_ref()),
            ArchiveMode::Disabled => Err(StorageError::ArchiveNotEnabled),
        }
    }

    /// Upload a directory below the root. Keep the returned `data_map` or
    /// `public_address`; it is the only way to download the archive again.
    pub async fn upload_directory_to_archive(
        &self,
        path: &str,
        is_public: bool,
    ) -> Result<ArchiveOperationResult> {
        let archive = self.archive()?;
        let full = self.local.resolve(path).await?;

        if !self.local.directory_exists(path).await? {
            return Err(StorageError::not_found(path));
        }

        tracing::debug!("Archiving directory {}", path);
        archive.upload_directory(&full, is_public).await
    }

    pub async fn download_directory_from_archive(
        &self,
        path: &str,
        data_map: Option<&str>,
        public_address: Option<&str>,
    ) -> Result<ArchiveOperationResult> {
        let archive = self.archive()?;
        let full = self.local.resolve(path).await?;

        archive
            .download_directory(&full, data_map, public_address)
            .await
    }

    pub async fn list_archive_transactions(
        &self,
        date: Option<NaiveDate>,
        operation_type: Option<OperationType>,
    ) -> Result<Vec<TransactionRecord>> {
        self.archive()?.list_transactions(date, operation_type).await
    }

    pub async fn archive_stats(&self, days: u32) -> Result<StatsRecord> {
        self.archive()?.stats(days).await
    }
}

#[async_trait]
impl FilesystemAdapter for PerpetualAdapter {
    async fn file_exists(&self, path: &str) -> Result<bool> {
        self.local.file_exists(path).await
    }

    async fn directory_exists(&self, path: &str) -> Result<bool> {
        self.local.directory_exists(path).await
    }

    async fn write(&self, path: &str, contents: &[u8], options: WriteOptions) -> Result<()> {
        self.local.write(path, contents, options).await
    }

    async fn write_stream(
        &self,
        path: &str,
        contents: ByteStream,
        options: WriteOptions,
    ) -> Result<()> {
        self.local.write_stream(path, contents, options).await
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.local.read(path).await
    }

    async fn read_stream(&self, path: &str) -> Result<ByteStream> {
        self.local.read_stream(path).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.local.delete(path).await
    }

    async fn delete_directory(&self, path: &str) -> Result<()> {
        self.local.delete_directory(path).await
    }

    async fn create_directory(&self, path: &str, options: WriteOptions) -> Result<()> {
        self.local.create_directory(path, options).await
    }

    async fn set_visibility(&self, path: &str, visibility: Visibility) -> Result<()> {
        self.local.set_visibility(path, visibility).await
    }

    async fn visibility(&self, path: &str) -> Result<Visibility> {
        self.local.visibility(path).await
    }

    async fn mime_type(&self, path: &str) -> Result<String> {
        self.local.mime_type(path).await
    }

    async fn last_modified(&self, path: &str) -> Result<DateTime<Utc>> {
        self.local.last_modified(path).await
    }

    async fn file_size(&self, path: &str) -> Result<u64> {
        self.local.file_size(path).await
    }

    async fn metadata(&self, path: &str) -> Result<FileMetadata> {
        self.local.metadata(path).await
    }

    async fn list_contents(&self, path: &str, deep: bool) -> Result<DirectoryListing> {
        self.local.list_contents(path, deep).await
    }

    async fn move_file(
        &self,
        source: &str,
        destination: &str,
        options: WriteOptions,
    ) -> Result<()> {
        self.local.move_file(source, destination, options).await
    }

    async fn copy(&self, source: &str, destination: &str, options: WriteOptions) -> Result<()> {
        self.local.copy(source, destination, options).await
    }
}
