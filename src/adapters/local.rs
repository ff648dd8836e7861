//! Local filesystem adapter.
//!
//! Every path is resolved under a fixed root. Paths containing `..` are
//! rejected, and paths that already exist on disk are canonicalized and
//! checked against the root so a symlink cannot lead outside of it.

use crate::domain::model::{DirectoryEntry, FileMetadata, Visibility, WriteOptions};
use crate::domain::ports::{ByteStream, DirectoryListing, FilesystemAdapter};
use crate::utils::error::{Result, StorageError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fs::Metadata;
use std::io::{self, ErrorKind};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use walkdir::WalkDir;

/// Bytes inspected when sniffing a MIME type.
const SNIFF_LEN: u64 = 8192;

#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    canonical_root: PathBuf,
}

impl LocalStorage {
    /// Open (and create, if needed) a storage root.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        if !root.is_dir() {
            let mut builder = std::fs::DirBuilder::new();
            builder.recursive(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::DirBuilderExt;
                builder.mode(Visibility::Public.directory_mode());
            }
            builder
                .create(&root)
                .map_err(|e| StorageError::CreateDirectoryFailed {
                    path: root.display().to_string(),
                    source: e,
                })?;
            tracing::debug!("Created storage root {}", root.display());
        }

        let canonical_root = root
            .canonicalize()
            .map_err(|e| StorageError::CheckFailed {
                path: root.display().to_string(),
                source: e,
            })?;

        Ok(Self {
            root,
            canonical_root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a root-relative path onto the host filesystem.
    pub async fn resolve(&self, path: &str) -> Result<PathBuf> {
        let normalized = path.trim_start_matches('/');
        let mut full = self.root.clone();

        for component in Path::new(normalized).components() {
            match component {
                Component::Normal(part) => full.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(StorageError::PathTraversal {
                        path: path.to_string(),
                    });
                }
            }
        }

        // Symlinks may still point elsewhere; check the nearest existing ancestor.
        let mut ancestor = full.as_path();
        loop {
            if fs::symlink_metadata(ancestor).await.is_ok() {
                let inside = fs::canonicalize(ancestor)
                    .await
                    .map(|canonical| canonical.starts_with(&self.canonical_root))
                    .unwrap_or(false);
                if !inside {
                    return Err(StorageError::PathTraversal {
                        path: path.to_string(),
                    });
                }
                break;
            }
            match ancestor.parent() {
                Some(parent) if parent.starts_with(&self.root) => ancestor = parent,
                _ => break,
            }
        }

        Ok(full)
    }

    fn relative_path(root: &Path, full: &Path) -> String {
        full.strip_prefix(root)
            .unwrap_or(full)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    async fn ensure_directory(path: &Path, mode: u32) -> io::Result<()> {
        if fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false) {
            return Ok(());
        }

        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(mode);
        #[cfg(not(unix))]
        let _ = mode;
        builder.create(path).await
    }

    async fn ensure_parent(path: &Path, options: &WriteOptions) -> io::Result<()> {
        match path.parent() {
            Some(parent) => Self::ensure_directory(parent, options.directory_mode()).await,
            None => Ok(()),
        }
    }

    /// Metadata of a regular file, or `None` when there is no file at `full`.
    async fn file_metadata(full: &Path) -> io::Result<Option<Metadata>> {
        match fs::metadata(full).await {
            Ok(meta) if meta.is_file() => Ok(Some(meta)),
            Ok(_) => Ok(None),
            Err(e) if is_absent(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn require_file<F>(&self, path: &str, on_error: F) -> Result<(PathBuf, Metadata)>
    where
        F: FnOnce(io::Error) -> StorageError,
    {
        let full = self.resolve(path).await?;
        match Self::file_metadata(&full).await {
            Ok(Some(meta)) => Ok((full, meta)),
            Ok(None) => Err(StorageError::not_found(path)),
            Err(e) => Err(on_error(e)),
        }
    }

    async fn apply_visibility(full: &Path, path: &str, visibility: Visibility) -> Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(full, std::fs::Permissions::from_mode(visibility.file_mode()))
                .await
                .map_err(|e| StorageError::SetVisibilityFailed {
                    path: path.to_string(),
                    source: e,
                })?;
        }
        #[cfg(not(unix))]
        let _ = (full, path, visibility);
        Ok(())
    }

    fn metadata_error(path: &str, attribute: &'static str) -> impl FnOnce(io::Error) -> StorageError {
        let path = path.to_string();
        move |e| StorageError::MetadataFailed {
            path,
            attribute,
            source: e,
        }
    }

    fn visibility_of(meta: &Metadata) -> Visibility {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            Visibility::from_mode(meta.permissions().mode())
        }
        #[cfg(not(unix))]
        {
            let _ = meta;
            Visibility::Public
        }
    }

    async fn is_same_file(from: &Path, from_meta: &Metadata, to: &Path) -> bool {
        let Ok(to_meta) = fs::metadata(to).await else {
            return false;
        };

        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            let _ = from;
            from_meta.dev() == to_meta.dev() && from_meta.ino() == to_meta.ino()
        }
        #[cfg(not(unix))]
        {
            let _ = (from_meta, to_meta);
            match (fs::canonicalize(from).await, fs::canonicalize(to).await) {
                (Ok(a), Ok(b)) => a == b,
                _ => false,
            }
        }
    }

    fn modified_at(meta: &Metadata) -> io::Result<DateTime<Utc>> {
        meta.modified().map(DateTime::<Utc>::from)
    }

    async fn sniff_mime_type(full: &Path) -> io::Result<String> {
        let file = fs::File::open(full).await?;
        let mut head = Vec::with_capacity(SNIFF_LEN as usize);
        file.take(SNIFF_LEN).read_to_end(&mut head).await?;
        Ok(sniff(&head).to_string())
    }

    fn delete_tree(root: &Path, target: &Path, path: &str) -> Result<()> {
        let failed = |step: &Path, source: io::Error| StorageError::DeleteDirectoryFailed {
            path: path.to_string(),
            step: step.display().to_string(),
            source,
        };

        // Children come before their parents; a non-empty directory cannot be removed.
        for item in WalkDir::new(target).min_depth(1).contents_first(true) {
            let entry = item.map_err(|e| {
                let step = e.path().unwrap_or(target).to_path_buf();
                failed(&step, e.into())
            })?;

            if entry.file_type().is_dir() {
                std::fs::remove_dir(entry.path()).map_err(|e| failed(entry.path(), e))?;
            } else {
                std::fs::remove_file(entry.path()).map_err(|e| failed(entry.path(), e))?;
            }
        }

        if target != root {
            std::fs::remove_dir(target).map_err(|e| failed(target, e))?;
        }

        Ok(())
    }
}

fn is_absent(e: &io::Error) -> bool {
    matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory)
}

/// Guess a content type from the leading bytes of a file.
pub fn sniff(head: &[u8]) -> &'static str {
    if head.is_empty() {
        return "application/x-empty";
    }

    if let Some(kind) = infer::get(head) {
        return kind.mime_type();
    }

    match std::str::from_utf8(head) {
        Ok(_) => "text/plain",
        // A multi-byte character cut off by the sniff window is still text.
        Err(e) if e.error_len().is_none() => "text/plain",
        Err(_) => "application/octet-stream",
    }
}

#[async_trait]
impl FilesystemAdapter for LocalStorage {
    async fn file_exists(&self, path: &str) -> Result<bool> {
        let full = self.resolve(path).await?;
        Self::file_metadata(&full)
            .await
            .map(|meta| meta.is_some())
            .map_err(|e| StorageError::CheckFailed {
                path: path.to_string(),
                source: e,
            })
    }

    async fn directory_exists(&self, path: &str) -> Result<bool> {
        let full = self.resolve(path).await?;
        match fs::metadata(&full).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if is_absent(&e) => Ok(false),
            Err(e) => Err(StorageError::CheckFailed {
                path: path.to_string(),
                source: e,
            }),
        }
    }

    async fn write(&self, path: &str, contents: &[u8], options: WriteOptions) -> Result<()> {
        let full = self.resolve(path).await?;
        let write_failed = |e| StorageError::WriteFailed {
            path: path.to_string(),
            source: e,
        };

        tracing::debug!("Writing {} bytes to {}", contents.len(), path);
        Self::ensure_parent(&full, &options)
            .await
            .map_err(write_failed)?;
        fs::write(&full, contents).await.map_err(write_failed)?;

        if let Some(visibility) = options.visibility {
            Self::apply_visibility(&full, path, visibility).await?;
        }
        Ok(())
    }

    async fn write_stream(
        &self,
        path: &str,
        contents: ByteStream,
        options: WriteOptions,
    ) -> Result<()> {
        let full = self.resolve(path).await?;
        let mut contents = contents;

        let copied = async {
            Self::ensure_parent(&full, &options).await?;
            let mut file = fs::File::create(&full).await?;
            let written = tokio::io::copy(&mut contents, &mut file).await?;
            file.flush().await?;
            Ok::<u64, io::Error>(written)
        }
        .await;
        drop(contents);

        let written = copied.map_err(|e| StorageError::WriteFailed {
            path: path.to_string(),
            source: e,
        })?;
        tracing::debug!("Streamed {} bytes to {}", written, path);

        if let Some(visibility) = options.visibility {
            Self::apply_visibility(&full, path, visibility).await?;
        }
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let read_failed = |e| StorageError::ReadFailed {
            path: path.to_string(),
            source: e,
        };
        let (full, _) = self.require_file(path, read_failed).await?;

        fs::read(&full).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StorageError::not_found(path)
            } else {
                read_failed(e)
            }
        })
    }

    async fn read_stream(&self, path: &str) -> Result<ByteStream> {
        let read_failed = |e| StorageError::ReadFailed {
            path: path.to_string(),
            source: e,
        };
        let (full, _) = self.require_file(path, read_failed).await?;

        match fs::File::open(&full).await {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::not_found(path)),
            Err(e) => Err(read_failed(e)),
        }
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full = self.resolve(path).await?;
        let delete_failed = |e| StorageError::DeleteFailed {
            path: path.to_string(),
            source: e,
        };

        if Self::file_metadata(&full)
            .await
            .map_err(delete_failed)?
            .is_none()
        {
            return Ok(());
        }

        match fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(delete_failed(e)),
        }
    }

    async fn delete_directory(&self, path: &str) -> Result<()> {
        let full = self.resolve(path).await?;
        match fs::metadata(&full).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Ok(()),
            Err(e) if is_absent(&e) => return Ok(()),
            Err(e) => {
                return Err(StorageError::DeleteDirectoryFailed {
                    path: path.to_string(),
                    step: full.display().to_string(),
                    source: e,
                })
            }
        }

        tracing::debug!("Deleting directory {}", path);
        let root = self.root.clone();
        let owned_path = path.to_string();
        let target = full.clone();
        tokio::task::spawn_blocking(move || Self::delete_tree(&root, &target, &owned_path))
            .await
            .map_err(|e| StorageError::DeleteDirectoryFailed {
                path: path.to_string(),
                step: full.display().to_string(),
                source: io::Error::other(e),
            })?
    }

    async fn create_directory(&self, path: &str, options: WriteOptions) -> Result<()> {
        let full = self.resolve(path).await?;
        Self::ensure_directory(&full, options.directory_mode())
            .await
            .map_err(|e| StorageError::CreateDirectoryFailed {
                path: path.to_string(),
                source: e,
            })
    }

    async fn set_visibility(&self, path: &str, visibility: Visibility) -> Result<()> {
        let (full, _) = self
            .require_file(path, |e| StorageError::SetVisibilityFailed {
                path: path.to_string(),
                source: e,
            })
            .await?;

        tracing::debug!("Setting visibility of {} to {}", path, visibility);
        Self::apply_visibility(&full, path, visibility).await
    }

    async fn visibility(&self, path: &str) -> Result<Visibility> {
        let (_, meta) = self
            .require_file(path, Self::metadata_error(path, "visibility"))
            .await?;
        Ok(Self::visibility_of(&meta))
    }

    async fn mime_type(&self, path: &str) -> Result<String> {
        let (full, _) = self
            .require_file(path, Self::metadata_error(path, "mime type"))
            .await?;
        Self::sniff_mime_type(&full)
            .await
            .map_err(Self::metadata_error(path, "mime type"))
    }

    async fn last_modified(&self, path: &str) -> Result<DateTime<Utc>> {
        let (_, meta) = self
            .require_file(path, Self::metadata_error(path, "last modified time"))
            .await?;
        Self::modified_at(&meta).map_err(Self::metadata_error(path, "last modified time"))
    }

    async fn file_size(&self, path: &str) -> Result<u64> {
        let (_, meta) = self
            .require_file(path, Self::metadata_error(path, "file size"))
            .await?;
        Ok(meta.len())
    }

    async fn metadata(&self, path: &str) -> Result<FileMetadata> {
        let (full, meta) = self
            .require_file(path, Self::metadata_error(path, "metadata"))
            .await?;
        let mime_type = Self::sniff_mime_type(&full)
            .await
            .map_err(Self::metadata_error(path, "mime type"))?;

        Ok(FileMetadata {
            path: path.trim_start_matches('/').to_string(),
            size: Some(meta.len()),
            last_modified: Self::modified_at(&meta).ok(),
            visibility: Some(Self::visibility_of(&meta)),
            mime_type: Some(mime_type),
        })
    }

    async fn list_contents(&self, path: &str, deep: bool) -> Result<DirectoryListing> {
        let full = self.resolve(path).await?;
        if !self.directory_exists(path).await? {
            return Ok(Box::new(std::iter::empty()));
        }

        let mut walker = WalkDir::new(&full).min_depth(1).sort_by_file_name();
        if !deep {
            walker = walker.max_depth(1);
        }

        let root = self.root.clone();
        let listed = path.to_string();
        let listing = walker.into_iter().map(move |item| -> Result<DirectoryEntry> {
            let list_failed = |source: io::Error| StorageError::ListFailed {
                path: listed.clone(),
                source,
            };
            let entry = item.map_err(|e| list_failed(e.into()))?;
            let relative = Self::relative_path(&root, entry.path());

            if entry.file_type().is_dir() {
                return Ok(DirectoryEntry::Directory { path: relative });
            }

            let meta = entry.metadata().map_err(|e| list_failed(e.into()))?;
            Ok(DirectoryEntry::File(FileMetadata {
                size: Some(meta.len()),
                last_modified: Self::modified_at(&meta).ok(),
                ..FileMetadata::new(relative)
            }))
        });

        Ok(Box::new(listing))
    }

    async fn move_file(
        &self,
        source: &str,
        destination: &str,
        options: WriteOptions,
    ) -> Result<()> {
        let move_failed = |e| StorageError::MoveFailed {
            source_path: source.to_string(),
            destination: destination.to_string(),
            source: e,
        };
        let (from, _) = self.require_file(source, move_failed).await?;
        let to = self.resolve(destination).await?;

        tracing::debug!("Moving {} to {}", source, destination);
        Self::ensure_parent(&to, &options)
            .await
            .map_err(move_failed)?;
        fs::rename(&from, &to).await.map_err(move_failed)?;

        if let Some(visibility) = options.visibility {
            Self::apply_visibility(&to, destination, visibility).await?;
        }
        Ok(())
    }

    async fn copy(&self, source: &str, destination: &str, options: WriteOptions) -> Result<()> {
        let copy_failed = |e| StorageError::CopyFailed {
            source_path: source.to_string(),
            destination: destination.to_string(),
            source: e,
        };
        let (from, from_meta) = self.require_file(source, copy_failed).await?;
        let to = self.resolve(destination).await?;

        // Copying onto the source would truncate it before reading.
        if Self::is_same_file(&from, &from_meta, &to).await {
            return Err(copy_failed(io::Error::new(
                ErrorKind::InvalidInput,
                "source and destination are the same file",
            )));
        }

        tracing::debug!("Copying {} to {}", source, destination);
        Self::ensure_parent(&to, &options)
            .await
            .map_err(copy_failed)?;
        fs::copy(&from, &to).await.map_err(copy_failed)?;

        if let Some(visibility) = options.visibility {
            Self::apply_visibility(&to, destination, visibility).await?;
        }
        Ok(())
    }
}
