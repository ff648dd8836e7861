use anyhow::Result;
use perpetual_storage::{
    DirectoryEntry, FilesystemAdapter, PerpetualAdapter, StorageError, Visibility, WriteOptions,
};
use std::collections::BTreeSet;
use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tokio_test::{assert_err, assert_ok};

/// Reader that holds a shared handle so tests can see when it was dropped,
/// and optionally fails once `fail_after` bytes have been handed out.
struct TrackedReader {
    data: Cursor<Vec<u8>>,
    fail_after: Option<usize>,
    handed_out: usize,
    _handle: Arc<()>,
}

impl TrackedReader {
    fn new(data: Vec<u8>, fail_after: Option<usize>, handle: &Arc<()>) -> Self {
        Self {
            data: Cursor::new(data),
            fail_after,
            handed_out: 0,
            _handle: Arc::clone(handle),
        }
    }
}

impl AsyncRead for TrackedReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if let Some(limit) = self.fail_after {
            if self.handed_out >= limit {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "source went away",
                )));
            }
        }

        let before = buf.filled().len();
        let poll = Pin::new(&mut self.data).poll_read(cx, buf);
        let read = buf.filled().len() - before;
        self.handed_out += read;
        poll
    }
}

fn adapter() -> Result<(TempDir, PerpetualAdapter)> {
    let temp = TempDir::new()?;
    let adapter = PerpetualAdapter::local_only(temp.path())?;
    Ok((temp, adapter))
}

#[tokio::test]
async fn test_hello_scenario() -> Result<()> {
    let (temp, adapter) = adapter()?;

    adapter.write("a.txt", b"hello", WriteOptions::default()).await?;
    assert_eq!(adapter.read("a.txt").await?, b"hello");
    assert_eq!(adapter.file_size("a.txt").await?, 5);

    adapter.copy("a.txt", "b.txt", WriteOptions::default()).await?;
    assert_eq!(adapter.read("b.txt").await?, b"hello");

    adapter.delete_directory("").await?;
    assert!(!adapter.file_exists("a.txt").await?);
    assert!(!adapter.file_exists("b.txt").await?);
    assert!(temp.path().is_dir());

    Ok(())
}

#[tokio::test]
async fn test_round_trip_payloads() -> Result<()> {
    let (_temp, adapter) = adapter()?;
    let binary: Vec<u8> = (0..=255u8).cycle().take(70_000).collect();
    let payloads: [&[u8]; 4] = [b"", b"x", "ünïcødé\n".as_bytes(), &binary];

    for (i, payload) in payloads.iter().enumerate() {
        let path = format!("round/trip/{}.bin", i);
        adapter.write(&path, payload, WriteOptions::default()).await?;
        assert_eq!(adapter.read(&path).await?, *payload);
    }

    // full overwrite, not append
    adapter.write("round/trip/0.bin", b"longer", WriteOptions::default()).await?;
    adapter.write("round/trip/0.bin", b"ab", WriteOptions::default()).await?;
    assert_eq!(adapter.read("round/trip/0.bin").await?, b"ab");

    Ok(())
}

#[tokio::test]
async fn test_existence_follows_write_and_delete() -> Result<()> {
    let (_temp, adapter) = adapter()?;

    assert!(!adapter.file_exists("docs/readme.md").await?);
    adapter.write("docs/readme.md", b"# hi", WriteOptions::default()).await?;
    assert!(adapter.file_exists("docs/readme.md").await?);
    assert!(adapter.directory_exists("docs").await?);

    adapter.delete("docs/readme.md").await?;
    assert!(!adapter.file_exists("docs/readme.md").await?);

    Ok(())
}

#[tokio::test]
async fn test_deletes_are_idempotent() -> Result<()> {
    let (_temp, adapter) = adapter()?;

    assert_ok!(adapter.delete("never-existed.txt").await);
    assert_ok!(adapter.delete("no/such/dir/file.txt").await);
    assert_ok!(adapter.delete_directory("never-existed").await);

    adapter.write("gone/file.txt", b"1", WriteOptions::default()).await?;
    adapter.delete_directory("gone").await?;
    assert_ok!(adapter.delete_directory("gone").await);
    assert!(!adapter.directory_exists("gone").await?);

    Ok(())
}

#[tokio::test]
async fn test_missing_files_are_not_found() -> Result<()> {
    let (_temp, adapter) = adapter()?;

    assert!(matches!(
        adapter.read("missing.txt").await,
        Err(StorageError::NotFound { .. })
    ));
    assert!(adapter.read_stream("missing.txt").await.is_err());
    assert!(adapter.file_size("missing.txt").await.unwrap_err().is_not_found());
    assert!(adapter.last_modified("missing.txt").await.unwrap_err().is_not_found());
    assert!(adapter.mime_type("missing.txt").await.unwrap_err().is_not_found());
    assert!(adapter.visibility("missing.txt").await.unwrap_err().is_not_found());
    assert!(adapter
        .set_visibility("missing.txt", Visibility::Public)
        .await
        .unwrap_err()
        .is_not_found());
    assert!(adapter
        .move_file("missing.txt", "b.txt", WriteOptions::default())
        .await
        .unwrap_err()
        .is_not_found());
    assert!(adapter
        .copy("missing.txt", "b.txt", WriteOptions::default())
        .await
        .unwrap_err()
        .is_not_found());
    // a failed move must not leave the destination behind
    assert!(!adapter.file_exists("b.txt").await?);

    Ok(())
}

#[tokio::test]
async fn test_path_traversal_rejected_everywhere() -> Result<()> {
    let (_temp, adapter) = adapter()?;

    assert!(matches!(
        adapter.write("../escape.txt", b"x", WriteOptions::default()).await,
        Err(StorageError::PathTraversal { .. })
    ));
    assert!(matches!(
        adapter.read("a/../../etc/passwd").await,
        Err(StorageError::PathTraversal { .. })
    ));
    assert!(adapter.list_contents("..", true).await.is_err());
    assert_err!(adapter.delete_directory("..").await);

    Ok(())
}

#[tokio::test]
async fn test_recursive_listing_is_complete() -> Result<()> {
    let (_temp, adapter) = adapter()?;

    adapter.write("file.txt", b"top", WriteOptions::default()).await?;
    adapter.write("nested/inner.txt", b"inner", WriteOptions::default()).await?;

    let entries = adapter
        .list_contents("", true)
        .await?
        .collect::<perpetual_storage::Result<Vec<_>>>()?;
    let paths: Vec<&str> = entries.iter().map(|e| e.path()).collect();
    let unique: BTreeSet<&str> = paths.iter().copied().collect();

    assert_eq!(paths.len(), 3);
    assert_eq!(
        unique,
        BTreeSet::from(["file.txt", "nested", "nested/inner.txt"])
    );

    let nested = entries.iter().find(|e| e.path() == "nested").unwrap();
    assert!(nested.is_dir());
    match entries.iter().find(|e| e.path() == "nested/inner.txt").unwrap() {
        DirectoryEntry::File(meta) => {
            assert_eq!(meta.size, Some(5));
            assert!(meta.last_modified.is_some());
        }
        other => panic!("expected a file, got {:?}", other),
    }

    Ok(())
}

#[tokio::test]
async fn test_shallow_listing_and_missing_directory() -> Result<()> {
    let (_temp, adapter) = adapter()?;

    adapter.write("dir/a.txt", b"a", WriteOptions::default()).await?;
    adapter.write("dir/sub/b.txt", b"b", WriteOptions::default()).await?;

    let shallow: Vec<String> = adapter
        .list_contents("dir", false)
        .await?
        .map(|entry| entry.map(|e| e.path().to_string()))
        .collect::<perpetual_storage::Result<_>>()?;
    assert_eq!(shallow, vec!["dir/a.txt", "dir/sub"]);

    assert_eq!(adapter.list_contents("nowhere", true).await?.count(), 0);
    assert_eq!(adapter.list_contents("dir/a.txt", false).await?.count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_move_semantics() -> Result<()> {
    let (_temp, adapter) = adapter()?;

    adapter.write("a.txt", b"moving", WriteOptions::default()).await?;
    adapter
        .move_file("a.txt", "archive/2024/a.txt", WriteOptions::default())
        .await?;

    assert!(!adapter.file_exists("a.txt").await?);
    assert!(adapter.file_exists("archive/2024/a.txt").await?);
    assert_eq!(adapter.read("archive/2024/a.txt").await?, b"moving");

    Ok(())
}

#[tokio::test]
async fn test_copy_semantics() -> Result<()> {
    let (_temp, adapter) = adapter()?;

    adapter.write("a.txt", b"copied", WriteOptions::default()).await?;
    adapter
        .copy("a.txt", "backup/a.txt", WriteOptions::default())
        .await?;

    assert!(adapter.file_exists("a.txt").await?);
    assert!(adapter.file_exists("backup/a.txt").await?);
    assert_eq!(
        adapter.read("a.txt").await?,
        adapter.read("backup/a.txt").await?
    );

    Ok(())
}

#[tokio::test]
async fn test_streams() -> Result<()> {
    let (_temp, adapter) = adapter()?;
    let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();

    let source = std::io::Cursor::new(payload.clone());
    adapter
        .write_stream("big/blob.bin", Box::new(source), WriteOptions::default())
        .await?;

    let mut stream = adapter.read_stream("big/blob.bin").await?;
    let mut read_back = Vec::new();
    stream.read_to_end(&mut read_back).await?;

    assert_eq!(read_back, payload);
    assert_eq!(adapter.file_size("big/blob.bin").await?, 200_000);

    Ok(())
}

#[tokio::test]
async fn test_create_directory_is_idempotent() -> Result<()> {
    let (_temp, adapter) = adapter()?;

    adapter.create_directory("a/b/c", WriteOptions::default()).await?;
    adapter.create_directory("a/b/c", WriteOptions::default()).await?;
    assert!(adapter.directory_exists("a/b/c").await?);
    assert!(!adapter.file_exists("a/b/c").await?);

    adapter.write("plain", b"file", WriteOptions::default()).await?;
    assert!(matches!(
        adapter.create_directory("plain", WriteOptions::default()).await,
        Err(StorageError::CreateDirectoryFailed { .. })
    ));

    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn test_visibility() -> Result<()> {
    let (_temp, adapter) = adapter()?;

    adapter
        .write(
            "secret.txt",
            b"s3cr3t",
            WriteOptions::with_visibility(Visibility::Private),
        )
        .await?;
    assert_eq!(adapter.visibility("secret.txt").await?, Visibility::Private);

    adapter.set_visibility("secret.txt", Visibility::Public).await?;
    assert_eq!(adapter.visibility("secret.txt").await?, Visibility::Public);

    adapter.set_visibility("secret.txt", Visibility::Private).await?;
    assert_eq!(adapter.visibility("secret.txt").await?, Visibility::Private);

    Ok(())
}

#[tokio::test]
async fn test_metadata() -> Result<()> {
    let (_temp, adapter) = adapter()?;
    let before = chrono::Utc::now() - chrono::Duration::seconds(5);

    adapter.write("notes.txt", b"plain text notes", WriteOptions::default()).await?;
    adapter
        .write("pixel.png", b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR", WriteOptions::default())
        .await?;
    adapter.write("empty", b"", WriteOptions::default()).await?;

    assert_eq!(adapter.mime_type("notes.txt").await?, "text/plain");
    assert_eq!(adapter.mime_type("pixel.png").await?, "image/png");
    assert_eq!(adapter.mime_type("empty").await?, "application/x-empty");
    assert!(adapter.last_modified("notes.txt").await? >= before);

    let meta = adapter.metadata("/notes.txt").await?;
    assert_eq!(meta.path, "notes.txt");
    assert_eq!(meta.size, Some(16));
    assert_eq!(meta.mime_type.as_deref(), Some("text/plain"));
    assert!(meta.visibility.is_some());

    Ok(())
}

#[tokio::test]
async fn test_copy_onto_itself_keeps_the_file() -> Result<()> {
    let (_temp, adapter) = adapter()?;
    adapter.write("a.txt", b"hello", WriteOptions::default()).await?;

    for destination in ["a.txt", "./a.txt", "/a.txt"] {
        let result = adapter
            .copy("a.txt", destination, WriteOptions::default())
            .await;
        assert!(matches!(result, Err(StorageError::CopyFailed { .. })));
        assert_eq!(adapter.read("a.txt").await?, b"hello");
    }

    Ok(())
}

#[tokio::test]
async fn test_write_stream_releases_source_when_destination_fails() -> Result<()> {
    let (_temp, adapter) = adapter()?;
    adapter.write("a.txt", b"plain file", WriteOptions::default()).await?;
    let handle = Arc::new(());

    let source = TrackedReader::new(b"payload".to_vec(), None, &handle);
    let result = adapter
        .write_stream("a.txt/child", Box::new(source), WriteOptions::default())
        .await;

    assert!(matches!(result, Err(StorageError::WriteFailed { .. })));
    assert_eq!(Arc::strong_count(&handle), 1);

    let source = TrackedReader::new(b"payload".to_vec(), None, &handle);
    let result = adapter
        .write_stream("../outside", Box::new(source), WriteOptions::default())
        .await;

    assert!(matches!(result, Err(StorageError::PathTraversal { .. })));
    assert_eq!(Arc::strong_count(&handle), 1);

    Ok(())
}

#[tokio::test]
async fn test_write_stream_releases_source_when_reader_fails() -> Result<()> {
    let (_temp, adapter) = adapter()?;
    let handle = Arc::new(());
    let source = TrackedReader::new(vec![7u8; 64 * 1024], Some(16), &handle);

    let result = adapter
        .write_stream("partial.bin", Box::new(source), WriteOptions::default())
        .await;

    match result {
        Err(StorageError::WriteFailed { source, .. }) => {
            assert_eq!(source.kind(), io::ErrorKind::ConnectionReset);
        }
        other => panic!("expected WriteFailed, got {:?}", other),
    }
    assert_eq!(Arc::strong_count(&handle), 1);

    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn test_delete_directory_reports_failing_step() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let (temp, adapter) = adapter()?;
    adapter
        .write("locked/inner/file.txt", b"stuck", WriteOptions::default())
        .await?;
    let inner = temp.path().join("locked").join("inner");
    std::fs::set_permissions(&inner, std::fs::Permissions::from_mode(0o500))?;

    // Privileged users ignore directory permissions.
    let privileged = std::fs::write(inner.join("write-check"), b"").is_ok();
    if privileged {
        std::fs::set_permissions(&inner, std::fs::Permissions::from_mode(0o755))?;
        return Ok(());
    }

    let result = adapter.delete_directory("locked").await;
    std::fs::set_permissions(&inner, std::fs::Permissions::from_mode(0o755))?;

    match result {
        Err(StorageError::DeleteDirectoryFailed { path, step, source }) => {
            assert_eq!(path, "locked");
            assert!(step.ends_with("file.txt"), "unexpected step {}", step);
            assert_eq!(source.kind(), io::ErrorKind::PermissionDenied);
        }
        other => panic!("expected DeleteDirectoryFailed, got {:?}", other),
    }
    assert!(adapter.file_exists("locked/inner/file.txt").await?);
    assert!(adapter.directory_exists("locked").await?);

    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn test_unreadable_file_is_read_failure() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let (temp, adapter) = adapter()?;
    adapter.write("sealed.txt", b"sealed", WriteOptions::default()).await?;
    let full = temp.path().join("sealed.txt");
    std::fs::set_permissions(&full, std::fs::Permissions::from_mode(0o000))?;

    if std::fs::read(&full).is_ok() {
        return Ok(());
    }

    let result = adapter.read("sealed.txt").await;
    assert!(matches!(result, Err(StorageError::ReadFailed { .. })));
    assert!(adapter.read_stream("sealed.txt").await.is_err());
    assert!(!result.unwrap_err().is_not_found());

    Ok(())
}
