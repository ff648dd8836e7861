use crate::config::cli::Command;
use crate::core::adapter::PerpetualAdapter;
use crate::domain::model::{DirectoryEntry, Visibility, WriteOptions};
use crate::domain::ports::FilesystemAdapter;
use anyhow::{bail, Context, Result};
use serde::Serialize;
use tokio::io::AsyncWriteExt;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn execute(adapter: &PerpetualAdapter, command: Command) -> Result<()> {
    match command {
        Command::Write {
            path,
            content,
            from,
            visibility,
        } => {
            let options = WriteOptions {
                visibility,
                ..WriteOptions::default()
            };
            match (content, from) {
                (_, Some(local)) => {
                    let file = tokio::fs::File::open(&local)
                        .await
                        .with_context(|| format!("Failed to open {}", local.display()))?;
                    adapter.write_stream(&path, Box::new(file), options).await?;
                }
                (Some(content), None) => adapter.write(&path, content.as_bytes(), options).await?,
                (None, None) => bail!("Provide the content to write or --from <file>"),
            }
            println!("✅ Written {}", path);
        }
        Command::Read { path } => {
            let mut stream = adapter.read_stream(&path).await?;
            let mut stdout = tokio::io::stdout();
            tokio::io::copy(&mut stream, &mut stdout).await?;
            stdout.flush().await?;
        }
        Command::Ls { path, recursive } => {
            for entry in adapter.list_contents(&path, recursive).await? {
                match entry? {
                    DirectoryEntry::Directory { path } => println!("{}/", path),
                    DirectoryEntry::File(meta) => {
                        println!("{}\t{}", meta.path, meta.size.unwrap_or_default())
                    }
                }
            }
        }
        Command::Stat { path } => print_json(&adapter.metadata(&path).await?)?,
        Command::Rm { path } => {
            adapter.delete(&path).await?;
            println!("✅ Deleted {}", path);
        }
        Command::Rmdir { path } => {
            adapter.delete_directory(&path).await?;
            println!("✅ Deleted directory {}", path);
        }
        Command::Mkdir { path, private } => {
            let options = WriteOptions {
                directory_visibility: Some(if private {
                    Visibility::Private
                } else {
                    Visibility::Public
                }),
                ..WriteOptions::default()
            };
            adapter.create_directory(&path, options).await?;
            println!("✅ Created directory {}", path);
        }
        Command::Mv {
            source,
            destination,
        } => {
            adapter
                .move_file(&source, &destination, WriteOptions::default())
                .await?;
            println!("✅ Moved {} to {}", source, destination);
        }
        Command::Cp {
            source,
            destination,
        } => {
            adapter
                .copy(&source, &destination, WriteOptions::default())
                .await?;
            println!("✅ Copied {} to {}", source, destination);
        }
        Command::Visibility { path, value } => match value {
            Some(visibility) => {
                adapter.set_visibility(&path, visibility).await?;
                println!("✅ {} is now {}", path, visibility);
            }
            None => println!("{}", adapter.visibility(&path).await?),
        },
        Command::Upload { path, public } => {
            tracing::info!("Uploading {} to Autonomi", path);
            let result = adapter.upload_directory_to_archive(&path, public).await?;
            print_json(&result)?;
        }
        Command::Download {
            path,
            data_map,
            public_address,
        } => {
            tracing::info!("Downloading archive into {}", path);
            let result = adapter
                .download_directory_from_archive(
                    &path,
                    data_map.as_deref(),
                    public_address.as_deref(),
                )
                .await?;
            print_json(&result)?;
        }
        Command::Transactions {
            date,
            operation_type,
        } => print_json(
            &adapter
                .list_archive_transactions(date, operation_type)
                .await?,
        )?,
        Command::Stats { days } => print_json(&adapter.archive_stats(days).await?)?,
    }

    Ok(())
}
