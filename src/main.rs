use clap::Parser;
use perpetual_storage::app::commands;
use perpetual_storage::utils::{logger, validation::Validate};
use perpetual_storage::{CliConfig, PerpetualAdapter, StorageError};

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<StorageError>() {
            Some(storage_error) => {
                tracing::error!(
                    "❌ Operation failed: {} (Category: {:?})",
                    storage_error,
                    storage_error.category()
                );
                eprintln!("❌ {}", storage_error.user_friendly_message());
            }
            None => {
                tracing::error!("❌ Operation failed: {:#}", e);
                eprintln!("❌ {:#}", e);
            }
        }
        std::process::exit(1);
    }
}

async fn run(cli: CliConfig) -> anyhow::Result<()> {
    let config = cli.adapter_config()?;
    config.validate()?;

    let adapter = PerpetualAdapter::from_config(&config)?;
    tracing::debug!(
        "Storage root {} (archive {})",
        config.storage.root,
        if adapter.archive_enabled() {
            "enabled"
        } else {
            "disabled"
        }
    );

    commands::execute(&adapter, cli.command).await
}
