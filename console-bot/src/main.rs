//! Console Bot - Main entry point.
//!
//! Runs the command adapter against stdin/stdout.

use anyhow::Result;
use clap::Parser;
use console_bot::{Channel, CliChannel, CommandDispatcher, FileStore, MessageSender, StateStore};
use console_common::error::ResultExt;
use console_common::logging::init_logging;
use console_common::Config;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(name = "console-bot")]
#[command(author = "laopanmemz")]
#[command(version)]
#[command(about = "Chat commands for the chatbot dashboard admin API.", long_about = None)]
struct Args {
    /// Configuration file (defaults to ~/.consoleapi/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Operator identity used for CLI messages
    #[arg(long, default_value = "operator")]
    operator: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load_with_env(args.config.as_deref())?;

    // Initialize logging
    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );

    config.validate().context("Invalid configuration")?;

    tracing::info!("Console Bot v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(base_url = %config.base_url(), "Dashboard endpoint");

    let mut channel = CliChannel::new(args.operator);
    channel.init().await?;
    channel.health_check().await?;
    let channel = Arc::new(channel);
    tracing::info!(channel = channel.name(), "Channel ready");

    let store = FileStore::new(config.data_dir()).context("Failed to open data directory")?;
    tracing::debug!(data_dir = %store.base_dir().display(), "State store ready");

    let sender: Arc<dyn MessageSender> = channel.clone();
    let store: Arc<dyn StateStore> = Arc::new(store);
    let dispatcher = Arc::new(CommandDispatcher::from_config(&config, sender, store)?);

    // The CLI is ready as soon as it starts
    let delivery = dispatcher.on_platform_ready();

    let (tx, rx) = mpsc::unbounded_channel();
    let processor = CommandDispatcher::spawn_processor(dispatcher, rx);

    // `tx` moves into the callback and is dropped when `listen` returns
    channel
        .listen(move |message| {
            if let Err(e) = tx.send(message) {
                tracing::warn!(error = %e, "Dropping message, processor has stopped");
            }
        })
        .await?;

    tracing::info!("Input closed, finishing pending commands");
    if let Err(e) = processor.await {
        tracing::error!(error = %e, "Command processor failed");
    }
    if let Err(e) = delivery.await {
        tracing::error!(error = %e, "Restart notification task failed");
    }

    channel.shutdown().await?;
    tracing::info!("Console Bot stopped");
    Ok(())
}
