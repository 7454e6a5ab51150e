//! qboard - BullMQ queue inspector - Entry Point

use anyhow::Result;
use clap::Parser;
use qboard::{Cli, Command};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    match cli.command {
        Command::Start(args) => {
            // Validate before anything is opened
            let config = args.into_config()?;

            qboard_telemetry::init_logging()?;
            info!("Starting qboard v{}", env!("CARGO_PKG_VERSION"));
            info!(
                port = config.port(),
                queues = ?config.queue_names(),
                "Configuration loaded"
            );

            qboard::run(config).await?;
        }
    }

    Ok(())
}
