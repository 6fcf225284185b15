//! Market data recorder entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Streams exchange trades into date-partitioned CSV files.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via CRYPTICK_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    cryptick_telemetry::init_logging()?;

    info!("Starting cryptick recorder v{}", env!("CARGO_PKG_VERSION"));

    let config = cryptick_recorder::AppConfig::load(args.config)?;

    let mut app = cryptick_recorder::Application::new(config)?;
    app.run().await?;

    Ok(())
}
