//! Telemetry hub binary: one simulator feed, many consumers.

use anyhow::Result;
use tracing::info;

use liftoff_bridge::config::Config;
use liftoff_bridge::hub::TelemetryHub;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!(
        "liftoff-telemetry-hub v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::load_or_default(std::env::args().nth(1).as_deref())?;

    TelemetryHub::bind(&config).await?.run().await?;

    info!("liftoff-telemetry-hub stopped");
    Ok(())
}
