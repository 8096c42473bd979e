//! Bridge binary: radio in, simulator out, telemetry back.

use anyhow::Result;
use tracing::info;

use liftoff_bridge::bridge::Bridge;
use liftoff_bridge::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("liftoff-bridge v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::load_or_default(std::env::args().nth(1).as_deref())?;

    Bridge::new(config).run().await?;

    info!("liftoff-bridge stopped");
    Ok(())
}
