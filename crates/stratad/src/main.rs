//! stratad — Strata session-registry daemon.

use anyhow::Result;

use strata_core::config::StrataConfig;
use stratad::ShardRuntime;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = StrataConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = StrataConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        StrataConfig::default()
    });

    let runtime = ShardRuntime::start(&config)?;
    tracing::info!("session registry ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!(
        active_sessions = runtime.registry().active_total(),
        "shutting down"
    );
    runtime.shutdown();
    Ok(())
}
