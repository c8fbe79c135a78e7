//! Headless battle driver.
//!
//! Usage: `battle-cli <scenario.json>`
//!
//! Loads the scenario, runs it frame by frame through the runtime worker,
//! then prints the engine stats, member listing and snapshot digest as JSON.
mod scenario;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use battle_runtime::{Runtime, RuntimeConfig, snapshot_digest};
use serde_json::json;

use scenario::Scenario;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (silently ignore if not found)
    let _ = dotenvy::dotenv();
    setup_logging();

    let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) else {
        bail!("usage: battle-cli <scenario.json>");
    };
    let scenario = Scenario::load(&path)?;

    // Scripted intents need exact frame boundaries.
    let config = RuntimeConfig::from_env()?.with_autoplay(false);
    let runtime = Runtime::start(config);
    let handle = runtime.handle();

    handle
        .start(scenario.data.clone())
        .await
        .context("starting simulation")?;
    tracing::info!(
        scenario = %path.display(),
        frames = scenario.frames,
        scripted = scenario.script.len(),
        "scenario loaded"
    );

    for (intents, frames) in scenario.timeline() {
        for intent in intents {
            handle.process_intent(intent).await?;
        }
        if frames > 0 {
            let summary = handle.step(frames).await?;
            tracing::debug!(
                frame = %summary.frame,
                committed = summary.committed,
                skipped = summary.skipped,
                "segment simulated"
            );
        }
    }

    let stats = handle.stats().await?;
    let members = handle.members().await?;
    let digest = snapshot_digest(&handle.snapshot().await?)?;
    handle.stop().await?;

    let report = json!({
        "stats": stats,
        "members": members,
        "digest": digest,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    drop(handle);
    runtime.shutdown().await?;
    Ok(())
}

/// Logs go to stderr so stdout stays machine-readable.
fn setup_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}
