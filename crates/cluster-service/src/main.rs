//! clusterd - instrument cluster telemetry daemon

use anyhow::{Context, Result};
use clap::Parser;
use cluster_link::DEVICE_ENV;
use cluster_service::{Cli, Runtime};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "clusterd={level},cluster_service={level},cluster_link={level},cluster_telemetry={level}",
                    level = cli.log_level()
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = cli
        .resolve(std::env::var(DEVICE_ENV).ok())
        .context("failed to load configuration")?;

    if cli.print_config {
        print!(
            "{}",
            serde_yaml::to_string(&config).context("failed to render configuration")?
        );
        return Ok(());
    }

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || stop.store(true, Ordering::Release))
            .context("failed to install Ctrl-C handler")?;
    }

    let runtime = Runtime::start(&config)?;
    info!("Press Ctrl-C to stop");
    runtime.run_until(&stop);
    info!("Shutting down");
    runtime.shutdown()
}
