//! pusher-daemon: publishes prices to an on-chain oracle account.
//!
//! Single OS process running a Tokio runtime. Reads one TOML config file
//! at startup (path from the first argument, `PUSHER_CONFIG`, or
//! `./pusher.toml`) and runs until interrupted.

mod chain;
mod config;
mod error;
mod publisher;
mod sources;

use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::chain::SolanaConnector;
use crate::config::PusherConfig;
use crate::publisher::{Publisher, PublisherSettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Locate and read config
    let path = config::config_path(std::env::args().nth(1));
    let loaded = PusherConfig::load(&path);

    // 2. Initialize tracing; RUST_LOG overrides the configured level
    let level = match &loaded {
        Ok(Some(config)) => config.runtime.log_level.clone(),
        _ => config::default_log_level(),
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("warn,pusher={level}")))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %path.display(),
        "oracle pusher starting"
    );

    // 3. Refuse to start on a bad config; idle and exit on a missing one
    let config = match loaded {
        Ok(Some(config)) => config,
        Ok(None) => {
            idle_without_config(&path).await;
            return Ok(());
        }
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return Err(e.into());
        }
    };
    if let Err(e) = config.validate() {
        error!(error = %e, "invalid configuration");
        return Err(e.into());
    }

    // 4. Interrupt handling
    let cancel = CancellationToken::new();
    let signal = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received, shutting down");
                signal.cancel();
            }
            Err(e) => warn!(error = %e, "cannot listen for interrupt signal"),
        }
    });

    // 5. Run until interrupted or a fatal error
    let settings = PublisherSettings::from_config(&config);
    let publisher = Publisher::new(SolanaConnector::new(config), settings, cancel);
    publisher.run().await?;

    info!("oracle pusher stopped");
    Ok(())
}

async fn idle_without_config(path: &Path) {
    let wait = config::MISSING_CONFIG_WAIT;
    error!(
        config = %path.display(),
        wait_ms = wait.as_millis() as u64,
        "config file not found, nothing to publish; exiting after wait"
    );
    tokio::select! {
        _ = tokio::time::sleep(wait) => {}
        _ = tokio::signal::ctrl_c() => info!("interrupt received"),
    }
}
