//! convoy reconciler
//!
//! Observes the actual deploy state of every request at every configured
//! Singularity scheduler.
//!
//! ## Architecture
//!
//! - **Config**: environment variables plus a TOML cluster table
//! - **Reconciler**: polls each scheduler, rebuilding deploy states
//! - **Labeller**: maps deployed images back to source ids via registry labels

use anyhow::Result;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use convoy_reconciler::config::Config;
use convoy_reconciler::reconciler::Reconciler;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting convoy reconciler");

    let defs = config.load_defs()?;
    info!(
        clusters_file = %config.clusters_file.display(),
        clusters = defs.clusters.len(),
        docker_registry_url = %config.docker_registry_url,
        poll_interval_secs = config.poll_interval.as_secs(),
        max_retries = config.max_retries,
        "Configuration loaded"
    );

    let reconciler = Reconciler::new(&config, defs)?;

    if config.once {
        let actual = reconciler.reconcile().await;
        info!(
            deployments = actual.states.len(),
            failures = actual.failures.len(),
            "Single pass complete"
        );
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut handle = tokio::spawn(async move {
        reconciler.run(shutdown_rx).await;
    });

    let exited = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            false
        }
        _ = &mut handle => {
            info!("Reconciler exited");
            true
        }
    };

    if !exited {
        let _ = shutdown_tx.send(true);
        let _ = handle.await;
    }

    info!("Reconciler shutdown complete");
    Ok(())
}
