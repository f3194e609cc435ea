//! `serve`: catch up with the notes directory, then watch it until Ctrl-C.

use anyhow::{Context, Result};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use notewatch::config::NotewatchConfig;
use notewatch::sync::{EligibilityFilter, WatcherManager};

pub async fn serve(config: NotewatchConfig) -> Result<()> {
    let notes_dir = config.resolved_notes_dir()?;
    let store = super::open_store(&config)?;

    let mut manager = WatcherManager::new(
        notes_dir.clone(),
        Arc::new(Mutex::new(store)),
        EligibilityFilter::new(&config.notes.extension),
    )
    .with_reconcile_interval(Duration::from_secs(config.sync.interval_secs));

    // Startup catch-up runs before any live event is delivered.
    match tokio::task::block_in_place(|| manager.reconcile_now()) {
        Ok(report) => {
            tracing::info!(%report, "startup sync complete");
            if report.conflicts > 0 {
                tracing::warn!(conflicts = report.conflicts, "index has paths claimed by several records");
            }
        }
        Err(e) => tracing::error!(error = %e, "startup sync failed, watching anyway"),
    }

    manager.start()?;
    tracing::info!(dir = %notes_dir.display(), "notewatch running, press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    tracing::info!("shutting down");
    tokio::task::block_in_place(|| manager.stop());
    Ok(())
}
