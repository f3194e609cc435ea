//! `sync`: one reconciliation pass, then exit.

use anyhow::Result;

use notewatch::config::NotewatchConfig;
use notewatch::sync::{EligibilityFilter, Reconciler};

pub async fn sync(config: &NotewatchConfig) -> Result<()> {
    let notes_dir = config.resolved_notes_dir()?;
    let mut store = super::open_store(config)?;
    let reconciler = Reconciler::new(notes_dir, EligibilityFilter::new(&config.notes.extension));

    let report = tokio::task::spawn_blocking(move || reconciler.sync(&mut store)).await??;

    println!("Synced {}", report);
    if report.conflicts > 0 {
        println!(
            "WARNING: {} path(s) are claimed by more than one record. Remove the extra rows, then sync again.",
            report.conflicts
        );
    }
    if report.failed > 0 {
        println!("{} file(s) could not be synced; see the log for details.", report.failed);
    }
    Ok(())
}
