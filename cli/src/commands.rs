//! Subcommand implementations.

use anyhow::{Context, Result, anyhow};
use lockbox_storage::VaultStore;
use lockbox_sync::{SyncCoordinator, SyncOutcome};
use lockbox_types::{ClientEntry, EntityClass};
use std::time::Duration;
use tracing::info;

/// Stores `value` under `name`, replacing any previous value.
pub fn put(vault: &VaultStore, class: EntityClass, name: &str, value: &str) -> Result<ClientEntry> {
    vault
        .put(class, name, value.as_bytes())
        .with_context(|| format!("failed to store {class}/{name}"))
}

/// Returns the value stored under `name`, if any.
pub fn get(vault: &VaultStore, class: EntityClass, name: &str) -> Result<Option<String>> {
    let entry = vault
        .get(class, name)
        .with_context(|| format!("failed to read {class}/{name}"))?;
    Ok(entry.map(|e| String::from_utf8_lossy(&e.data).into_owned()))
}

/// Lists live entry names with their last modification time.
pub fn list(vault: &VaultStore, class: EntityClass) -> Result<Vec<String>> {
    let entries = vault
        .list(class)
        .with_context(|| format!("failed to list {class}"))?;
    Ok(entries
        .into_iter()
        .map(|e| {
            let marker = if e.remote_link.is_some() { "" } else { " (not synced)" };
            format!("{}\t{}{}", e.name, e.updated_at, marker)
        })
        .collect())
}

/// Removes `name`; the removal reaches the server on the next sync.
pub fn remove(vault: &VaultStore, class: EntityClass, name: &str) -> Result<()> {
    vault
        .remove(class, name)
        .with_context(|| format!("failed to remove {class}/{name}"))
}

/// Classes selected by `--class`, or all of them.
pub fn selected_classes(class: Option<EntityClass>) -> Vec<EntityClass> {
    class.map_or_else(|| EntityClass::ALL.to_vec(), |c| vec![c])
}

/// Renders one line per class and counts the classes that failed.
pub fn summarize(outcome: &SyncOutcome) -> (Vec<String>, usize) {
    let mut failed = 0;
    let lines = outcome
        .iter()
        .map(|(class, result)| match result {
            Ok(report) => report.to_string(),
            Err(e) => {
                failed += 1;
                format!("{class}: failed: {e}")
            }
        })
        .collect();
    (lines, failed)
}

/// Runs one sync round, printing a line per class.
pub async fn sync_once(coordinator: &SyncCoordinator, classes: &[EntityClass]) -> Result<()> {
    let outcome = coordinator.sync_classes(classes).await;
    let (lines, failed) = summarize(&outcome);
    for line in lines {
        println!("{line}");
    }
    if failed > 0 {
        return Err(anyhow!("sync failed for {failed} of {} classes", outcome.len()));
    }
    Ok(())
}

/// Syncs every `interval` until Ctrl-C.
pub async fn watch(coordinator: &SyncCoordinator, classes: &[EntityClass], interval: Duration) {
    let token = coordinator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });
    info!("Syncing every {}s, press Ctrl-C to stop", interval.as_secs());
    coordinator.run_periodic(classes, interval).await;
}
