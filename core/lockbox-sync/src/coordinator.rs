//! Sync coordinator.
//!
//! Drives the engine across entity classes. Each class runs as its own tokio
//! task with no state shared between them, so one class failing never stops
//! the others. The coordinator owns the retry policy: the engine itself never
//! retries, and [`SyncCoordinator::run_periodic`] simply runs another pass.

use crate::adapter::{LocalStore, RemoteStore};
use crate::engine::{SyncEngine, SyncReport};
use crate::error::{SyncError, SyncResult};
use lockbox_types::EntityClass;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Per-class results of one sync round.
pub type SyncOutcome = BTreeMap<EntityClass, SyncResult<SyncReport>>;

/// Runs sync passes between one vault and one remote account.
pub struct SyncCoordinator {
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
    engine: SyncEngine,
    cancel: CancellationToken,
}

impl SyncCoordinator {
    /// Creates a new coordinator.
    pub fn new(
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
        engine: SyncEngine,
    ) -> Self {
        Self {
            local,
            remote,
            engine,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops in-flight passes and the periodic loop when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancels in-flight passes and the periodic loop.
    pub fn shutdown(&self) {
        info!("Sync coordinator shutting down");
        self.cancel.cancel();
    }

    /// Runs one pass for a single class.
    pub async fn sync_class(&self, class: EntityClass) -> SyncResult<SyncReport> {
        self.engine
            .reconcile(class, self.remote.as_ref(), self.local.as_ref(), &self.cancel)
            .await
    }

    /// Runs one pass for each of the given classes concurrently.
    pub async fn sync_classes(&self, classes: &[EntityClass]) -> SyncOutcome {
        let mut workers = JoinSet::new();
        for &class in classes {
            let local = Arc::clone(&self.local);
            let remote = Arc::clone(&self.remote);
            let engine = self.engine.clone();
            let cancel = self.cancel.clone();
            workers.spawn(async move {
                let result = engine
                    .reconcile(class, remote.as_ref(), local.as_ref(), &cancel)
                    .await;
                (class, result)
            });
        }

        let mut outcome = SyncOutcome::new();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((class, result)) => {
                    if let Err(e) = &result {
                        warn!("Sync of {} failed: {}", class, e);
                    }
                    outcome.insert(class, result);
                }
                Err(e) => warn!("Sync worker failed: {}", e),
            }
        }

        // A worker that panicked never reported its class.
        for &class in classes {
            outcome
                .entry(class)
                .or_insert_with(|| Err(SyncError::Worker(format!("{class} worker did not finish"))));
        }
        outcome
    }

    /// Runs one pass for every entity class concurrently.
    pub async fn sync_all(&self) -> SyncOutcome {
        self.sync_classes(&EntityClass::ALL).await
    }

    /// Repeats [`sync_classes`](Self::sync_classes) every `interval` until the
    /// coordinator is shut down. Failed classes are retried on the next tick.
    ///
    /// Returns the number of completed rounds.
    pub async fn run_periodic(&self, classes: &[EntityClass], interval: Duration) -> u64 {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut rounds = 0;

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let outcome = self.sync_classes(classes).await;
                    rounds += 1;
                    let failed = outcome.values().filter(|r| r.is_err()).count();
                    debug!("Sync round {} done, {} of {} classes failed", rounds, failed, outcome.len());
                }
            }
        }

        info!("Periodic sync stopped after {} rounds", rounds);
        rounds
    }
}
