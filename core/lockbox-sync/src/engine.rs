//! Reconciliation engine.
//!
//! One call to [`SyncEngine::reconcile`] is one self-contained merge pass for
//! one entity class. The engine keeps no state between passes: every pass
//! re-reads both sides' summaries, derives a [`SyncPlan`] and executes it in
//! batches. A failed pass is retried by simply running it again.

use crate::adapter::{LocalStore, RemoteStore};
use crate::error::{SyncError, SyncResult};
use crate::protocol::MAX_BATCH_SIZE;
use lockbox_types::{
    ClientEntry, ClientSummary, EntityClass, Entry, LocalId, RemoteId, ServerSummary,
};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Configuration for the sync engine.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum entries per transfer batch.
    pub batch_size: usize,
    /// Timeout for a single adapter read (ms).
    pub timeout_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: MAX_BATCH_SIZE,
            timeout_ms: 30_000,
        }
    }
}

/// A client entry paired with its server counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pairing {
    pub local: LocalId,
    pub remote: RemoteId,
    /// The pair was found by name and the link still has to be recorded.
    pub newly_linked: bool,
}

/// The transfers one pass has to perform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    /// Server entries to copy into the vault.
    pub pull: Vec<RemoteId>,
    /// Client entries the server has never seen.
    pub push: Vec<LocalId>,
    /// Client entries that replace a known server row in place.
    pub overwrite: Vec<Pairing>,
    /// Name matches already in sync; only the link is recorded.
    pub adopt: Vec<Pairing>,
}

impl SyncPlan {
    /// Returns true if the pass has nothing to do.
    pub fn is_empty(&self) -> bool {
        self.pull.is_empty()
            && self.push.is_empty()
            && self.overwrite.is_empty()
            && self.adopt.is_empty()
    }

    /// Number of entries sent to the server.
    pub fn push_count(&self) -> usize {
        self.push.len() + self.overwrite.len()
    }

    /// Number of entries copied from the server.
    pub fn pull_count(&self) -> usize {
        self.pull.len()
    }
}

/// Derives the transfers needed to bring both sides in line.
///
/// Linked client entries are matched to server rows by link first. Server
/// rows left over are matched by name to client entries that have no usable
/// link. Each client entry is matched at most once. The newer `updated_at`
/// wins; equal timestamps mean the pair is already in sync, whatever the
/// bytes say.
///
/// A link naming a row the server does not list (another account, or a
/// re-seeded server) is stale: the entry is treated as never linked. Unmatched
/// server rows are pulled. Client entries without a usable link left over are
/// pushed, in client order, and re-linked.
pub fn plan(server: &[ServerSummary], client: &[ClientSummary]) -> SyncPlan {
    let server_ids: HashSet<RemoteId> = server.iter().map(|s| s.id).collect();
    let mut by_link: HashMap<RemoteId, &ClientSummary> = HashMap::new();
    let mut by_name: HashMap<&str, &ClientSummary> = HashMap::new();
    let mut unlinked: Vec<&ClientSummary> = Vec::new();
    for summary in client {
        match summary.remote_link {
            Some(link) if server_ids.contains(&link) => {
                by_link.insert(link, summary);
            }
            stale => {
                if let Some(link) = stale {
                    debug!(
                        "Entry {} links to missing server row {}, relinking",
                        summary.id, link
                    );
                }
                by_name.insert(summary.name.as_str(), summary);
                unlinked.push(summary);
            }
        }
    }

    let mut plan = SyncPlan::default();
    let mut consumed: HashSet<LocalId> = HashSet::new();

    for s in server {
        let (c, newly_linked) = match by_link.remove(&s.id) {
            Some(c) => (c, false),
            None => match by_name.remove(s.name.as_str()) {
                Some(c) => (c, true),
                None => {
                    plan.pull.push(s.id);
                    continue;
                }
            },
        };
        consumed.insert(c.id);

        let pairing = Pairing {
            local: c.id,
            remote: s.id,
            newly_linked,
        };
        if s.updated_at.is_after(&c.updated_at) {
            plan.pull.push(s.id);
        } else if c.updated_at.is_after(&s.updated_at) {
            plan.overwrite.push(pairing);
        } else if newly_linked {
            plan.adopt.push(pairing);
        }
    }

    for c in unlinked {
        if !consumed.contains(&c.id) {
            plan.push.push(c.id);
        }
    }

    plan
}

/// Outcome of one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub class: EntityClass,
    /// Entries copied from the server.
    pub pulled: usize,
    /// Entries inserted on the server for the first time.
    pub pushed: usize,
    /// Server rows replaced by newer client versions.
    pub overwritten: usize,
    /// Remote links recorded in the vault.
    pub linked: usize,
}

impl SyncReport {
    fn new(class: EntityClass) -> Self {
        Self {
            class,
            pulled: 0,
            pushed: 0,
            overwritten: 0,
            linked: 0,
        }
    }

    /// Returns true if the pass transferred nothing.
    pub fn is_noop(&self) -> bool {
        self.pulled == 0 && self.pushed == 0 && self.overwritten == 0 && self.linked == 0
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: pulled {}, pushed {}, overwritten {}, linked {}",
            self.class, self.pulled, self.pushed, self.overwritten, self.linked
        )
    }
}

/// The reconciliation engine.
///
/// Holds configuration only, so it is cheap to clone into per-class workers.
#[derive(Debug, Clone, Default)]
pub struct SyncEngine {
    config: SyncConfig,
}

impl SyncEngine {
    /// Creates a new sync engine.
    pub fn new(config: SyncConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the batch size, clamped to `1..=MAX_BATCH_SIZE` so that no
    /// chunk exceeds what the server accepts.
    pub fn batch_size(&self) -> usize {
        self.config.batch_size.clamp(1, MAX_BATCH_SIZE)
    }

    /// Runs one merge pass for `class`.
    ///
    /// An empty server is seeded with every client entry; an empty vault is
    /// seeded with every server entry. Otherwise the pass follows [`plan`].
    ///
    /// Transfers run in chunks of [`batch_size`](Self::batch_size). A chunk is
    /// fetched, written and link-recorded before the next one starts, so a
    /// pass aborted by an error or by `cancel` leaves only whole chunks behind.
    pub async fn reconcile(
        &self,
        class: EntityClass,
        remote: &dyn RemoteStore,
        local: &dyn LocalStore,
        cancel: &CancellationToken,
    ) -> SyncResult<SyncReport> {
        let mut report = SyncReport::new(class);

        let server = self.read(cancel, remote.summaries(class)).await?;
        if server.is_empty() {
            let entries = self.read(cancel, local.all_entries(class)).await?;
            if !entries.is_empty() {
                debug!("Server has no {} entries, seeding {}", class, entries.len());
                self.insert_remote(class, remote, local, cancel, entries, &mut report)
                    .await?;
            }
            return Ok(finish(report));
        }

        let client = self.read(cancel, local.summaries(class)).await?;
        if client.is_empty() {
            let entries = self.read(cancel, remote.all_entries(class)).await?;
            debug!("Vault has no {} entries, seeding {}", class, entries.len());
            for chunk in entries.chunks(self.batch_size()) {
                checkpoint(cancel)?;
                local.insert_entries(class, chunk.to_vec()).await?;
                report.pulled += chunk.len();
            }
            return Ok(finish(report));
        }

        let plan = plan(&server, &client);
        debug!(
            "{} plan: pull {}, push {}, overwrite {}, adopt {}",
            class,
            plan.pull.len(),
            plan.push.len(),
            plan.overwrite.len(),
            plan.adopt.len()
        );

        for chunk in plan.push.chunks(self.batch_size()) {
            let entries = self.fetch_local(class, local, cancel, chunk).await?;
            self.insert_remote(class, remote, local, cancel, entries, &mut report)
                .await?;
        }

        for chunk in plan.overwrite.chunks(self.batch_size()) {
            self.overwrite_remote(class, remote, local, cancel, chunk, &mut report)
                .await?;
        }

        for chunk in plan.adopt.chunks(self.batch_size()) {
            checkpoint(cancel)?;
            let links: Vec<_> = chunk.iter().map(|p| (p.local, p.remote)).collect();
            write_links(class, local, &links).await?;
            report.linked += links.len();
        }

        for chunk in plan.pull.chunks(self.batch_size()) {
            let entries = self
                .read(cancel, remote.entries_by_ids(class, chunk))
                .await?;
            check_fetched("remote entries_by_ids", chunk, &entries)?;
            checkpoint(cancel)?;
            local.insert_entries(class, entries).await?;
            report.pulled += chunk.len();
        }

        Ok(finish(report))
    }

    async fn fetch_local(
        &self,
        class: EntityClass,
        local: &dyn LocalStore,
        cancel: &CancellationToken,
        ids: &[LocalId],
    ) -> SyncResult<Vec<ClientEntry>> {
        let entries = self.read(cancel, local.entries_by_ids(class, ids)).await?;
        check_fetched("local entries_by_ids", ids, &entries)?;
        Ok(entries)
    }

    /// Inserts client entries on the server in chunks and links every one of
    /// them to its new row.
    async fn insert_remote(
        &self,
        class: EntityClass,
        remote: &dyn RemoteStore,
        local: &dyn LocalStore,
        cancel: &CancellationToken,
        entries: Vec<ClientEntry>,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        for chunk in entries.chunks(self.batch_size()) {
            checkpoint(cancel)?;
            let local_ids: Vec<LocalId> = chunk.iter().map(|e| e.id).collect();
            let records = chunk.iter().cloned().map(ClientEntry::into_new_entry).collect();

            let remote_ids = remote.insert_entries(class, records).await?;
            if remote_ids.len() != local_ids.len() {
                return Err(SyncError::BatchMismatch {
                    operation: "remote insert_entries",
                    expected: local_ids.len(),
                    actual: remote_ids.len(),
                });
            }
            report.pushed += chunk.len();

            let links: Vec<_> = local_ids.into_iter().zip(remote_ids).collect();
            write_links(class, local, &links).await?;
            report.linked += links.len();
        }
        Ok(())
    }

    /// Replaces known server rows with newer client versions, then records
    /// any links that were found by name.
    async fn overwrite_remote(
        &self,
        class: EntityClass,
        remote: &dyn RemoteStore,
        local: &dyn LocalStore,
        cancel: &CancellationToken,
        pairings: &[Pairing],
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        let ids: Vec<LocalId> = pairings.iter().map(|p| p.local).collect();
        let entries = self.fetch_local(class, local, cancel, &ids).await?;

        let targets: HashMap<LocalId, RemoteId> =
            pairings.iter().map(|p| (p.local, p.remote)).collect();
        let mut updates = Vec::with_capacity(entries.len());
        for entry in entries {
            let target = targets
                .get(&entry.id)
                .copied()
                .ok_or_else(|| SyncError::Protocol(format!("unrequested entry {}", entry.id)))?;
            updates.push(entry.into_server_entry(target));
        }

        checkpoint(cancel)?;
        remote.update_entries(class, updates).await?;
        report.overwritten += pairings.len();

        let links: Vec<_> = pairings
            .iter()
            .filter(|p| p.newly_linked)
            .map(|p| (p.local, p.remote))
            .collect();
        if !links.is_empty() {
            write_links(class, local, &links).await?;
            report.linked += links.len();
        }
        Ok(())
    }

    /// Awaits an adapter read, giving up on cancellation or timeout.
    async fn read<T>(
        &self,
        cancel: &CancellationToken,
        call: impl Future<Output = SyncResult<T>>,
    ) -> SyncResult<T> {
        checkpoint(cancel)?;
        let limit = Duration::from_millis(self.config.timeout_ms);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SyncError::Cancelled),
            result = tokio::time::timeout(limit, call) => {
                result.map_err(|_| SyncError::Timeout)?
            }
        }
    }
}

fn checkpoint(cancel: &CancellationToken) -> SyncResult<()> {
    if cancel.is_cancelled() {
        return Err(SyncError::Cancelled);
    }
    Ok(())
}

async fn write_links(
    class: EntityClass,
    local: &dyn LocalStore,
    links: &[(LocalId, RemoteId)],
) -> SyncResult<()> {
    local
        .set_remote_links(class, links)
        .await
        .map_err(|e| SyncError::WriteBack(e.to_string()))
}

/// Rejects a fetch answer that is not exactly the requested id set.
fn check_fetched<I: Copy + Eq + Hash>(
    operation: &'static str,
    requested: &[I],
    entries: &[Entry<I>],
) -> SyncResult<()> {
    let returned: HashSet<I> = entries.iter().map(|e| e.id).collect();
    let matches = entries.len() == requested.len()
        && returned.len() == requested.len()
        && requested.iter().all(|id| returned.contains(id));
    if !matches {
        return Err(SyncError::BatchMismatch {
            operation,
            expected: requested.len(),
            actual: entries.len(),
        });
    }
    Ok(())
}

fn finish(report: SyncReport) -> SyncReport {
    if report.is_noop() {
        debug!("{} already in sync", report.class);
    } else {
        info!("Synced {}", report);
    }
    report
}
