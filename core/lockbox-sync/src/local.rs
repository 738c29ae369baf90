//! [`LocalStore`] for the SQLite vault.

use crate::adapter::LocalStore;
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use lockbox_storage::{StorageResult, VaultStore};
use lockbox_types::{ClientEntry, ClientSummary, EntityClass, LocalId, RemoteId, ServerEntry};
use tracing::debug;

/// Runs a blocking vault call off the async runtime.
async fn blocking<T, F>(store: &VaultStore, call: F) -> SyncResult<T>
where
    T: Send + 'static,
    F: FnOnce(&VaultStore) -> StorageResult<T> + Send + 'static,
{
    let store = store.clone();
    tokio::task::spawn_blocking(move || call(&store))
        .await
        .map_err(|e| SyncError::Worker(e.to_string()))?
        .map_err(SyncError::from)
}

#[async_trait]
impl LocalStore for VaultStore {
    async fn summaries(&self, class: EntityClass) -> SyncResult<Vec<ClientSummary>> {
        blocking(self, move |store| store.summaries(class)).await
    }

    async fn all_entries(&self, class: EntityClass) -> SyncResult<Vec<ClientEntry>> {
        blocking(self, move |store| store.all_entries(class)).await
    }

    async fn entries_by_ids(
        &self,
        class: EntityClass,
        ids: &[LocalId],
    ) -> SyncResult<Vec<ClientEntry>> {
        let ids = ids.to_vec();
        blocking(self, move |store| store.entries_by_ids(class, &ids)).await
    }

    async fn insert_entries(
        &self,
        class: EntityClass,
        entries: Vec<ServerEntry>,
    ) -> SyncResult<()> {
        let ids = blocking(self, move |store| store.upsert_remote_entries(class, &entries)).await?;
        debug!("Vault stored {} pulled {} entries", ids.len(), class);
        Ok(())
    }

    async fn set_remote_links(
        &self,
        class: EntityClass,
        links: &[(LocalId, RemoteId)],
    ) -> SyncResult<()> {
        let links = links.to_vec();
        blocking(self, move |store| store.set_remote_links(class, &links)).await
    }
}
