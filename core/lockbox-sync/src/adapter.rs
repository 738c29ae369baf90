//! Store adapter abstraction.
//!
//! The reconciliation engine never touches a database or a socket directly.
//! It drives two adapters: the local vault and the remote server. Any backend
//! that honours these contracts can take part in a sync pass.
//!
//! Contracts every implementation must keep:
//! - `summaries` never transfers entry data.
//! - `entries_by_ids` returns exactly one entry per requested id. Order does
//!   not matter; the engine matches by id.
//! - Every write is atomic per call: a batch is committed completely or not
//!   at all.
//! - `set_remote_links` is idempotent.

use crate::error::SyncResult;
use async_trait::async_trait;
use lockbox_types::{
    ClientEntry, ClientSummary, EntityClass, LocalId, NewEntry, RemoteId, ServerEntry,
    ServerSummary,
};

/// The client-side vault as seen by the engine.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Returns summaries of every entry of the class, tombstones included.
    async fn summaries(&self, class: EntityClass) -> SyncResult<Vec<ClientSummary>>;

    /// Returns every entry of the class. Only used to seed an empty server.
    async fn all_entries(&self, class: EntityClass) -> SyncResult<Vec<ClientEntry>>;

    /// Returns the entries with the given ids.
    async fn entries_by_ids(
        &self,
        class: EntityClass,
        ids: &[LocalId],
    ) -> SyncResult<Vec<ClientEntry>>;

    /// Stores entries pulled from the server. The store assigns its own ids
    /// and records each entry's server id as its remote link.
    async fn insert_entries(&self, class: EntityClass, entries: Vec<ServerEntry>)
    -> SyncResult<()>;

    /// Records `(local, remote)` pairings.
    async fn set_remote_links(
        &self,
        class: EntityClass,
        links: &[(LocalId, RemoteId)],
    ) -> SyncResult<()>;
}

/// The server-side repository as seen by the engine.
///
/// Implementations are scoped to one authenticated account; the engine never
/// sees account identity.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Returns summaries of every entry of the class, tombstones included.
    async fn summaries(&self, class: EntityClass) -> SyncResult<Vec<ServerSummary>>;

    /// Returns every entry of the class. Only used to seed an empty client.
    async fn all_entries(&self, class: EntityClass) -> SyncResult<Vec<ServerEntry>>;

    /// Returns the entries with the given ids.
    async fn entries_by_ids(
        &self,
        class: EntityClass,
        ids: &[RemoteId],
    ) -> SyncResult<Vec<ServerEntry>>;

    /// Inserts entries for the first time, returning one assigned id per
    /// entry in input order.
    async fn insert_entries(
        &self,
        class: EntityClass,
        entries: Vec<NewEntry>,
    ) -> SyncResult<Vec<RemoteId>>;

    /// Overwrites existing entries, addressed by their server id.
    async fn update_entries(&self, class: EntityClass, entries: Vec<ServerEntry>)
    -> SyncResult<()>;
}

/// In-memory adapters for testing.
///
/// Both mocks record every call they receive and can be told to fail a
/// named operation (`"summaries"`, `"all_entries"`, `"entries_by_ids"`,
/// `"insert_entries"`, `"update_entries"`, `"set_remote_links"`).
pub mod mock {
    use super::*;
    use crate::error::SyncError;
    use lockbox_types::Entry;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    /// A call received by [`MockLocalStore`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum LocalCall {
        Summaries,
        AllEntries,
        EntriesByIds(Vec<LocalId>),
        Insert(Vec<RemoteId>),
        SetRemoteLinks(Vec<(LocalId, RemoteId)>),
    }

    /// A call received by [`MockRemoteStore`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum RemoteCall {
        Summaries,
        AllEntries,
        EntriesByIds(Vec<RemoteId>),
        Insert(Vec<String>),
        Update(Vec<RemoteId>),
    }

    #[derive(Debug, Default)]
    struct LocalState {
        entries: HashMap<EntityClass, Vec<ClientEntry>>,
        next_id: i64,
        calls: Vec<LocalCall>,
        failing: HashSet<&'static str>,
    }

    /// An in-memory client vault.
    #[derive(Debug, Default)]
    pub struct MockLocalStore {
        state: Mutex<LocalState>,
    }

    impl MockLocalStore {
        /// Creates an empty vault.
        pub fn new() -> Self {
            Self::default()
        }

        /// Seeds entries of a class. Later local ids continue after the
        /// largest seeded id.
        pub fn with_entries(self, class: EntityClass, entries: Vec<ClientEntry>) -> Self {
            {
                let mut state = self.state.lock().unwrap();
                let max = entries.iter().map(|e| e.id.get()).max().unwrap_or(0);
                state.next_id = state.next_id.max(max);
                state.entries.entry(class).or_default().extend(entries);
            }
            self
        }

        /// Makes the named operation fail with a storage error.
        pub fn fail_on(&self, operation: &'static str) {
            self.state.lock().unwrap().failing.insert(operation);
        }

        /// Snapshot of the entries of a class, ordered by id.
        pub fn entries(&self, class: EntityClass) -> Vec<ClientEntry> {
            let mut entries = self
                .state
                .lock()
                .unwrap()
                .entries
                .get(&class)
                .cloned()
                .unwrap_or_default();
            entries.sort_by_key(|e| e.id);
            entries
        }

        /// Every call received so far.
        pub fn calls(&self) -> Vec<LocalCall> {
            self.state.lock().unwrap().calls.clone()
        }

        fn enter(&self, operation: &'static str, call: LocalCall) -> SyncResult<()> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(call);
            if state.failing.contains(operation) {
                return Err(SyncError::Storage(format!("{operation} unavailable")));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl LocalStore for MockLocalStore {
        async fn summaries(&self, class: EntityClass) -> SyncResult<Vec<ClientSummary>> {
            self.enter("summaries", LocalCall::Summaries)?;
            Ok(self.entries(class).iter().map(Entry::summary).collect())
        }

        async fn all_entries(&self, class: EntityClass) -> SyncResult<Vec<ClientEntry>> {
            self.enter("all_entries", LocalCall::AllEntries)?;
            Ok(self.entries(class))
        }

        async fn entries_by_ids(
            &self,
            class: EntityClass,
            ids: &[LocalId],
        ) -> SyncResult<Vec<ClientEntry>> {
            self.enter("entries_by_ids", LocalCall::EntriesByIds(ids.to_vec()))?;
            Ok(self
                .entries(class)
                .into_iter()
                .filter(|e| ids.contains(&e.id))
                .collect())
        }

        async fn insert_entries(
            &self,
            class: EntityClass,
            entries: Vec<ServerEntry>,
        ) -> SyncResult<()> {
            self.enter(
                "insert_entries",
                LocalCall::Insert(entries.iter().map(|e| e.id).collect()),
            )?;
            let mut state = self.state.lock().unwrap();
            for incoming in entries {
                state.next_id += 1;
                let fresh_id = LocalId::new(state.next_id);
                let rows = state.entries.entry(class).or_default();
                let position = rows
                    .iter()
                    .position(|e| e.remote_link == Some(incoming.id))
                    .or_else(|| rows.iter().position(|e| e.name == incoming.name));
                let id = position.map_or(fresh_id, |i| rows[i].id);
                let row = Entry {
                    id,
                    name: incoming.name,
                    data: incoming.data,
                    created_at: incoming.created_at,
                    updated_at: incoming.updated_at,
                    deleted: incoming.deleted,
                    remote_link: Some(incoming.id),
                };
                match position {
                    Some(i) => rows[i] = row,
                    None => rows.push(row),
                }
            }
            Ok(())
        }

        async fn set_remote_links(
            &self,
            class: EntityClass,
            links: &[(LocalId, RemoteId)],
        ) -> SyncResult<()> {
            self.enter("set_remote_links", LocalCall::SetRemoteLinks(links.to_vec()))?;
            let mut state = self.state.lock().unwrap();
            let rows = state.entries.entry(class).or_default();
            for (local, remote) in links {
                let row = rows
                    .iter_mut()
                    .find(|e| e.id == *local)
                    .ok_or_else(|| SyncError::Storage(format!("no local entry {local}")))?;
                row.remote_link = Some(*remote);
            }
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct RemoteState {
        entries: HashMap<EntityClass, Vec<ServerEntry>>,
        next_id: i64,
        calls: Vec<RemoteCall>,
        failing: HashSet<&'static str>,
        short_inserts: bool,
    }

    /// An in-memory server scoped to one account.
    #[derive(Debug, Default)]
    pub struct MockRemoteStore {
        state: Mutex<RemoteState>,
    }

    impl MockRemoteStore {
        /// Creates an empty server.
        pub fn new() -> Self {
            Self::default()
        }

        /// Seeds entries of a class. Later server ids continue after the
        /// largest seeded id.
        pub fn with_entries(self, class: EntityClass, entries: Vec<ServerEntry>) -> Self {
            {
                let mut state = self.state.lock().unwrap();
                let max = entries.iter().map(|e| e.id.get()).max().unwrap_or(0);
                state.next_id = state.next_id.max(max);
                state.entries.entry(class).or_default().extend(entries);
            }
            self
        }

        /// Makes the named operation fail with a network error.
        pub fn fail_on(&self, operation: &'static str) {
            self.state.lock().unwrap().failing.insert(operation);
        }

        /// Makes inserts commit every entry but return one id too few.
        pub fn return_short_inserts(&self) {
            self.state.lock().unwrap().short_inserts = true;
        }

        /// Snapshot of the entries of a class, ordered by id.
        pub fn entries(&self, class: EntityClass) -> Vec<ServerEntry> {
            let mut entries = self
                .state
                .lock()
                .unwrap()
                .entries
                .get(&class)
                .cloned()
                .unwrap_or_default();
            entries.sort_by_key(|e| e.id);
            entries
        }

        /// Every call received so far.
        pub fn calls(&self) -> Vec<RemoteCall> {
            self.state.lock().unwrap().calls.clone()
        }

        fn enter(&self, operation: &'static str, call: RemoteCall) -> SyncResult<()> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(call);
            if state.failing.contains(operation) {
                return Err(SyncError::Network(format!("{operation} unavailable")));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RemoteStore for MockRemoteStore {
        async fn summaries(&self, class: EntityClass) -> SyncResult<Vec<ServerSummary>> {
            self.enter("summaries", RemoteCall::Summaries)?;
            Ok(self.entries(class).iter().map(Entry::summary).collect())
        }

        async fn all_entries(&self, class: EntityClass) -> SyncResult<Vec<ServerEntry>> {
            self.enter("all_entries", RemoteCall::AllEntries)?;
            Ok(self.entries(class))
        }

        async fn entries_by_ids(
            &self,
            class: EntityClass,
            ids: &[RemoteId],
        ) -> SyncResult<Vec<ServerEntry>> {
            self.enter("entries_by_ids", RemoteCall::EntriesByIds(ids.to_vec()))?;
            Ok(self
                .entries(class)
                .into_iter()
                .filter(|e| ids.contains(&e.id))
                .collect())
        }

        async fn insert_entries(
            &self,
            class: EntityClass,
            entries: Vec<NewEntry>,
        ) -> SyncResult<Vec<RemoteId>> {
            self.enter(
                "insert_entries",
                RemoteCall::Insert(entries.iter().map(|e| e.name.clone()).collect()),
            )?;
            let mut state = self.state.lock().unwrap();
            let mut ids = Vec::with_capacity(entries.len());
            for entry in entries {
                state.next_id += 1;
                let id = RemoteId::new(state.next_id);
                state
                    .entries
                    .entry(class)
                    .or_default()
                    .push(entry.with_id(id));
                ids.push(id);
            }
            if state.short_inserts {
                ids.pop();
            }
            Ok(ids)
        }

        async fn update_entries(
            &self,
            class: EntityClass,
            entries: Vec<ServerEntry>,
        ) -> SyncResult<()> {
            self.enter(
                "update_entries",
                RemoteCall::Update(entries.iter().map(|e| e.id).collect()),
            )?;
            let mut state = self.state.lock().unwrap();
            let rows = state.entries.entry(class).or_default();
            for entry in &entries {
                if !rows.iter().any(|row| row.id == entry.id) {
                    return Err(SyncError::NotFound(format!("{class}/{}", entry.id)));
                }
            }
            for entry in entries {
                if let Some(row) = rows.iter_mut().find(|row| row.id == entry.id) {
                    *row = entry;
                }
            }
            Ok(())
        }
    }
}
