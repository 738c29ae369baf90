//! Client-side vault store.

use crate::error::{StorageError, StorageResult};
use crate::{open_sqlite, placeholders, schema};
use lockbox_types::{
    ClientEntry, ClientSummary, EntityClass, Entry, EntrySummary, LocalId, RemoteId, ServerEntry,
    Timestamp,
};
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params, params_from_iter};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

const ENTRY_COLUMNS: &str = "id, name, data, created_at, updated_at, deleted, remote_link";

/// Persistent client vault backed by SQLite.
///
/// Cloning is cheap and shares the underlying connection.
#[derive(Clone)]
pub struct VaultStore {
    conn: Arc<Mutex<Connection>>,
}

impl VaultStore {
    /// Opens (or creates) a vault at the given path.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let conn = open_sqlite(path.as_ref())?;
        Self::with_connection(conn)
    }

    /// Opens an in-memory vault (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StorageResult<Self> {
        conn.execute_batch(&schema::vault_schema())?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    // ── Local edits ──────────────────────────────────────────────

    /// Creates an entry, or replaces the data of the entry with the same name.
    ///
    /// Replacing revives a tombstoned entry and keeps its remote link.
    pub fn put(&self, class: EntityClass, name: &str, data: &[u8]) -> StorageResult<ClientEntry> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let table = class.table_name();

        let entry = match find_by_name(&tx, class, name)? {
            Some(mut entry) => {
                entry.data = data.to_vec();
                entry.deleted = false;
                entry.updated_at = next_modification(entry.updated_at);
                tx.execute(
                    &format!("UPDATE {table} SET data = ?1, deleted = 0, updated_at = ?2 WHERE id = ?3"),
                    params![entry.data, entry.updated_at.as_millis(), entry.id.get()],
                )?;
                entry
            }
            None => {
                let now = Timestamp::now();
                tx.execute(
                    &format!(
                        "INSERT INTO {table} (name, data, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)"
                    ),
                    params![name, data, now.as_millis()],
                )?;
                Entry {
                    id: LocalId::new(tx.last_insert_rowid()),
                    name: name.to_string(),
                    data: data.to_vec(),
                    created_at: now,
                    updated_at: now,
                    deleted: false,
                    remote_link: None,
                }
            }
        };

        tx.commit()?;
        debug!("Stored {} entry '{}' as {}", class, name, entry.id);
        Ok(entry)
    }

    /// Returns a live entry by name.
    pub fn get(&self, class: EntityClass, name: &str) -> StorageResult<Option<ClientEntry>> {
        let conn = self.conn()?;
        let entry = conn
            .query_row(
                &format!(
                    "SELECT {ENTRY_COLUMNS} FROM {} WHERE name = ?1 AND deleted = 0",
                    class.table_name()
                ),
                [name],
                client_entry_from_row,
            )
            .optional()?;
        Ok(entry)
    }

    /// Lists live entries, ordered by name.
    pub fn list(&self, class: EntityClass) -> StorageResult<Vec<ClientEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM {} WHERE deleted = 0 ORDER BY name",
            class.table_name()
        ))?;
        let entries = stmt
            .query_map([], client_entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Tombstones an entry: clears its data and marks it deleted so the
    /// removal propagates on the next sync.
    pub fn remove(&self, class: EntityClass, name: &str) -> StorageResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let entry = find_by_name(&tx, class, name)?
            .filter(|e| !e.deleted)
            .ok_or_else(|| StorageError::NotFound(format!("{class}/{name}")))?;

        tx.execute(
            &format!(
                "UPDATE {} SET data = ?1, deleted = 1, updated_at = ?2 WHERE id = ?3",
                class.table_name()
            ),
            params![Vec::<u8>::new(), next_modification(entry.updated_at).as_millis(), entry.id.get()],
        )?;
        tx.commit()?;
        debug!("Tombstoned {} entry '{}'", class, name);
        Ok(())
    }

    // ── Sync surface ─────────────────────────────────────────────

    /// Returns summaries of every entry, tombstones included.
    pub fn summaries(&self, class: EntityClass) -> StorageResult<Vec<ClientSummary>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT id, name, updated_at, remote_link FROM {} ORDER BY id",
            class.table_name()
        ))?;
        let summaries = stmt
            .query_map([], |row| {
                Ok(EntrySummary {
                    id: LocalId::new(row.get(0)?),
                    name: row.get(1)?,
                    updated_at: Timestamp::from_millis(row.get(2)?),
                    remote_link: RemoteId::link_from_raw(row.get(3)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(summaries)
    }

    /// Returns every entry, tombstones included.
    pub fn all_entries(&self, class: EntityClass) -> StorageResult<Vec<ClientEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM {} ORDER BY id",
            class.table_name()
        ))?;
        let entries = stmt
            .query_map([], client_entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Returns the entries with the given ids. Unknown ids are skipped.
    pub fn entries_by_ids(
        &self,
        class: EntityClass,
        ids: &[LocalId],
    ) -> StorageResult<Vec<ClientEntry>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM {} WHERE id IN ({}) ORDER BY id",
            class.table_name(),
            placeholders(ids.len())
        ))?;
        let entries = stmt
            .query_map(params_from_iter(ids.iter().map(LocalId::get)), client_entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Stores entries pulled from the server in one transaction.
    ///
    /// Each entry replaces the local row linked to the same server id, else
    /// the local row with the same name, else becomes a new row. The server id
    /// becomes the row's remote link. Returns the local id of every entry, in
    /// input order.
    pub fn upsert_remote_entries(
        &self,
        class: EntityClass,
        entries: &[ServerEntry],
    ) -> StorageResult<Vec<LocalId>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let table = class.table_name();
        let mut ids = Vec::with_capacity(entries.len());

        for entry in entries {
            let link = link_value(entry.id)?;
            let existing = match find_id_by_link(&tx, class, entry.id)? {
                Some(id) => Some(id),
                None => find_by_name(&tx, class, &entry.name)?.map(|e| e.id),
            };

            let id = match existing {
                Some(id) => {
                    tx.execute(
                        &format!(
                            "UPDATE {table} SET name = ?1, data = ?2, created_at = ?3, updated_at = ?4,
                             deleted = ?5, remote_link = ?6 WHERE id = ?7"
                        ),
                        params![
                            entry.name,
                            entry.data,
                            entry.created_at.as_millis(),
                            entry.updated_at.as_millis(),
                            entry.deleted,
                            link,
                            id.get()
                        ],
                    )
                    .map_err(|e| StorageError::from_write(e, format!("{class}/{}", entry.name)))?;
                    id
                }
                None => {
                    tx.execute(
                        &format!(
                            "INSERT INTO {table} (name, data, created_at, updated_at, deleted, remote_link)
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
                        ),
                        params![
                            entry.name,
                            entry.data,
                            entry.created_at.as_millis(),
                            entry.updated_at.as_millis(),
                            entry.deleted,
                            link
                        ],
                    )
                    .map_err(|e| StorageError::from_write(e, format!("{class}/{}", entry.name)))?;
                    LocalId::new(tx.last_insert_rowid())
                }
            };
            ids.push(id);
        }

        tx.commit()?;
        debug!("Upserted {} {} entries from server", ids.len(), class);
        Ok(ids)
    }

    /// Records the server counterpart of local entries in one transaction.
    ///
    /// Writing the same pair again leaves the row unchanged.
    pub fn set_remote_links(
        &self,
        class: EntityClass,
        links: &[(LocalId, RemoteId)],
    ) -> StorageResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "UPDATE {} SET remote_link = ?1 WHERE id = ?2",
                class.table_name()
            ))?;
            for (local, remote) in links {
                if stmt.execute(params![link_value(*remote)?, local.get()])? == 0 {
                    return Err(StorageError::NotFound(format!("{class}/{local}")));
                }
            }
        }
        tx.commit()?;
        Ok(())
    }
}

/// Server ids are SQLite rowids; zero would read back as "unlinked".
fn link_value(remote: RemoteId) -> StorageResult<i64> {
    if remote.get() <= 0 {
        return Err(StorageError::InvalidData(format!("remote id {remote}")));
    }
    Ok(remote.get())
}

fn find_by_name(
    tx: &Transaction<'_>,
    class: EntityClass,
    name: &str,
) -> StorageResult<Option<ClientEntry>> {
    let entry = tx
        .query_row(
            &format!("SELECT {ENTRY_COLUMNS} FROM {} WHERE name = ?1", class.table_name()),
            [name],
            client_entry_from_row,
        )
        .optional()?;
    Ok(entry)
}

fn find_id_by_link(
    tx: &Transaction<'_>,
    class: EntityClass,
    remote: RemoteId,
) -> StorageResult<Option<LocalId>> {
    let id = tx
        .query_row(
            &format!("SELECT id FROM {} WHERE remote_link = ?1", class.table_name()),
            [remote.get()],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(id.map(LocalId::new))
}

fn client_entry_from_row(row: &Row<'_>) -> rusqlite::Result<ClientEntry> {
    Ok(Entry {
        id: LocalId::new(row.get(0)?),
        name: row.get(1)?,
        data: row.get(2)?,
        created_at: Timestamp::from_millis(row.get(3)?),
        updated_at: Timestamp::from_millis(row.get(4)?),
        deleted: row.get(5)?,
        remote_link: RemoteId::link_from_raw(row.get(6)?),
    })
}

/// Modification time for a local edit, strictly after the previous one so a
/// fast second edit is never mistaken for "already in sync".
fn next_modification(previous: Timestamp) -> Timestamp {
    let now = Timestamp::now();
    if now.is_after(&previous) {
        now
    } else {
        Timestamp::from_millis(previous.as_millis() + 1)
    }
}
