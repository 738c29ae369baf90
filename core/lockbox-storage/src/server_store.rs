//! Server-side, account-scoped entry store.

use crate::error::{StorageError, StorageResult};
use crate::{open_sqlite, placeholders, schema};
use lockbox_types::{
    EntityClass, Entry, EntrySummary, NewEntry, RemoteId, ServerEntry, ServerSummary, Timestamp,
};
use rand::RngCore;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params, params_from_iter};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

const ENTRY_COLUMNS: &str = "id, name, data, created_at, updated_at, deleted";

/// Identifier of an account on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccountId(i64);

impl AccountId {
    /// Wraps a raw account row id.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw account row id.
    #[must_use]
    pub const fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persistent server store backed by SQLite.
///
/// Every entry operation takes the [`AccountId`] it is scoped to; rows of
/// other accounts are never read or written.
#[derive(Clone)]
pub struct ServerStore {
    conn: Arc<Mutex<Connection>>,
}

impl ServerStore {
    /// Opens (or creates) a server store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let conn = open_sqlite(path.as_ref())?;
        Self::with_connection(conn)
    }

    /// Opens an in-memory server store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> StorageResult<Self> {
        conn.execute_batch(&schema::server_schema())?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    // ── Accounts ─────────────────────────────────────────────────

    /// Creates an account and returns its id with a freshly minted bearer token.
    ///
    /// Only the SHA-256 of the token is stored; the token itself cannot be
    /// recovered later.
    pub fn create_account(&self, name: &str) -> StorageResult<(AccountId, String)> {
        let mut raw = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut raw);
        let token = hex::encode(raw);

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO accounts (name, token_hash, created_at) VALUES (?1, ?2, ?3)",
            params![name, hash_token(&token), Timestamp::now().as_millis()],
        )
        .map_err(|e| StorageError::from_write(e, format!("account {name}")))?;
        let id = AccountId(conn.last_insert_rowid());

        info!("Created account '{}' ({})", name, id);
        Ok((id, token))
    }

    /// Resolves a bearer token to its account.
    pub fn account_for_token(&self, token: &str) -> StorageResult<Option<AccountId>> {
        let conn = self.conn()?;
        let id = conn
            .query_row(
                "SELECT id FROM accounts WHERE token_hash = ?1",
                [hash_token(token)],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(id.map(AccountId))
    }

    // ── Entries ──────────────────────────────────────────────────

    /// Returns summaries of every entry of the account, tombstones included.
    pub fn summaries(
        &self,
        account: AccountId,
        class: EntityClass,
    ) -> StorageResult<Vec<ServerSummary>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT id, name, updated_at FROM {} WHERE account_id = ?1 ORDER BY id",
            class.table_name()
        ))?;
        let summaries = stmt
            .query_map([account.0], |row| {
                Ok(EntrySummary {
                    id: RemoteId::new(row.get(0)?),
                    name: row.get(1)?,
                    updated_at: Timestamp::from_millis(row.get(2)?),
                    remote_link: None,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(summaries)
    }

    /// Returns every entry of the account, tombstones included.
    pub fn all_entries(
        &self,
        account: AccountId,
        class: EntityClass,
    ) -> StorageResult<Vec<ServerEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM {} WHERE account_id = ?1 ORDER BY id",
            class.table_name()
        ))?;
        let entries = stmt
            .query_map([account.0], server_entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Returns the account's entries with the given ids. Ids belonging to
    /// other accounts or not existing are skipped.
    pub fn entries_by_ids(
        &self,
        account: AccountId,
        class: EntityClass,
        ids: &[RemoteId],
    ) -> StorageResult<Vec<ServerEntry>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM {} WHERE account_id = ? AND id IN ({}) ORDER BY id",
            class.table_name(),
            placeholders(ids.len())
        ))?;
        let bindings = std::iter::once(Value::Integer(account.0))
            .chain(ids.iter().map(|id| Value::Integer(id.get())));
        let entries = stmt
            .query_map(params_from_iter(bindings), server_entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Inserts entries in one transaction and returns one id per entry, in
    /// input order.
    ///
    /// An entry whose name already exists for the account resolves to that
    /// row: the newer of the two versions (by `updated_at`) is kept and the
    /// existing id is returned.
    pub fn insert_entries(
        &self,
        account: AccountId,
        class: EntityClass,
        entries: &[NewEntry],
    ) -> StorageResult<Vec<RemoteId>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let table = class.table_name();
        let mut ids = Vec::with_capacity(entries.len());

        for entry in entries {
            check_name(class, &entry.name)?;
            let existing = tx
                .query_row(
                    &format!("SELECT id, updated_at FROM {table} WHERE account_id = ?1 AND name = ?2"),
                    params![account.0, entry.name],
                    |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
                )
                .optional()?;

            let id = match existing {
                Some((id, updated_at)) => {
                    if entry.updated_at.is_after(&Timestamp::from_millis(updated_at)) {
                        overwrite(&tx, account, class, id, entry)?;
                    }
                    id
                }
                None => {
                    tx.execute(
                        &format!(
                            "INSERT INTO {table} (account_id, name, data, created_at, updated_at, deleted)
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
                        ),
                        params![
                            account.0,
                            entry.name,
                            entry.data,
                            entry.created_at.as_millis(),
                            entry.updated_at.as_millis(),
                            entry.deleted
                        ],
                    )
                    .map_err(|e| StorageError::from_write(e, format!("{class}/{}", entry.name)))?;
                    tx.last_insert_rowid()
                }
            };
            ids.push(RemoteId::new(id));
        }

        tx.commit()?;
        debug!("Inserted {} {} entries for account {}", ids.len(), class, account);
        Ok(ids)
    }

    /// Overwrites existing entries by id in one transaction.
    ///
    /// A stored version newer than the submitted one is kept. An id that does
    /// not belong to the account fails the whole batch with `NotFound`.
    pub fn update_entries(
        &self,
        account: AccountId,
        class: EntityClass,
        entries: &[ServerEntry],
    ) -> StorageResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let table = class.table_name();

        for entry in entries {
            let stored: Option<i64> = tx
                .query_row(
                    &format!("SELECT updated_at FROM {table} WHERE account_id = ?1 AND id = ?2"),
                    params![account.0, entry.id.get()],
                    |row| row.get(0),
                )
                .optional()?;
            let stored = stored.ok_or_else(|| StorageError::NotFound(format!("{class}/{}", entry.id)))?;
            check_name(class, &entry.name)?;

            if entry.updated_at.is_after(&Timestamp::from_millis(stored)) {
                let record = NewEntry {
                    name: entry.name.clone(),
                    data: entry.data.clone(),
                    created_at: entry.created_at,
                    updated_at: entry.updated_at,
                    deleted: entry.deleted,
                };
                overwrite(&tx, account, class, entry.id.get(), &record)?;
            } else {
                debug!("Kept newer stored {} entry {}", class, entry.id);
            }
        }

        tx.commit()?;
        Ok(())
    }
}

fn check_name(class: EntityClass, name: &str) -> StorageResult<()> {
    if name.is_empty() {
        return Err(StorageError::InvalidData(format!("{class} entry with empty name")));
    }
    Ok(())
}

fn overwrite(
    tx: &Transaction<'_>,
    account: AccountId,
    class: EntityClass,
    id: i64,
    entry: &NewEntry,
) -> StorageResult<()> {
    tx.execute(
        &format!(
            "UPDATE {} SET name = ?1, data = ?2, created_at = ?3, updated_at = ?4, deleted = ?5
             WHERE account_id = ?6 AND id = ?7",
            class.table_name()
        ),
        params![
            entry.name,
            entry.data,
            entry.created_at.as_millis(),
            entry.updated_at.as_millis(),
            entry.deleted,
            account.0,
            id
        ],
    )
    .map_err(|e| StorageError::from_write(e, format!("{class}/{}", entry.name)))?;
    Ok(())
}

fn server_entry_from_row(row: &Row<'_>) -> rusqlite::Result<ServerEntry> {
    Ok(Entry {
        id: RemoteId::new(row.get(0)?),
        name: row.get(1)?,
        data: row.get(2)?,
        created_at: Timestamp::from_millis(row.get(3)?),
        updated_at: Timestamp::from_millis(row.get(4)?),
        deleted: row.get(5)?,
        remote_link: None,
    })
}

fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
