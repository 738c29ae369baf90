//! SQLite storage layer for Lockbox.
//!
//! Two stores share one schema style:
//! - [`VaultStore`] is the client-side vault. Each entry carries a remote link
//!   to its server counterpart once a sync pass has confirmed one.
//! - [`ServerStore`] is the server-side repository. Every row belongs to an
//!   account and every query is scoped to exactly one account.
//!
//! Each entity class lives in its own table (see
//! [`EntityClass::table_name`](lockbox_types::EntityClass::table_name)).
//! Entry data is stored as an opaque blob; encryption happens above this layer.
//!
//! All multi-row writes run inside a single transaction so a batch is either
//! fully committed or not at all.

mod error;
mod schema;
mod server_store;
mod vault_store;

pub use error::{StorageError, StorageResult};
pub use server_store::{AccountId, ServerStore};
pub use vault_store::VaultStore;

use rusqlite::Connection;
use std::path::Path;

/// Opens a SQLite connection with the pragmas both stores rely on.
///
/// Parent directories are created when missing.
pub fn open_sqlite(path: &Path) -> StorageResult<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(path)?;
    configure(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> StorageResult<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    Ok(())
}

/// Builds a `?, ?, ?` placeholder list for an `IN (...)` clause.
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
