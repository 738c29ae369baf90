//! Table definitions.

use lockbox_types::EntityClass;

/// Client vault schema: one table per entity class.
pub(crate) fn vault_schema() -> String {
    EntityClass::ALL
        .iter()
        .map(|class| {
            format!(
                "
                CREATE TABLE IF NOT EXISTS {table} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE,
                    data BLOB NOT NULL,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL,
                    deleted INTEGER NOT NULL DEFAULT 0,
                    remote_link INTEGER NOT NULL DEFAULT 0
                );
                CREATE INDEX IF NOT EXISTS idx_{table}_remote_link ON {table} (remote_link);
                ",
                table = class.table_name()
            )
        })
        .collect()
}

/// Server schema: accounts plus one account-scoped table per entity class.
pub(crate) fn server_schema() -> String {
    let mut sql = String::from(
        "
        CREATE TABLE IF NOT EXISTS accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            token_hash TEXT NOT NULL UNIQUE,
            created_at INTEGER NOT NULL
        );
        ",
    );
    for class in EntityClass::ALL {
        sql.push_str(&format!(
            "
            CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account_id INTEGER NOT NULL REFERENCES accounts(id),
                name TEXT NOT NULL,
                data BLOB NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                deleted INTEGER NOT NULL DEFAULT 0,
                UNIQUE(account_id, name)
            );
            ",
            table = class.table_name()
        ));
    }
    sql
}
