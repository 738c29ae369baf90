use lockbox_storage::VaultStore;
use lockbox_sync::adapter::mock::MockRemoteStore;
use lockbox_sync::{LocalStore, SyncConfig, SyncEngine};
use lockbox_types::{EntityClass, Entry, LocalId, RemoteId, ServerEntry, Timestamp};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const CLASS: EntityClass = EntityClass::Texts;

fn server_entry(id: i64, name: &str, millis: i64) -> ServerEntry {
    Entry {
        id: RemoteId::new(id),
        name: name.to_string(),
        data: name.as_bytes().to_vec(),
        created_at: Timestamp::from_millis(millis),
        updated_at: Timestamp::from_millis(millis),
        deleted: false,
        remote_link: None,
    }
}

fn make_vault() -> VaultStore {
    VaultStore::open_in_memory().unwrap()
}

#[tokio::test]
async fn summaries_include_tombstones() {
    let vault = make_vault();
    vault.put(CLASS, "kept", b"1").unwrap();
    vault.put(CLASS, "dropped", b"2").unwrap();
    vault.remove(CLASS, "dropped").unwrap();

    let summaries = LocalStore::summaries(&vault, CLASS).await.unwrap();

    let names: Vec<&str> = summaries.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["kept", "dropped"]);
    assert!(summaries.iter().all(|s| s.remote_link.is_none()));
}

#[tokio::test]
async fn entries_by_ids_returns_requested_rows() {
    let vault = make_vault();
    let a = vault.put(CLASS, "a", b"1").unwrap();
    vault.put(CLASS, "b", b"2").unwrap();
    let c = vault.put(CLASS, "c", b"3").unwrap();

    let entries = LocalStore::entries_by_ids(&vault, CLASS, &[c.id, a.id])
        .await
        .unwrap();

    let mut names: Vec<String> = entries.into_iter().map(|e| e.name).collect();
    names.sort();
    assert_eq!(names, vec!["a", "c"]);
}

#[tokio::test]
async fn insert_entries_stamps_remote_link() {
    let vault = make_vault();

    LocalStore::insert_entries(&vault, CLASS, vec![server_entry(7, "fresh", 100)])
        .await
        .unwrap();

    let stored = vault.get(CLASS, "fresh").unwrap().unwrap();
    assert_eq!(stored.remote_link, Some(RemoteId::new(7)));
    assert_eq!(stored.updated_at, Timestamp::from_millis(100));
}

#[tokio::test]
async fn insert_entries_replaces_same_name_instead_of_duplicating() {
    let vault = make_vault();
    let local = vault.put(CLASS, "note", b"old").unwrap();

    LocalStore::insert_entries(&vault, CLASS, vec![server_entry(3, "note", i64::MAX / 2)])
        .await
        .unwrap();

    let all = LocalStore::all_entries(&vault, CLASS).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, local.id);
    assert_eq!(all[0].data, b"note".to_vec());
    assert_eq!(all[0].remote_link, Some(RemoteId::new(3)));
}

#[tokio::test]
async fn set_remote_links_is_idempotent() {
    let vault = make_vault();
    let entry = vault.put(CLASS, "a", b"1").unwrap();
    let links = [(entry.id, RemoteId::new(11))];

    LocalStore::set_remote_links(&vault, CLASS, &links).await.unwrap();
    let first = vault.get(CLASS, "a").unwrap();
    LocalStore::set_remote_links(&vault, CLASS, &links).await.unwrap();
    let second = vault.get(CLASS, "a").unwrap();

    assert_eq!(first, second);
    assert_eq!(second.unwrap().remote_link, Some(RemoteId::new(11)));
}

#[tokio::test]
async fn set_remote_links_unknown_id_fails() {
    let vault = make_vault();

    let result =
        LocalStore::set_remote_links(&vault, CLASS, &[(LocalId::new(404), RemoteId::new(1))])
            .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn vault_on_disk_syncs_and_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vault.db");
    let remote = MockRemoteStore::new().with_entries(CLASS, vec![server_entry(1, "from-server", 50)]);
    let engine = SyncEngine::new(SyncConfig::default());

    {
        let vault = VaultStore::open(&path).unwrap();
        vault.put(CLASS, "from-vault", b"secret").unwrap();

        let report = engine
            .reconcile(CLASS, &remote, &vault, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.pulled, 1);
        assert_eq!(report.pushed, 1);
        assert_eq!(report.linked, 1);
    }

    let vault = VaultStore::open(&path).unwrap();
    let entries = vault.list(CLASS).unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.remote_link.is_some()));

    let again = engine
        .reconcile(CLASS, &remote, &vault, &CancellationToken::new())
        .await
        .unwrap();
    assert!(again.is_noop());
}

#[tokio::test]
async fn local_removal_reaches_server_as_tombstone() {
    let vault = make_vault();
    let remote = MockRemoteStore::new();
    let engine = SyncEngine::new(SyncConfig::default());
    let cancel = CancellationToken::new();

    vault.put(CLASS, "doomed", b"bytes").unwrap();
    engine.reconcile(CLASS, &remote, &vault, &cancel).await.unwrap();

    vault.remove(CLASS, "doomed").unwrap();
    let report = engine.reconcile(CLASS, &remote, &vault, &cancel).await.unwrap();

    assert_eq!(report.overwritten, 1);
    let rows = remote.entries(CLASS);
    assert_eq!(rows.len(), 1);
    assert!(rows[0].deleted);
}
