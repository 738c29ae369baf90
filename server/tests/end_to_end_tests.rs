//! Two vaults syncing through a live server.

use lockbox_server::{AppState, build_router};
use lockbox_storage::{ServerStore, VaultStore};
use lockbox_sync::{
    HttpRemoteStore, RemoteConfig, SyncConfig, SyncCoordinator, SyncEngine, SyncError,
    SyncReport,
};
use lockbox_types::EntityClass;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

async fn spawn_server() -> (String, ServerStore) {
    let store = ServerStore::open_in_memory().unwrap();
    let app = build_router(AppState::new(store.clone()));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://127.0.0.1:{}", port), store)
}

fn coordinator(vault: &VaultStore, base: &str, token: &str) -> SyncCoordinator {
    let remote = HttpRemoteStore::new(RemoteConfig::new(base, token)).unwrap();
    SyncCoordinator::new(
        Arc::new(vault.clone()),
        Arc::new(remote),
        SyncEngine::new(SyncConfig::default()),
    )
}

async fn sync(vault: &VaultStore, base: &str, token: &str) -> Vec<SyncReport> {
    coordinator(vault, base, token)
        .sync_all()
        .await
        .into_values()
        .map(|r| r.unwrap())
        .collect()
}

fn names(vault: &VaultStore, class: EntityClass) -> Vec<String> {
    vault.list(class).unwrap().into_iter().map(|e| e.name).collect()
}

async fn tick() {
    // Keeps millisecond timestamps of consecutive edits apart.
    tokio::time::sleep(Duration::from_millis(5)).await;
}

#[tokio::test]
async fn two_vaults_converge() {
    let (base, store) = spawn_server().await;
    let (_, token) = store.create_account("alice").unwrap();
    let dir = TempDir::new().unwrap();
    let laptop = VaultStore::open(dir.path().join("laptop.db")).unwrap();
    let phone = VaultStore::open(dir.path().join("phone.db")).unwrap();

    laptop.put(EntityClass::Passwords, "bank", b"hunter2").unwrap();
    laptop.put(EntityClass::Passwords, "mail", b"letmein").unwrap();
    phone.put(EntityClass::Texts, "diary", b"dear diary").unwrap();

    // Laptop seeds the empty server.
    sync(&laptop, &base, &token).await;
    // Phone pulls passwords and seeds texts.
    sync(&phone, &base, &token).await;
    // Laptop pulls texts.
    sync(&laptop, &base, &token).await;

    for vault in [&laptop, &phone] {
        assert_eq!(names(vault, EntityClass::Passwords), vec!["bank", "mail"]);
        assert_eq!(names(vault, EntityClass::Texts), vec!["diary"]);
    }
    let bank = phone.get(EntityClass::Passwords, "bank").unwrap().unwrap();
    assert_eq!(bank.data, b"hunter2".to_vec());

    // Nothing left to do on either side.
    for vault in [&laptop, &phone] {
        let reports = sync(vault, &base, &token).await;
        assert!(reports.iter().all(SyncReport::is_noop));
    }
}

#[tokio::test]
async fn edits_and_removals_propagate() {
    let (base, store) = spawn_server().await;
    let (_, token) = store.create_account("alice").unwrap();
    let laptop = VaultStore::open_in_memory().unwrap();
    let phone = VaultStore::open_in_memory().unwrap();

    laptop.put(EntityClass::Cards, "visa", b"4111").unwrap();
    laptop.put(EntityClass::Cards, "amex", b"3782").unwrap();
    sync(&laptop, &base, &token).await;
    sync(&phone, &base, &token).await;

    tick().await;
    phone.put(EntityClass::Cards, "visa", b"4242").unwrap();
    phone.remove(EntityClass::Cards, "amex").unwrap();
    let reports = sync(&phone, &base, &token).await;
    let cards = reports
        .iter()
        .find(|r| r.class == EntityClass::Cards)
        .unwrap();
    assert_eq!(cards.overwritten, 2);
    assert_eq!(cards.pushed, 0);

    sync(&laptop, &base, &token).await;

    let visa = laptop.get(EntityClass::Cards, "visa").unwrap().unwrap();
    assert_eq!(visa.data, b"4242".to_vec());
    assert!(laptop.get(EntityClass::Cards, "amex").unwrap().is_none());

    // The server kept one row per name.
    let account = store.account_for_token(&token).unwrap().unwrap();
    assert_eq!(store.summaries(account, EntityClass::Cards).unwrap().len(), 2);
}

#[tokio::test]
async fn same_name_created_offline_keeps_newest() {
    let (base, store) = spawn_server().await;
    let (_, token) = store.create_account("alice").unwrap();
    let laptop = VaultStore::open_in_memory().unwrap();
    let phone = VaultStore::open_in_memory().unwrap();

    laptop.put(EntityClass::Passwords, "wifi", b"old").unwrap();
    phone.put(EntityClass::Passwords, "other", b"x").unwrap();
    tick().await;
    phone.put(EntityClass::Passwords, "wifi", b"new").unwrap();

    sync(&laptop, &base, &token).await;
    sync(&phone, &base, &token).await;
    sync(&laptop, &base, &token).await;

    for vault in [&laptop, &phone] {
        let wifi = vault.get(EntityClass::Passwords, "wifi").unwrap().unwrap();
        assert_eq!(wifi.data, b"new".to_vec());
        assert!(wifi.remote_link.is_some());
    }
    let account = store.account_for_token(&token).unwrap().unwrap();
    assert_eq!(
        store.summaries(account, EntityClass::Passwords).unwrap().len(),
        2
    );
}

#[tokio::test]
async fn small_batches_cover_large_vaults() {
    let (base, store) = spawn_server().await;
    let (_, token) = store.create_account("alice").unwrap();
    let laptop = VaultStore::open_in_memory().unwrap();
    let phone = VaultStore::open_in_memory().unwrap();
    for i in 0..25 {
        laptop
            .put(EntityClass::Binaries, &format!("file-{i:02}"), &[i as u8])
            .unwrap();
    }

    let engine = SyncEngine::new(SyncConfig {
        batch_size: 4,
        ..Default::default()
    });
    let remote = HttpRemoteStore::new(RemoteConfig::new(&base, &token)).unwrap();
    let cancel = CancellationToken::new();

    let pushed = engine
        .reconcile(EntityClass::Binaries, &remote, &laptop, &cancel)
        .await
        .unwrap();
    let pulled = engine
        .reconcile(EntityClass::Binaries, &remote, &phone, &cancel)
        .await
        .unwrap();

    assert_eq!(pushed.pushed, 25);
    assert_eq!(pushed.linked, 25);
    assert_eq!(pulled.pulled, 25);
    assert_eq!(names(&phone, EntityClass::Binaries).len(), 25);
}

#[tokio::test]
async fn bad_token_fails_every_class() {
    let (base, _) = spawn_server().await;
    let vault = VaultStore::open_in_memory().unwrap();

    let outcome = coordinator(&vault, &base, "nope").sync_all().await;

    assert_eq!(outcome.len(), EntityClass::ALL.len());
    assert!(
        outcome
            .values()
            .all(|r| matches!(r, Err(SyncError::Auth(_))))
    );
}

#[tokio::test]
async fn vault_moved_to_another_account_keeps_newer_values() {
    let (base, store) = spawn_server().await;
    let (_, alice) = store.create_account("alice").unwrap();
    let (bob_id, bob) = store.create_account("bob").unwrap();
    let laptop = VaultStore::open_in_memory().unwrap();
    let phone = VaultStore::open_in_memory().unwrap();

    phone.put(EntityClass::Passwords, "bank", b"old").unwrap();
    sync(&phone, &base, &bob).await;

    tick().await;
    laptop.put(EntityClass::Passwords, "bank", b"newer").unwrap();
    laptop.put(EntityClass::Passwords, "other", b"x").unwrap();
    sync(&laptop, &base, &alice).await;

    // Links now point at alice's rows; bob's server knows none of them.
    let reports = sync(&laptop, &base, &bob).await;
    let passwords = reports
        .iter()
        .find(|r| r.class == EntityClass::Passwords)
        .unwrap();
    assert_eq!(passwords.pulled, 0);
    assert_eq!(passwords.overwritten, 1);
    assert_eq!(passwords.pushed, 1);

    let bank = laptop.get(EntityClass::Passwords, "bank").unwrap().unwrap();
    assert_eq!(bank.data, b"newer".to_vec());
    let names: Vec<String> = store
        .summaries(bob_id, EntityClass::Passwords)
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, vec!["bank", "other"]);

    sync(&phone, &base, &bob).await;
    let bank = phone.get(EntityClass::Passwords, "bank").unwrap().unwrap();
    assert_eq!(bank.data, b"newer".to_vec());
}

#[tokio::test]
async fn oversized_batch_setting_stays_within_server_limit() {
    let (base, store) = spawn_server().await;
    let (_, token) = store.create_account("alice").unwrap();
    let laptop = VaultStore::open_in_memory().unwrap();
    let phone = VaultStore::open_in_memory().unwrap();
    for i in 0..101 {
        laptop
            .put(EntityClass::Texts, &format!("note-{i:03}"), b"text")
            .unwrap();
    }

    let engine = SyncEngine::new(SyncConfig {
        batch_size: 500,
        ..Default::default()
    });
    let remote = HttpRemoteStore::new(RemoteConfig::new(&base, &token)).unwrap();
    let cancel = CancellationToken::new();

    let pushed = engine
        .reconcile(EntityClass::Texts, &remote, &laptop, &cancel)
        .await
        .unwrap();
    let pulled = engine
        .reconcile(EntityClass::Texts, &remote, &phone, &cancel)
        .await
        .unwrap();

    assert_eq!(pushed.pushed, 101);
    assert_eq!(pulled.pulled, 101);
    assert_eq!(names(&phone, EntityClass::Texts).len(), 101);
}
