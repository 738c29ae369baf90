use async_trait::async_trait;
use lockbox_sync::adapter::mock::{MockLocalStore, MockRemoteStore};
use lockbox_sync::{
    LocalStore, RemoteStore, SyncConfig, SyncCoordinator, SyncEngine, SyncError, SyncResult,
};
use lockbox_types::{
    ClientEntry, EntityClass, Entry, LocalId, NewEntry, RemoteId, ServerEntry, ServerSummary,
    Timestamp,
};
use std::sync::Arc;
use std::time::Duration;

fn client_entry(id: i64, name: &str) -> ClientEntry {
    Entry {
        id: LocalId::new(id),
        name: name.to_string(),
        data: name.as_bytes().to_vec(),
        created_at: Timestamp::from_millis(1_000),
        updated_at: Timestamp::from_millis(1_000),
        deleted: false,
        remote_link: None,
    }
}

fn make_coordinator(
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
) -> SyncCoordinator {
    SyncCoordinator::new(local, remote, SyncEngine::new(SyncConfig::default()))
}

/// Refuses every call for one class.
struct ClassOutage {
    inner: MockRemoteStore,
    down: EntityClass,
}

impl ClassOutage {
    fn check(&self, class: EntityClass) -> SyncResult<()> {
        if class == self.down {
            return Err(SyncError::Network(format!("{class} unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for ClassOutage {
    async fn summaries(&self, class: EntityClass) -> SyncResult<Vec<ServerSummary>> {
        self.check(class)?;
        self.inner.summaries(class).await
    }

    async fn all_entries(&self, class: EntityClass) -> SyncResult<Vec<ServerEntry>> {
        self.check(class)?;
        self.inner.all_entries(class).await
    }

    async fn entries_by_ids(
        &self,
        class: EntityClass,
        ids: &[RemoteId],
    ) -> SyncResult<Vec<ServerEntry>> {
        self.check(class)?;
        self.inner.entries_by_ids(class, ids).await
    }

    async fn insert_entries(
        &self,
        class: EntityClass,
        entries: Vec<NewEntry>,
    ) -> SyncResult<Vec<RemoteId>> {
        self.check(class)?;
        self.inner.insert_entries(class, entries).await
    }

    async fn update_entries(
        &self,
        class: EntityClass,
        entries: Vec<ServerEntry>,
    ) -> SyncResult<()> {
        self.check(class)?;
        self.inner.update_entries(class, entries).await
    }
}

#[tokio::test]
async fn sync_class_runs_single_pass() {
    let local = Arc::new(
        MockLocalStore::new().with_entries(EntityClass::Cards, vec![client_entry(1, "visa")]),
    );
    let remote = Arc::new(MockRemoteStore::new());
    let coordinator = make_coordinator(local.clone(), remote.clone());

    let report = coordinator.sync_class(EntityClass::Cards).await.unwrap();

    assert_eq!(report.pushed, 1);
    assert_eq!(remote.entries(EntityClass::Cards).len(), 1);
    assert!(remote.entries(EntityClass::Passwords).is_empty());
}

#[tokio::test]
async fn sync_all_covers_every_class() {
    let local = Arc::new(
        MockLocalStore::new()
            .with_entries(EntityClass::Passwords, vec![client_entry(1, "bank")])
            .with_entries(EntityClass::Texts, vec![client_entry(2, "diary")]),
    );
    let remote = Arc::new(MockRemoteStore::new());
    let coordinator = make_coordinator(local, remote.clone());

    let outcome = coordinator.sync_all().await;

    let classes: Vec<EntityClass> = outcome.keys().copied().collect();
    assert_eq!(classes, EntityClass::ALL.to_vec());
    assert_eq!(outcome[&EntityClass::Passwords].as_ref().unwrap().pushed, 1);
    assert_eq!(outcome[&EntityClass::Texts].as_ref().unwrap().pushed, 1);
    assert!(outcome[&EntityClass::Cards].as_ref().unwrap().is_noop());
    assert_eq!(remote.entries(EntityClass::Texts).len(), 1);
}

#[tokio::test]
async fn failing_class_does_not_stop_the_others() {
    let local = Arc::new(
        MockLocalStore::new()
            .with_entries(EntityClass::Passwords, vec![client_entry(1, "bank")])
            .with_entries(EntityClass::Cards, vec![client_entry(2, "visa")]),
    );
    let remote = Arc::new(ClassOutage {
        inner: MockRemoteStore::new(),
        down: EntityClass::Cards,
    });
    let coordinator = make_coordinator(local, remote.clone());

    let outcome = coordinator.sync_all().await;

    assert!(matches!(
        outcome[&EntityClass::Cards],
        Err(SyncError::Network(_))
    ));
    assert_eq!(outcome[&EntityClass::Passwords].as_ref().unwrap().pushed, 1);
    assert_eq!(remote.inner.entries(EntityClass::Passwords).len(), 1);
}

#[tokio::test]
async fn shutdown_cancels_passes() {
    let local = Arc::new(
        MockLocalStore::new().with_entries(EntityClass::Passwords, vec![client_entry(1, "bank")]),
    );
    let remote = Arc::new(MockRemoteStore::new());
    let coordinator = make_coordinator(local, remote.clone());

    coordinator.shutdown();
    let result = coordinator.sync_class(EntityClass::Passwords).await;

    assert!(matches!(result, Err(SyncError::Cancelled)));
    assert!(remote.calls().is_empty());
    assert!(coordinator.cancellation_token().is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn periodic_sync_repeats_until_shutdown() {
    let local = Arc::new(
        MockLocalStore::new().with_entries(EntityClass::Texts, vec![client_entry(1, "todo")]),
    );
    let remote = Arc::new(MockRemoteStore::new());
    let coordinator = Arc::new(make_coordinator(local, remote.clone()));
    let token = coordinator.cancellation_token();

    let worker = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            coordinator
                .run_periodic(&[EntityClass::Texts], Duration::from_secs(10))
                .await
        })
    };

    tokio::time::sleep(Duration::from_secs(25)).await;
    token.cancel();
    let rounds = worker.await.unwrap();

    assert!(rounds >= 2);
    // The first round pushed, later rounds found nothing to do.
    assert_eq!(remote.entries(EntityClass::Texts).len(), 1);
}
