use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tether_storage::{LocalCache, MemoryCache, SqliteCache};
use tether_sync::{schema, Entity, MemoryRemoteStore, SyncConfig, SyncEngine, SyncStatus};
use tether_types::{OwnerId, StoreKey};
use tokio::time::sleep;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Project {
    title: String,
    #[serde(default)]
    tracks: Vec<String>,
}

impl Entity for Project {}

fn project(title: &str) -> Project {
    Project {
        title: title.to_string(),
        tracks: Vec::new(),
    }
}

fn key_of(s: &str) -> StoreKey {
    StoreKey::new(s).unwrap()
}

fn online_engine(remote: Arc<MemoryRemoteStore>) -> SyncEngine {
    SyncEngine::new(Arc::new(MemoryCache::new()), remote, SyncConfig::default())
        .with_owner(OwnerId::new())
}

async fn settle() {
    sleep(Duration::from_secs(5)).await;
}

// ── Round trip ───────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn round_trip_without_remote() {
    let local = Arc::new(MemoryCache::new());
    let engine = SyncEngine::local_only(local.clone(), SyncConfig::default());

    let mut store = engine.open(key_of("proj_1"), project("Untitled")).await;
    store.set(project("Draft"));
    settle().await;

    let reopened = engine.open(key_of("proj_1"), project("Untitled")).await;
    assert_eq!(reopened.get(), &project("Draft"));
}

#[tokio::test(start_paused = true)]
async fn round_trip_with_remote() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let engine = online_engine(remote.clone());

    let mut store = engine.open(key_of("proj_1"), project("Untitled")).await;
    store.set(project("Draft"));
    settle().await;

    // A second device: fresh local cache, same owner and backend.
    let other_device = SyncEngine::new(
        Arc::new(MemoryCache::new()),
        remote.clone(),
        SyncConfig::default(),
    )
    .with_owner(engine.owner().unwrap());
    let reopened = other_device.open(key_of("proj_1"), project("Untitled")).await;
    assert_eq!(reopened.get(), &project("Draft"));
}

#[tokio::test(start_paused = true)]
async fn offline_and_failing_remote_converge_on_local_cache() {
    let unavailable = Arc::new(MemoryRemoteStore::new());
    unavailable.set_available(false);
    let failing = Arc::new(MemoryRemoteStore::new());
    failing.set_failing(true);

    for remote in [unavailable, failing] {
        let local = Arc::new(MemoryCache::new());
        let engine = SyncEngine::new(local.clone(), remote.clone(), SyncConfig::default())
            .with_owner(OwnerId::new());

        let mut store = engine.open(key_of("proj_1"), project("Untitled")).await;
        store.set(project("Draft"));
        settle().await;

        let reopened = engine.open(key_of("proj_1"), project("Untitled")).await;
        assert_eq!(reopened.get(), &project("Draft"));
    }
}

#[tokio::test(start_paused = true)]
async fn draft_survives_process_restart_without_backend() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tether.db");

    {
        let cache = Arc::new(SqliteCache::open(&path).unwrap());
        let engine = SyncEngine::local_only(cache, SyncConfig::default());
        let mut store = engine.open(key_of("proj_1"), json!({})).await;
        store.set(json!({"title": "Draft"}));
    }

    let cache = Arc::new(SqliteCache::open(&path).unwrap());
    let engine = SyncEngine::local_only(cache, SyncConfig::default());
    let store = engine.open(key_of("proj_1"), json!({})).await;
    assert_eq!(store.get(), &json!({"title": "Draft"}));
}

#[tokio::test(start_paused = true)]
async fn opening_a_store_does_not_write() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let engine = online_engine(remote.clone());
    remote.seed(&engine.owner().unwrap(), &key_of("k"), json!({"a": 1}));

    let store = engine.open(key_of("k"), json!({})).await;
    settle().await;

    assert_eq!(store.get(), &json!({"a": 1}));
    assert_eq!(store.stats().local_writes, 0);
    assert_eq!(remote.upsert_count(), 0);
    assert!(!store.has_pending_write());
}

#[tokio::test(start_paused = true)]
async fn load_is_idempotent() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let engine = online_engine(remote.clone());
    let mut store = engine.open(key_of("k"), json!({"fresh": true})).await;

    store.load().await;
    store.load().await;

    assert_eq!(remote.load_count(), 1);
    assert_eq!(store.stats().local_writes, 1);
}

#[tokio::test(start_paused = true)]
async fn engine_reports_remote_enablement() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let mut engine = SyncEngine::new(Arc::new(MemoryCache::new()), remote.clone(), SyncConfig::default());
    assert!(!engine.is_remote_enabled());

    engine.set_owner(Some(OwnerId::new()));
    assert!(engine.is_remote_enabled());

    remote.set_available(false);
    assert!(!engine.is_remote_enabled());

    let local_only = SyncEngine::local_only(Arc::new(MemoryCache::new()), SyncConfig::default())
        .with_owner(OwnerId::new());
    assert!(!local_only.is_remote_enabled());
}

#[tokio::test(start_paused = true)]
async fn store_status_reflects_remote() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let engine = online_engine(remote);
    let mut store = engine.open(key_of("k"), json!({})).await;

    store.set(json!({"v": 1}));
    assert_eq!(store.status(), SyncStatus::Pending);
    store.flush().await;
    assert_eq!(store.status(), SyncStatus::Synced);
}

// ── Undo / redo ──────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn undo_stack_is_capped() {
    let engine = SyncEngine::local_only(Arc::new(MemoryCache::new()), SyncConfig::default());
    let mut store = engine.open_with_history(key_of("song"), json!({"step": 0})).await;

    for step in 1..=25 {
        store.mutate(|_| json!({"step": step}));
    }

    let history = store.history().unwrap();
    assert_eq!(history.undo_len(), 20);
    assert_eq!(history.limit(), 20);
}

#[tokio::test(start_paused = true)]
async fn fresh_edit_discards_redo() {
    let engine = SyncEngine::local_only(Arc::new(MemoryCache::new()), SyncConfig::default());
    let mut store = engine.open_with_history(key_of("song"), json!({"step": 0})).await;

    for step in 1..=25 {
        store.mutate(|_| json!({"step": step}));
    }
    assert!(store.undo());
    assert_eq!(store.history().unwrap().redo_len(), 1);

    store.mutate(|_| json!({"step": 99}));
    assert_eq!(store.history().unwrap().redo_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn undo_and_redo_are_persisted() {
    let local = Arc::new(MemoryCache::new());
    let engine = SyncEngine::local_only(local.clone(), SyncConfig::default());
    let mut store = engine.open_with_history(key_of("song"), project("v0")).await;

    store.set(project("v1"));
    store.set(project("v2"));

    assert!(store.undo());
    assert_eq!(store.get(), &project("v1"));
    let cached: Project = schema::decode(local.get(&key_of("song")).unwrap()).unwrap();
    assert_eq!(cached, project("v1"));

    assert!(store.redo());
    assert_eq!(store.get(), &project("v2"));
    let cached: Project = schema::decode(local.get(&key_of("song")).unwrap()).unwrap();
    assert_eq!(cached, project("v2"));
}

#[tokio::test(start_paused = true)]
async fn undo_reaches_remote_through_debounce() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let engine = online_engine(remote.clone());
    let mut store = engine.open_with_history(key_of("song"), project("v0")).await;

    store.set(project("v1"));
    store.set(project("v2"));
    store.undo();
    settle().await;

    assert_eq!(remote.upsert_count(), 1);
    let row = remote.row(&engine.owner().unwrap(), &key_of("song")).unwrap();
    assert_eq!(schema::decode::<Project>(row.data).unwrap(), project("v1"));
}

#[tokio::test(start_paused = true)]
async fn history_navigation_does_not_record_undo() {
    let engine = SyncEngine::local_only(Arc::new(MemoryCache::new()), SyncConfig::default());
    let mut store = engine.open_with_history(key_of("song"), project("v0")).await;

    store.set(project("v1"));
    store.set(project("v2"));
    store.set(project("v3"));
    assert_eq!(store.history().unwrap().undo_len(), 3);

    store.undo();
    store.undo();
    assert_eq!(store.history().unwrap().undo_len(), 1);
    assert_eq!(store.history().unwrap().redo_len(), 2);

    store.redo();
    assert_eq!(store.history().unwrap().undo_len(), 2);
    assert_eq!(store.history().unwrap().redo_len(), 1);
    assert_eq!(store.get(), &project("v2"));
}

#[tokio::test(start_paused = true)]
async fn undo_with_empty_stack_is_noop() {
    let local = Arc::new(MemoryCache::new());
    let engine = SyncEngine::local_only(local, SyncConfig::default());
    let mut store = engine.open_with_history(key_of("song"), project("v0")).await;

    assert!(!store.undo());
    assert!(!store.redo());
    assert_eq!(store.get(), &project("v0"));
    assert_eq!(store.stats().local_writes, 1);
}

#[tokio::test(start_paused = true)]
async fn load_does_not_record_undo() {
    let local = Arc::new(MemoryCache::new());
    local.set(&key_of("song"), &schema::encode(&project("saved")).unwrap());
    let engine = SyncEngine::local_only(local, SyncConfig::default());

    let store = engine.open_with_history(key_of("song"), project("v0")).await;

    assert_eq!(store.get(), &project("saved"));
    assert!(!store.history().unwrap().can_undo());
}

#[tokio::test(start_paused = true)]
async fn stores_without_history_ignore_navigation() {
    let engine = SyncEngine::local_only(Arc::new(MemoryCache::new()), SyncConfig::default());
    let mut store = engine.open(key_of("plain"), project("v0")).await;

    store.set(project("v1"));
    assert!(!store.undo());
    assert!(store.snapshot("named", "").is_none());
    assert!(store.history().is_none());
    assert_eq!(store.get(), &project("v1"));
}

// ── Revisions ────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn revisions_are_never_evicted() {
    let engine = SyncEngine::local_only(Arc::new(MemoryCache::new()), SyncConfig::default());
    let mut store = engine.open_with_history(key_of("song"), project("v0")).await;

    for i in 0..30 {
        store.set(project(&format!("v{i}")));
        store.snapshot(format!("rev {i}"), "auto");
    }

    let snapshots = store.history().unwrap().snapshots();
    assert_eq!(snapshots.len(), 30);
    assert_eq!(snapshots[0].label, "rev 0");
    assert_eq!(snapshots[0].payload, project("v0"));
    assert_eq!(snapshots[29].payload, project("v29"));
}

#[tokio::test(start_paused = true)]
async fn snapshot_does_not_touch_undo_stack() {
    let engine = SyncEngine::local_only(Arc::new(MemoryCache::new()), SyncConfig::default());
    let mut store = engine.open_with_history(key_of("song"), project("v0")).await;
    store.set(project("v1"));

    store.snapshot("Mix A", "two tracks");

    let history = store.history().unwrap();
    assert_eq!(history.undo_len(), 1);
    assert_eq!(history.redo_len(), 0);
    assert_eq!(history.snapshots()[0].summary, "two tracks");
}

#[tokio::test(start_paused = true)]
async fn restore_is_a_new_edit() {
    let engine = SyncEngine::local_only(Arc::new(MemoryCache::new()), SyncConfig::default());
    let mut store = engine.open_with_history(key_of("song"), project("v0")).await;

    store.set(project("v1"));
    let id = store.snapshot("Mix A", "").unwrap().id;
    store.set(project("v2"));
    store.undo();
    assert_eq!(store.history().unwrap().redo_len(), 1);

    assert!(store.restore(&id));
    assert_eq!(store.get(), &project("v1"));
    assert_eq!(store.history().unwrap().redo_len(), 0);

    assert!(store.undo());
    assert_eq!(store.get(), &project("v1"));
}

#[tokio::test(start_paused = true)]
async fn restore_unknown_revision_is_rejected() {
    let engine = SyncEngine::local_only(Arc::new(MemoryCache::new()), SyncConfig::default());
    let mut store = engine.open_with_history(key_of("song"), project("v0")).await;

    assert!(!store.restore(&tether_types::SnapshotId::new()));
    assert_eq!(store.get(), &project("v0"));
}

// ── Clear ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn clear_resets_value_and_steps_but_keeps_revisions() {
    let local = Arc::new(MemoryCache::new());
    let engine = SyncEngine::local_only(local.clone(), SyncConfig::default());
    let mut store = engine.open_with_history(key_of("song"), project("v0")).await;

    store.set(project("v1"));
    store.snapshot("keep", "");
    store.clear();

    assert_eq!(store.get(), &project("v0"));
    assert!(!store.history().unwrap().can_undo());
    assert_eq!(store.history().unwrap().snapshots().len(), 1);
    assert!(!local.contains(&key_of("song")));
}
