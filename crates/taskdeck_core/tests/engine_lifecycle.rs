use rusqlite::Connection;
use std::time::Duration;
use taskdeck_core::schema::{self, SCHEMA_VERSION};
use taskdeck_core::{EnginePhase, Store, StoreConfig, StoreError, TxMode};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_opens_share_one_attempt_and_create_each_collection_once() {
    let store = Store::in_memory();

    let (first, second, third) = tokio::join!(store.open(), store.open(), store.open());
    let first = first.unwrap();
    assert!(first.same_connection(&second.unwrap()));
    assert!(first.same_connection(&third.unwrap()));

    let mut spawned = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        spawned.push(tokio::spawn(async move { store.open().await }));
    }
    for handle in spawned {
        let db = handle.await.unwrap().unwrap();
        assert!(first.same_connection(&db));
    }

    assert_eq!(store.engine().open_attempts(), 1);
    assert_eq!(store.phase(), EnginePhase::Opened);
    let created = &first.upgrade_report().created;
    assert_eq!(created.len(), schema::all_collection_names().len());
    let mut unique = created.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), created.len());
    assert_eq!(first.version(), SCHEMA_VERSION);
}

#[tokio::test]
async fn transactions_require_an_opened_engine() {
    let store = Store::in_memory();
    let err = store
        .engine()
        .transaction(&["entities"], TxMode::ReadOnly)
        .err()
        .unwrap();
    assert!(matches!(err, StoreError::NotInitialized));

    store.open().await.unwrap();
    let err = store
        .engine()
        .transaction(&["notACollection"], TxMode::ReadOnly)
        .err()
        .unwrap();
    assert!(matches!(err, StoreError::UnknownCollection(name) if name == "notACollection"));

    let count = store
        .engine()
        .transaction(&["entities", "boards"], TxMode::ReadOnly)
        .unwrap()
        .run(|tx| Ok(tx.count("entities")? + tx.count("boards")?))
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn transaction_scope_rejects_writes_in_read_only_mode() {
    let store = Store::in_memory();
    store.open().await.unwrap();
    let err = store
        .engine()
        .transaction(&["tags"], TxMode::ReadOnly)
        .unwrap()
        .run(|tx| tx.put("tags", &serde_json::json!({"id": "t1", "name": "work"})))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::ReadOnly(_)));

    let err = store
        .engine()
        .transaction(&["tags"], TxMode::ReadWrite)
        .unwrap()
        .run(|tx| tx.get("entities", "e1"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidOperation(_)));
}

#[tokio::test]
async fn failed_closure_rolls_back_the_transaction() {
    let store = Store::in_memory();
    store.open().await.unwrap();
    let err = store
        .engine()
        .transaction(&["tags"], TxMode::ReadWrite)
        .unwrap()
        .run(|tx| {
            tx.put("tags", &serde_json::json!({"id": "t1", "name": "work"}))?;
            Err::<(), _>(StoreError::InvalidOperation("stop".to_string()))
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidOperation(_)));
    assert_eq!(store.tags().count().await.unwrap(), 0);
}

#[tokio::test]
async fn file_store_survives_close_and_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("deck.db");

    let store = Store::new(StoreConfig::file(&path));
    let tag = store
        .tags()
        .create_tag(taskdeck_core::model::tag::NewTag::named("Work"))
        .await
        .unwrap();
    store.close();
    assert_eq!(store.phase(), EnginePhase::Closed);

    let db = store.open().await.unwrap();
    assert!(!db.upgrade_report().upgraded());
    assert_eq!(store.engine().open_attempts(), 2);
    let reloaded = store.tags().get_by_id(&tag.id).await.unwrap().unwrap();
    assert_eq!(reloaded, tag);
}

#[tokio::test]
async fn missing_collection_triggers_one_repair_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("deck.db");

    let store = Store::new(StoreConfig::file(&path));
    store.open().await.unwrap();
    store.close();

    let raw = Connection::open(&path).unwrap();
    raw.execute_batch("DROP TABLE \"metadata\";").unwrap();
    drop(raw);

    let repaired = Store::new(StoreConfig::file(&path));
    let db = repaired.open().await.unwrap();
    assert_eq!(db.version(), SCHEMA_VERSION + 1);
    assert_eq!(db.upgrade_report().created, vec!["metadata".to_string()]);
    assert_eq!(repaired.engine().working_version(), SCHEMA_VERSION + 1);
    assert_eq!(repaired.engine().open_attempts(), 1);

    repaired
        .settings()
        .set_feature_flag("weeklyView", true)
        .await
        .unwrap();
    assert!(repaired
        .settings()
        .is_feature_enabled("weeklyView")
        .await
        .unwrap());
}

#[tokio::test]
async fn upgrade_blocked_by_another_writer_is_reported_as_warning() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("deck.db");

    let store = Store::new(StoreConfig::file(&path));
    store.open().await.unwrap();
    store.close();

    let holder = Connection::open(&path).unwrap();
    holder.execute_batch("BEGIN IMMEDIATE;").unwrap();

    let newer = Store::new(
        StoreConfig::file(&path)
            .with_schema_version(SCHEMA_VERSION + 1)
            .with_busy_timeout(Duration::from_millis(50)),
    );
    let err = newer.open().await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::UpgradeBlocked { requested_version } if requested_version == SCHEMA_VERSION + 1
    ));
    assert!(err.is_user_warning());
    assert_eq!(newer.phase(), EnginePhase::Closed);

    holder.execute_batch("COMMIT;").unwrap();
    let db = newer.open().await.unwrap();
    assert_eq!(db.version(), SCHEMA_VERSION + 1);
    assert_eq!(newer.engine().open_attempts(), 2);

    // An older client adopts the newer stored version instead of failing.
    let older = Store::new(StoreConfig::file(&path));
    let db = older.open().await.unwrap();
    assert_eq!(db.version(), SCHEMA_VERSION + 1);
    assert!(!db.upgrade_report().upgraded());
}

#[tokio::test]
async fn close_during_open_discards_the_pending_connection() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("deck.db");
    let holder = Connection::open(&path).unwrap();
    holder.execute_batch("BEGIN IMMEDIATE;").unwrap();

    let store = Store::new(StoreConfig::file(&path).with_busy_timeout(Duration::from_secs(5)));
    let engine = store.engine().clone();
    let mut opening = Box::pin(engine.open());
    // The upgrade waits on the held lock, so the attempt is still in flight.
    assert!(futures::poll!(&mut opening).is_pending());
    assert!(matches!(
        engine.phase(),
        EnginePhase::Opening | EnginePhase::Upgrading
    ));

    store.close();
    holder.execute_batch("COMMIT;").unwrap();
    let err = opening.await.unwrap_err();
    assert!(matches!(err, StoreError::NotInitialized));
    assert_eq!(store.phase(), EnginePhase::Closed);
    assert!(store.engine().current().is_none());

    let db = store.open().await.unwrap();
    assert_eq!(store.engine().open_attempts(), 2);
    assert!(db.same_connection(&store.engine().current().unwrap()));
    assert!(!db.is_closed());
}

#[tokio::test]
async fn timed_out_transaction_is_rolled_back() {
    let limit = Duration::from_millis(50);
    let store = Store::new(StoreConfig::in_memory().with_operation_timeout(limit));
    store.open().await.unwrap();

    let err = store
        .engine()
        .transaction(&["tags"], TxMode::ReadWrite)
        .unwrap()
        .run(|tx| {
            std::thread::sleep(Duration::from_millis(300));
            tx.put("tags", &serde_json::json!({"id": "t1", "name": "late"}))
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Timeout(elapsed) if elapsed == limit));

    // Give the worker time to finish; its write must not land.
    tokio::time::sleep(Duration::from_millis(500)).await;
    let count = store
        .engine()
        .transaction(&["tags"], TxMode::ReadOnly)
        .unwrap()
        .run(|tx| tx.count("tags"))
        .await
        .unwrap();
    assert_eq!(count, 0);

    let relaxed = Store::new(StoreConfig::in_memory().with_operation_timeout(Duration::from_secs(10)));
    relaxed.open().await.unwrap();
    let stored = relaxed
        .engine()
        .transaction(&["tags"], TxMode::ReadWrite)
        .unwrap()
        .run(|tx| tx.put("tags", &serde_json::json!({"id": "t1", "name": "quick"})))
        .await
        .unwrap();
    assert_eq!(stored, "t1");
    assert_eq!(relaxed.tags().count().await.unwrap(), 1);
}

#[tokio::test]
async fn unopenable_location_is_not_supported_and_statistics_degrade() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::new(StoreConfig::file(dir.path().join("missing").join("deck.db")));

    let err = store.open().await.unwrap_err();
    assert!(matches!(err, StoreError::NotSupported(_)));
    assert_eq!(store.phase(), EnginePhase::Closed);

    let statistics = store.statistics().await;
    assert_eq!(
        statistics.collections.len(),
        schema::all_collection_names().len()
    );
    assert_eq!(statistics.total_records(), 0);
}

#[tokio::test]
async fn statistics_count_records_per_collection() {
    let store = Store::in_memory();
    store
        .tags()
        .create_tag(taskdeck_core::model::tag::NewTag::named("home"))
        .await
        .unwrap();
    store
        .metadata()
        .set_value("lastSync", "sync", serde_json::json!(1))
        .await
        .unwrap();

    let statistics = store.statistics().await;
    assert_eq!(statistics.schema_version, SCHEMA_VERSION);
    assert_eq!(statistics.collections["tags"], 1);
    assert_eq!(statistics.collections["metadata"], 1);
    assert_eq!(statistics.total_records(), 2);
}
