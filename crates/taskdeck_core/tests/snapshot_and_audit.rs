use serde_json::{json, Value};
use std::collections::BTreeMap;
use taskdeck_core::model::board::Board;
use taskdeck_core::model::entity::Entity;
use taskdeck_core::model::tag::NewTag;
use taskdeck_core::schema::SCHEMA_VERSION;
use taskdeck_core::{BaseAdapter, ImportMode, LegacySnapshot, Snapshot, Store};

async fn populated() -> Store {
    let store = Store::in_memory();
    let mut milk = Entity::new("t1", "task", "Buy milk");
    milk.tags = vec!["errand".to_string()];
    store.entities().save(&milk).await.unwrap();
    store
        .entities()
        .save(&Entity::new("n1", "note", "Ideas"))
        .await
        .unwrap();
    store.boards().save_board(&Board::new("b1", "Home")).await.unwrap();
    store.tags().create_tag(NewTag::named("errand")).await.unwrap();
    store.settings().set_feature_flag("weeklyView", true).await.unwrap();
    store
}

fn as_legacy<T: serde::Serialize>(records: &[T], id: impl Fn(&T) -> String) -> BTreeMap<String, Value> {
    records
        .iter()
        .map(|record| (id(record), serde_json::to_value(record).unwrap()))
        .collect()
}

#[tokio::test]
async fn export_then_import_into_empty_store() {
    let source = populated().await;
    let snapshot = source.export_snapshot().await.unwrap();
    assert_eq!(snapshot.schema_version, SCHEMA_VERSION);
    assert_eq!(snapshot.record_count(), 5);
    assert_eq!(snapshot.collections["entities"].len(), 2);
    assert!(snapshot.collections["weeklyItems"].is_empty());

    let text = serde_json::to_string(&snapshot).unwrap();
    let parsed: Snapshot = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, snapshot);

    let target = Store::in_memory();
    let summary = target
        .import_snapshot(&parsed, ImportMode::Merge)
        .await
        .unwrap();
    assert_eq!(summary.total(), 5);
    assert!(summary.skipped.is_empty());

    let original = source.entities().get_by_id("t1").await.unwrap().unwrap();
    let copied = target.entities().get_by_id("t1").await.unwrap().unwrap();
    assert_eq!(copied.title, original.title);
    assert_eq!(copied.created_at, original.created_at);
    assert_eq!(target.entities().get_by_tag("errand").await.unwrap().len(), 1);
    assert!(target.settings().is_feature_enabled("weeklyView").await.unwrap());
    assert_eq!(target.statistics().await.total_records(), 5);
}

#[tokio::test]
async fn merge_keeps_existing_records_and_replace_clears_them() {
    let source = populated().await;
    let snapshot = source.export_snapshot().await.unwrap();

    let target = Store::in_memory();
    target
        .entities()
        .save(&Entity::new("local", "task", "Only here"))
        .await
        .unwrap();

    target.import_snapshot(&snapshot, ImportMode::Merge).await.unwrap();
    assert_eq!(target.entities().count().await.unwrap(), 3);

    let summary = target
        .import_snapshot(&snapshot, ImportMode::Replace)
        .await
        .unwrap();
    assert_eq!(summary.mode, ImportMode::Replace);
    assert_eq!(target.entities().count().await.unwrap(), 2);
    assert!(target.entities().get_by_id("local").await.unwrap().is_none());
}

#[tokio::test]
async fn unknown_collections_are_skipped_and_bad_records_abort() {
    let text = json!({
        "exportedAt": 1,
        "schemaVersion": SCHEMA_VERSION,
        "tags": [{"id": "tag_1", "name": "home"}],
        "legacyNotes": [{"id": "x"}]
    })
    .to_string();
    let snapshot: Snapshot = serde_json::from_str(&text).unwrap();

    let store = Store::in_memory();
    let summary = store
        .import_snapshot(&snapshot, ImportMode::Merge)
        .await
        .unwrap();
    assert_eq!(summary.skipped, vec!["legacyNotes"]);
    assert_eq!(summary.imported["tags"], 1);
    let tag = store.tags().get_by_id("tag_1").await.unwrap().unwrap();
    assert!(tag.created_at.is_some());

    let mut broken = Snapshot::default();
    broken.collections.insert(
        "tags".to_string(),
        vec![json!({"id": "tag_2", "name": "ok"}), json!({"name": "no id"})],
    );
    assert!(store.import_snapshot(&broken, ImportMode::Merge).await.is_err());
    assert!(store.tags().get_by_id("tag_2").await.unwrap().is_none());
}

#[tokio::test]
async fn identical_data_validates_cleanly() {
    let store = populated().await;
    let entities = store.entities().get_all().await.unwrap();
    let boards = store.boards().get_all_boards().await.unwrap();
    let legacy = LegacySnapshot {
        entities: as_legacy(&entities, |entity| entity.id.clone()),
        boards: as_legacy(&boards, |board| board.id.clone()),
    };

    let report = store.validator().validate_consistency(&legacy).await.unwrap();
    assert!(report.overall_valid);
    assert_eq!(report.results.len(), 2);
    assert_eq!(report.results[0].matching, 2);
    assert_eq!(report.results[1].matching, 1);
}

#[tokio::test]
async fn divergence_is_reported_per_record_and_field() {
    let store = populated().await;
    let entities = store.entities().get_all().await.unwrap();
    let mut legacy = as_legacy(&entities, |entity| entity.id.clone());

    store
        .entities()
        .save(&Entity::new("extra", "task", "Store only"))
        .await
        .unwrap();
    let result = store.validator().validate_entities(&legacy).await.unwrap();
    assert!(!result.is_valid());
    assert_eq!(result.extra, vec!["extra"]);
    assert!(result.missing.is_empty());
    assert_eq!(result.store_count, 3);
    assert_eq!(result.legacy_count, 2);

    legacy.insert("gone".to_string(), json!({"id": "gone", "type": "task"}));
    legacy.get_mut("t1").unwrap()["title"] = json!("Buy oat milk");
    // An absent array reads as empty.
    legacy.get_mut("n1").unwrap().as_object_mut().unwrap().remove("tags");
    let result = store.validator().validate_entities(&legacy).await.unwrap();
    assert_eq!(result.missing, vec!["gone"]);
    assert_eq!(result.different.len(), 1);
    assert_eq!(result.different[0].id, "t1");
    assert_eq!(result.different[0].fields[0].field, "title");
    assert_eq!(result.different[0].fields[0].store, json!("Buy milk"));
    assert_eq!(result.matching, 1);
}

#[tokio::test]
async fn sparse_stored_documents_match_identical_legacy_records() {
    let store = Store::in_memory();
    let raw: BaseAdapter<Value> =
        BaseAdapter::for_collection(store.engine().clone(), "entities").unwrap();
    let sparse = json!({"id": "t1", "type": "task", "title": "Buy milk"});
    let numeric = json!({"id": "t2", "type": "task", "title": "Later", "priority": 2});
    raw.save(&sparse).await.unwrap();
    raw.save(&numeric).await.unwrap();
    let boards: BaseAdapter<Value> =
        BaseAdapter::for_collection(store.engine().clone(), "boards").unwrap();
    let board = json!({"id": "b1", "name": "Home"});
    boards.save(&board).await.unwrap();

    let legacy = LegacySnapshot {
        entities: BTreeMap::from([("t1".to_string(), sparse), ("t2".to_string(), numeric)]),
        boards: BTreeMap::from([("b1".to_string(), board)]),
    };
    let report = store.validator().validate_consistency(&legacy).await.unwrap();
    assert!(report.overall_valid, "{report:?}");
    assert_eq!(report.results[0].store_count, 2);
    assert_eq!(report.results[0].matching, 2);
    assert_eq!(report.results[1].matching, 1);
}
