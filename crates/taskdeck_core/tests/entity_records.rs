use serde_json::{json, Value};
use taskdeck_core::model::entity::{Entity, Priority};
use taskdeck_core::{BaseAdapter, EnginePhase, Store, StoreError};

fn task(id: &str, title: &str) -> Entity {
    Entity::new(id, "task", title)
}

#[tokio::test]
async fn buy_milk_round_trip_and_index_lookups() {
    let store = Store::in_memory();
    let entities = store.entities();

    let mut milk = task("t1", "Buy milk");
    milk.board_id = Some("b1".to_string());
    milk.priority = Some(Priority::High);
    milk.tags = vec!["errand".to_string(), "home".to_string()];
    let saved = entities.save(&milk).await.unwrap();

    let created_at = saved.created_at.unwrap();
    assert_eq!(saved.updated_at, Some(created_at));
    assert_eq!(entities.get_by_id("t1").await.unwrap(), Some(saved.clone()));

    let by_type = entities.get_by_type("task").await.unwrap();
    assert_eq!(by_type.len(), 1);
    assert_eq!(entities.get_by_board("b1").await.unwrap().len(), 1);
    assert_eq!(entities.get_by_priority(Priority::High).await.unwrap().len(), 1);
    assert_eq!(entities.get_by_tag("home").await.unwrap().len(), 1);
    assert_eq!(entities.get_by_tag("errand").await.unwrap().len(), 1);
    assert!(entities.get_by_completion(true).await.unwrap().is_empty());
    assert_eq!(entities.get_by_completion(false).await.unwrap().len(), 1);

    let done = entities.set_completed("t1", true).await.unwrap().unwrap();
    assert!(done.completed);
    assert_eq!(done.created_at, Some(created_at));
    assert!(done.updated_at.unwrap() > created_at);
    assert_eq!(entities.get_by_completion(true).await.unwrap().len(), 1);
    assert!(entities.get_by_completion(false).await.unwrap().is_empty());

    assert!(entities.set_completed("missing", true).await.unwrap().is_none());
}

#[tokio::test]
async fn multi_entry_index_follows_rewrites() {
    let store = Store::in_memory();
    let entities = store.entities();

    let mut entity = task("t1", "Call plumber");
    entity.tags = vec!["home".to_string()];
    entity.people = vec!["p1".to_string(), "p2".to_string()];
    entities.save(&entity).await.unwrap();

    entity.tags = vec!["urgent".to_string()];
    entity.people = vec!["p2".to_string()];
    entities.save(&entity).await.unwrap();

    assert!(entities.get_by_tag("home").await.unwrap().is_empty());
    assert_eq!(entities.get_by_tag("urgent").await.unwrap().len(), 1);
    assert!(entities.get_by_person("p1").await.unwrap().is_empty());
    assert_eq!(entities.get_by_person("p2").await.unwrap().len(), 1);

    entities.delete("t1").await.unwrap();
    assert!(entities.get_by_tag("urgent").await.unwrap().is_empty());
}

#[tokio::test]
async fn save_keeps_created_at_and_advances_updated_at() {
    let store = Store::in_memory();
    let entities = store.entities();

    let first = entities.save(&task("t1", "Draft")).await.unwrap();
    let mut edited = first.clone();
    edited.title = "Final".to_string();
    let second = entities.save(&edited).await.unwrap();

    assert_eq!(second.created_at, first.created_at);
    assert!(second.updated_at > first.updated_at);
    assert_eq!(entities.count().await.unwrap(), 1);
}

#[tokio::test]
async fn unknown_fields_survive_read_modify_write() {
    let store = Store::in_memory();
    let raw: BaseAdapter<Value> =
        BaseAdapter::for_collection(store.engine().clone(), "entities").unwrap();
    raw.save(&json!({"id": "t1", "type": "task", "title": "Plan trip", "estimate": 5}))
        .await
        .unwrap();

    store.entities().set_completed("t1", true).await.unwrap();

    let document = raw.get_by_id("t1").await.unwrap().unwrap();
    assert_eq!(document["estimate"], 5);
    assert_eq!(document["completed"], true);
}

#[tokio::test]
async fn undecodable_documents_are_skipped_in_listings() {
    let store = Store::in_memory();
    let raw: BaseAdapter<Value> =
        BaseAdapter::for_collection(store.engine().clone(), "entities").unwrap();
    raw.save(&json!({"id": "broken", "title": "no type field", "completed": false}))
        .await
        .unwrap();
    store.entities().save(&task("t1", "Fine")).await.unwrap();

    let listed = store.entities().get_all().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, "t1");
    assert_eq!(store.entities().count().await.unwrap(), 2);
    assert!(store.entities().get_by_id("broken").await.is_err());
}

#[tokio::test]
async fn priorities_outside_the_named_levels_stay_listed() {
    let store = Store::in_memory();
    let raw: BaseAdapter<Value> =
        BaseAdapter::for_collection(store.engine().clone(), "entities").unwrap();
    raw.save(&json!({"id": "t2", "type": "task", "title": "Later", "priority": 2}))
        .await
        .unwrap();
    raw.save(&json!({"id": "t3", "type": "task", "title": "Maybe", "priority": "someday"}))
        .await
        .unwrap();

    let entities = store.entities();
    assert_eq!(entities.get_all().await.unwrap().len(), 2);
    assert_eq!(entities.get_by_type("task").await.unwrap().len(), 2);

    let numeric = entities.get_by_priority(2).await.unwrap();
    assert_eq!(numeric.len(), 1);
    assert_eq!(numeric[0].priority, Some(Priority::Other(json!(2))));
    assert_eq!(entities.get_by_priority("someday").await.unwrap()[0].id, "t3");

    // Rewriting through the typed adapter keeps the stored value.
    entities.set_completed("t2", true).await.unwrap();
    assert_eq!(raw.get_by_id("t2").await.unwrap().unwrap()["priority"], 2);
}

#[tokio::test]
async fn undeclared_index_fails_before_any_io() {
    let store = Store::in_memory();
    let err = store
        .entities()
        .get_by_index("colour", "red")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::IndexNotFound { ref collection, ref index } if collection == "entities" && index == "colour"
    ));
    assert!(err.is_programmer_error());
    assert_eq!(store.phase(), EnginePhase::Closed);
    assert_eq!(store.engine().open_attempts(), 0);
}

#[tokio::test]
async fn raw_adapter_rejects_unknown_collection_and_missing_key() {
    let store = Store::in_memory();
    let err = BaseAdapter::<Value>::for_collection(store.engine().clone(), "widgets")
        .err()
        .unwrap();
    assert!(matches!(err, StoreError::UnknownCollection(_)));

    let raw: BaseAdapter<Value> =
        BaseAdapter::for_collection(store.engine().clone(), "tags").unwrap();
    let err = raw.save(&json!({"name": "no id"})).await.unwrap_err();
    assert!(matches!(err, StoreError::MissingKey { field: "id", .. }));
    let err = raw.save(&json!("not an object")).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidData(_)));
}

#[tokio::test]
async fn delete_and_clear_are_idempotent() {
    let store = Store::in_memory();
    let entities = store.entities();
    assert!(entities.delete("never-there").await.unwrap());

    let written = entities
        .save_many(&[task("t1", "One"), task("t2", "Two"), task("t3", "Three")])
        .await
        .unwrap();
    assert_eq!(written, 3);
    assert_eq!(entities.count().await.unwrap(), 3);

    let ids: Vec<String> = entities
        .get_all()
        .await
        .unwrap()
        .into_iter()
        .map(|entity| entity.id)
        .collect();
    assert_eq!(ids, vec!["t1", "t2", "t3"]);

    assert!(entities.clear().await.unwrap());
    assert!(entities.clear().await.unwrap());
    assert_eq!(entities.count().await.unwrap(), 0);
}

#[tokio::test]
async fn search_matches_title_and_content_case_insensitively() {
    let store = Store::in_memory();
    let entities = store.entities();
    let mut note = Entity::new("n1", "note", "Groceries");
    note.content = Some("Remember the MILK".to_string());
    entities.save(&note).await.unwrap();
    entities.save(&task("t1", "Buy milk")).await.unwrap();
    entities.save(&task("t2", "Walk dog")).await.unwrap();

    let hits = entities.search("Milk").await.unwrap();
    let ids: Vec<&str> = hits.iter().map(|entity| entity.id.as_str()).collect();
    assert_eq!(ids, vec!["n1", "t1"]);
    assert_eq!(entities.search("  ").await.unwrap().len(), 3);
}

#[tokio::test]
async fn upsert_with_rejects_primary_key_changes() {
    let store = Store::in_memory();
    let entities = store.entities();
    entities.save(&task("t1", "Original")).await.unwrap();

    let err = entities
        .upsert_with("t1", |current| {
            let mut entity = current.unwrap();
            entity.id = "t2".to_string();
            Ok(Some(entity))
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidOperation(_)));
    assert!(entities.get_by_id("t2").await.unwrap().is_none());

    let unchanged = entities
        .upsert_with("t1", |_| Ok(None))
        .await
        .unwrap();
    assert!(unchanged.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_updates_do_not_lose_writes() {
    let store = Store::in_memory();
    store.tags().create_tag(taskdeck_core::model::tag::NewTag::named("busy")).await.unwrap();
    let id = store.tags().find_by_name("busy").await.unwrap().unwrap().id;

    let mut handles = Vec::new();
    for _ in 0..20 {
        let store = store.clone();
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            store.tags().increment_usage(&id).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let tag = store.tags().get_by_id(&id).await.unwrap().unwrap();
    assert_eq!(tag.usage_count, 20);
}
