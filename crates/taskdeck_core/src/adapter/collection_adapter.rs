//! Saved views over entities.
//!
//! # Invariants
//! - `add_item`/`remove_item` only touch manual collections.
//! - `itemCount` mirrors `items.len()` after every adapter write.
//! - `lastUpdated` moves whenever `items` changes.

use super::filter::{self, Filterable, ListQuery};
use super::BaseAdapter;
use crate::db::{StorageEngine, StoreError, StoreResult};
use crate::model::collection::{Collection, CollectionKind, NewCollection};
use crate::model::generate_id;
use std::ops::Deref;

const ID_PREFIX: &str = "collection";

#[derive(Clone)]
pub struct CollectionsAdapter {
    base: BaseAdapter<Collection>,
}

impl CollectionsAdapter {
    pub fn new(engine: StorageEngine) -> Self {
        Self {
            base: BaseAdapter::new(engine),
        }
    }

    /// Creates a collection, filling unset fields with defaults.
    pub async fn create_collection(&self, input: NewCollection) -> StoreResult<Collection> {
        let now = self.base.engine().now_ms();
        let kind = input.kind.unwrap_or(CollectionKind::Manual);
        let collection = Collection {
            id: generate_id(ID_PREFIX, now),
            name: input.name.trim().to_string(),
            description: input.description,
            kind,
            category: input.category,
            filters: input.filters.unwrap_or_default(),
            item_count: input.items.len() as u64,
            items: input.items,
            auto_update: input
                .auto_update
                .unwrap_or(kind != CollectionKind::Manual),
            hidden: input.hidden,
            created_at: None,
            updated_at: None,
            last_updated: Some(now),
        };
        self.base.save(&collection).await
    }

    /// Appends `entity_id` to a manual collection; no-op when already present.
    ///
    /// # Errors
    /// - `InvalidOperation` for saved searches and smart collections.
    pub async fn add_item(&self, id: &str, entity_id: &str) -> StoreResult<Option<Collection>> {
        let entity_id = entity_id.to_string();
        let now = self.base.engine().now_ms();
        self.base
            .update(id, move |collection| {
                ensure_manual(collection, "add items to")?;
                if !collection.items.contains(&entity_id) {
                    collection.items.push(entity_id);
                    touch_items(collection, now);
                }
                Ok(())
            })
            .await
    }

    /// Removes `entity_id` from a manual collection.
    ///
    /// # Errors
    /// - `InvalidOperation` for saved searches and smart collections.
    pub async fn remove_item(&self, id: &str, entity_id: &str) -> StoreResult<Option<Collection>> {
        let entity_id = entity_id.to_string();
        let now = self.base.engine().now_ms();
        self.base
            .update(id, move |collection| {
                ensure_manual(collection, "remove items from")?;
                let before = collection.items.len();
                collection.items.retain(|item| *item != entity_id);
                if collection.items.len() != before {
                    touch_items(collection, now);
                }
                Ok(())
            })
            .await
    }

    /// Replaces `items` regardless of kind; used by saved-search refresh.
    pub async fn update_items(&self, id: &str, items: Vec<String>) -> StoreResult<Option<Collection>> {
        let now = self.base.engine().now_ms();
        self.base
            .update(id, move |collection| {
                collection.items = items;
                touch_items(collection, now);
                Ok(())
            })
            .await
    }

    pub async fn get_by_type(&self, kind: CollectionKind) -> StoreResult<Vec<Collection>> {
        self.base.get_by_index("type", kind).await
    }

    pub async fn get_by_category(&self, category: &str) -> StoreResult<Vec<Collection>> {
        self.base.get_by_index("category", category).await
    }

    pub async fn get_filtered(&self, query: &ListQuery) -> StoreResult<Vec<Collection>> {
        let collections = self.base.get_all().await?;
        Ok(filter::apply(collections, query))
    }
}

fn ensure_manual(collection: &Collection, action: &str) -> StoreResult<()> {
    if collection.kind == CollectionKind::Manual {
        return Ok(());
    }
    Err(StoreError::InvalidOperation(format!(
        "cannot {action} {} collection `{}`; only manual collections hold items directly",
        collection.kind.as_str(),
        collection.id
    )))
}

fn touch_items(collection: &mut Collection, now_ms: i64) {
    collection.item_count = collection.items.len() as u64;
    collection.last_updated = Some(now_ms);
}

impl Filterable for Collection {
    fn kind(&self) -> &str {
        self.kind.as_str()
    }

    fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    fn is_hidden(&self) -> bool {
        self.hidden
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn matches_text(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle)
            || self
                .description
                .as_deref()
                .is_some_and(|description| description.to_lowercase().contains(needle))
    }

    fn created_at(&self) -> Option<i64> {
        self.created_at
    }

    fn updated_at(&self) -> Option<i64> {
        self.updated_at
    }

    fn usage(&self) -> u64 {
        self.item_count
    }
}

impl Deref for CollectionsAdapter {
    type Target = BaseAdapter<Collection>;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}
