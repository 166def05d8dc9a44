//! Template library stored as one metadata document.
//!
//! # Responsibility
//! - Load and mutate the nested task-set/checklist/note-template maps.
//!
//! # Invariants
//! - Every mutation is a full read-modify-write of `template_library_config`
//!   inside one read-write transaction.
//! - A missing library document reads as an empty library.
//!
//! # See also
//! - `crate::model::template::LibraryItem` for the per-kind map accessors.

use super::BaseAdapter;
use crate::db::{StorageEngine, StoreError, StoreResult};
use crate::model::generate_id;
use crate::model::metadata::MetadataRecord;
use crate::model::template::{LibraryItem, TemplateLibrary};
use serde_json::Value;

pub const LIBRARY_KEY: &str = "template_library_config";
const LIBRARY_CATEGORY: &str = "templates";

#[derive(Clone)]
pub struct TemplateLibraryAdapter {
    metadata: BaseAdapter<MetadataRecord>,
}

impl TemplateLibraryAdapter {
    pub fn new(engine: StorageEngine) -> Self {
        Self {
            metadata: BaseAdapter::new(engine),
        }
    }

    pub async fn load(&self) -> StoreResult<TemplateLibrary> {
        match self.metadata.get_by_id(LIBRARY_KEY).await? {
            Some(record) => library_from(&record),
            None => Ok(TemplateLibrary::default()),
        }
    }

    /// Inserts or replaces one item. A blank id gets a generated one.
    pub async fn save_item<I: LibraryItem>(&self, mut item: I) -> StoreResult<I> {
        let now = self.metadata.engine().now_ms();
        if item.id().trim().is_empty() {
            item.set_id(generate_id(I::ID_PREFIX, now));
        }
        item.stamp(now);
        let id = item.id().to_string();
        let library = self
            .mutate(move |library| {
                let entries = I::entries_mut(library);
                if let Some(previous) = entries.get(item.id()) {
                    item.keep_created_at(previous);
                }
                entries.insert(item.id().to_string(), item);
                Ok(true)
            })
            .await?;
        library
            .and_then(|library| I::entries(&library).get(&id).cloned())
            .ok_or_else(|| {
                StoreError::TransactionAborted(format!("library item `{id}` was not written"))
            })
    }

    pub async fn get_item<I: LibraryItem>(&self, id: &str) -> StoreResult<Option<I>> {
        let library = self.load().await?;
        Ok(I::entries(&library).get(id).cloned())
    }

    /// Items of one kind ordered by id.
    pub async fn list_items<I: LibraryItem>(&self) -> StoreResult<Vec<I>> {
        let library = self.load().await?;
        Ok(I::entries(&library).values().cloned().collect())
    }

    /// Removes one item; returns whether it existed.
    pub async fn delete_item<I: LibraryItem>(&self, id: &str) -> StoreResult<bool> {
        let id = id.to_string();
        let library = self
            .mutate(move |library| Ok(I::entries_mut(library).remove(&id).is_some()))
            .await?;
        Ok(library.is_some())
    }

    /// Bumps the usage counter of one item. Returns `None` when absent.
    pub async fn record_usage<I: LibraryItem>(&self, id: &str) -> StoreResult<Option<I>> {
        let now = self.metadata.engine().now_ms();
        let key = id.to_string();
        let library = self
            .mutate(move |library| {
                let Some(item) = I::entries_mut(library).get_mut(&key) else {
                    return Ok(false);
                };
                let count = item.usage_count_mut();
                *count = count.saturating_add(1);
                item.stamp(now);
                Ok(true)
            })
            .await?;
        Ok(library.and_then(|library| I::entries(&library).get(id).cloned()))
    }

    /// Applies `f` to the stored library and writes it back when `f`
    /// reports a change. Returns the written library, or `None` when
    /// nothing changed.
    async fn mutate<F>(&self, f: F) -> StoreResult<Option<TemplateLibrary>>
    where
        F: FnOnce(&mut TemplateLibrary) -> StoreResult<bool> + Send + 'static,
    {
        let stored = self
            .metadata
            .upsert_with(LIBRARY_KEY, move |current| {
                let mut record = current.unwrap_or_else(|| {
                    MetadataRecord::new(LIBRARY_KEY, LIBRARY_CATEGORY, Value::Null)
                });
                let mut library = library_from(&record)?;
                if !f(&mut library)? {
                    return Ok(None);
                }
                record.value = serde_json::to_value(&library)?;
                Ok(Some(record))
            })
            .await?;
        stored.as_ref().map(library_from).transpose()
    }
}

fn library_from(record: &MetadataRecord) -> StoreResult<TemplateLibrary> {
    if record.value.is_null() {
        return Ok(TemplateLibrary::default());
    }
    serde_json::from_value(record.value.clone()).map_err(|err| {
        StoreError::InvalidData(format!("template library document does not decode: {err}"))
    })
}
