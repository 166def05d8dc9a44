use super::BaseAdapter;
use crate::db::{StorageEngine, StoreResult};
use crate::model::entity::Entity;
use serde::Serialize;
use std::ops::Deref;

/// Task/note/event queries over the `entities` collection.
#[derive(Clone)]
pub struct EntityAdapter {
    base: BaseAdapter<Entity>,
}

impl EntityAdapter {
    pub fn new(engine: StorageEngine) -> Self {
        Self {
            base: BaseAdapter::new(engine),
        }
    }

    pub async fn get_by_type(&self, kind: &str) -> StoreResult<Vec<Entity>> {
        self.base.get_by_index("type", kind).await
    }

    pub async fn get_by_board(&self, board_id: &str) -> StoreResult<Vec<Entity>> {
        self.base.get_by_index("boardId", board_id).await
    }

    pub async fn get_by_completion(&self, completed: bool) -> StoreResult<Vec<Entity>> {
        self.base.get_by_index("completed", completed).await
    }

    /// Accepts a [`Priority`](crate::model::entity::Priority) or any scalar stored as-is.
    pub async fn get_by_priority<V: Serialize>(&self, priority: V) -> StoreResult<Vec<Entity>> {
        self.base.get_by_index("priority", priority).await
    }

    pub async fn get_by_tag(&self, tag: &str) -> StoreResult<Vec<Entity>> {
        self.base.get_by_index("tags", tag).await
    }

    pub async fn get_by_person(&self, person: &str) -> StoreResult<Vec<Entity>> {
        self.base.get_by_index("people", person).await
    }

    /// Case-insensitive substring scan over title and content.
    ///
    /// Materializes the whole collection; not index-backed. A blank term
    /// returns every entity.
    pub async fn search(&self, term: &str) -> StoreResult<Vec<Entity>> {
        let needle = term.trim().to_lowercase();
        let mut entities = self.base.get_all().await?;
        if !needle.is_empty() {
            entities.retain(|entity| entity.matches_text(&needle));
        }
        Ok(entities)
    }

    /// Flips the completion flag. Returns `None` when the entity is absent.
    pub async fn set_completed(&self, id: &str, completed: bool) -> StoreResult<Option<Entity>> {
        self.base
            .update(id, move |entity| {
                entity.completed = completed;
                Ok(())
            })
            .await
    }
}

impl Deref for EntityAdapter {
    type Target = BaseAdapter<Entity>;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}
