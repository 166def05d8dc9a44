//! Labeled edges between entities and people (or other entities).
//!
//! # Invariants
//! - Ids are synthetic: `rel_<epoch ms>_<random>`.
//! - No uniqueness per `(entityId, relatedId)`; duplicates are kept.
//! - Edges outlive deleted entities until removed or swept via
//!   `find_dangling`.

use super::BaseAdapter;
use crate::db::{StorageEngine, StoreResult, TxMode};
use crate::model::generate_id;
use crate::model::relationship::Relationship;
use crate::schema::ENTITY_RELATIONSHIPS;
use log::info;
use serde_json::Value;
use std::collections::HashSet;
use std::ops::Deref;

const ID_PREFIX: &str = "rel";

#[derive(Clone)]
pub struct RelationshipAdapter {
    base: BaseAdapter<Relationship>,
}

impl RelationshipAdapter {
    pub fn new(engine: StorageEngine) -> Self {
        Self {
            base: BaseAdapter::new(engine),
        }
    }

    /// Persists a new edge with a generated id.
    pub async fn create_relationship(
        &self,
        entity_id: &str,
        related_id: &str,
        relationship_type: &str,
        context: Option<&str>,
    ) -> StoreResult<Relationship> {
        let relationship = Relationship {
            id: generate_id(ID_PREFIX, self.base.engine().now_ms()),
            entity_id: entity_id.to_string(),
            related_id: related_id.to_string(),
            relationship_type: relationship_type.to_string(),
            context: context.map(str::to_string),
            created_at: None,
            updated_at: None,
        };
        self.base.save(&relationship).await
    }

    pub async fn get_for_entity(&self, entity_id: &str) -> StoreResult<Vec<Relationship>> {
        self.base.get_by_index("entityId", entity_id).await
    }

    pub async fn get_for_related(&self, related_id: &str) -> StoreResult<Vec<Relationship>> {
        self.base.get_by_index("relatedId", related_id).await
    }

    pub async fn get_by_type(&self, relationship_type: &str) -> StoreResult<Vec<Relationship>> {
        self.base
            .get_by_index("relationshipType", relationship_type)
            .await
    }

    /// Deletes every edge from `entity_id` to `related_id`.
    ///
    /// Returns whether at least one edge was removed.
    pub async fn remove_relationship(&self, entity_id: &str, related_id: &str) -> StoreResult<bool> {
        let entity_id = entity_id.to_string();
        let related_id = related_id.to_string();
        let engine = self.base.engine().clone();
        engine.open().await?;
        let removed = engine
            .transaction(&[ENTITY_RELATIONSHIPS], TxMode::ReadWrite)?
            .run(move |tx| {
                let edges = tx.get_by_index(
                    ENTITY_RELATIONSHIPS,
                    "entityId",
                    &Value::String(entity_id),
                )?;
                let mut removed = 0usize;
                for edge in edges {
                    if edge.get("relatedId").and_then(Value::as_str) != Some(related_id.as_str()) {
                        continue;
                    }
                    if let Some(id) = edge.get("id").and_then(Value::as_str) {
                        tx.delete(ENTITY_RELATIONSHIPS, id)?;
                        removed += 1;
                    }
                }
                Ok(removed)
            })
            .await?;
        if removed > 0 {
            info!("event=relationship_remove module=adapter status=ok removed={removed}");
        }
        Ok(removed > 0)
    }

    /// Edges whose `entityId` is not among `known_entity_ids`.
    pub async fn find_dangling(&self, known_entity_ids: &[String]) -> StoreResult<Vec<Relationship>> {
        let known: HashSet<&str> = known_entity_ids.iter().map(String::as_str).collect();
        let mut edges = self.base.get_all().await?;
        edges.retain(|edge| !known.contains(edge.entity_id.as_str()));
        Ok(edges)
    }
}

impl Deref for RelationshipAdapter {
    type Target = BaseAdapter<Relationship>;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}
