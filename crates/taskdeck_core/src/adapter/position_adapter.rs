//! Entity placement adapter.
//!
//! # Responsibility
//! - Place, move and order entities inside board/context/row/column cells.
//! - Report entities that lack a placement so callers can repair them.
//!
//! # Invariants
//! - At most one record per `(entityId, boardId, context)`; the composite
//!   primary key enforces it, so `set_position` doubles as "move".
//! - Cell listings are stable-sorted by `order`.
//! - Deleting an entity does not remove its placements; use
//!   `remove_positions_for_entity` or `get_orphaned_entities`.

use super::base::{decode, decode_listing, stamp};
use super::BaseAdapter;
use crate::db::{StorageEngine, StoreError, StoreResult, TxMode};
use crate::model::position::{position_key, EntityPosition};
use crate::schema::ENTITY_POSITIONS;
use log::info;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::ops::Deref;

#[derive(Clone)]
pub struct EntityPositionAdapter {
    base: BaseAdapter<EntityPosition>,
}

impl EntityPositionAdapter {
    pub fn new(engine: StorageEngine) -> Self {
        Self {
            base: BaseAdapter::new(engine),
        }
    }

    /// Places `entity_id` in one cell, replacing any previous placement in
    /// the same board and context.
    pub async fn set_position(
        &self,
        entity_id: &str,
        board_id: &str,
        context: &str,
        row_id: Option<&str>,
        column_key: &str,
        order: f64,
    ) -> StoreResult<EntityPosition> {
        let position = EntityPosition::new(
            entity_id,
            board_id,
            context,
            row_id.map(str::to_string),
            column_key,
            order,
        );
        let key = position.id.clone();
        let stored = self
            .base
            .upsert_with(&key, move |current| {
                let mut next = position;
                next.created_at = current.and_then(|previous| previous.created_at);
                Ok(Some(next))
            })
            .await?;
        stored.ok_or_else(|| {
            StoreError::TransactionAborted(format!("position `{key}` was not written"))
        })
    }

    pub async fn get_position(
        &self,
        entity_id: &str,
        board_id: &str,
        context: &str,
    ) -> StoreResult<Option<EntityPosition>> {
        self.base
            .get_by_id(&position_key(entity_id, board_id, context))
            .await
    }

    pub async fn get_positions_for_entity(&self, entity_id: &str) -> StoreResult<Vec<EntityPosition>> {
        self.base.get_by_index("entityId", entity_id).await
    }

    pub async fn get_positions_for_board(&self, board_id: &str) -> StoreResult<Vec<EntityPosition>> {
        self.base.get_by_index("boardId", board_id).await
    }

    /// Entity ids placed in one cell, ordered by `order`.
    ///
    /// Linear scan over the collection; ties keep primary-key order.
    pub async fn get_entities_in_position(
        &self,
        board_id: &str,
        context: &str,
        row_id: Option<&str>,
        column_key: &str,
    ) -> StoreResult<Vec<String>> {
        let positions = self.base.get_all().await?;
        Ok(cell_members(positions, board_id, context, row_id, column_key)
            .into_iter()
            .map(|position| position.entity_id)
            .collect())
    }

    /// Rewrites the cell order so `ordered_ids` get ranks `0..n`.
    ///
    /// Entities in the cell but absent from `ordered_ids` keep their relative
    /// order after the listed ones. Ids not in the cell are ignored. Returns
    /// the cell after reordering.
    pub async fn reorder_cell(
        &self,
        board_id: &str,
        context: &str,
        row_id: Option<&str>,
        column_key: &str,
        ordered_ids: &[String],
    ) -> StoreResult<Vec<EntityPosition>> {
        let board_id = board_id.to_string();
        let context = context.to_string();
        let row_id = row_id.map(str::to_string);
        let column_key = column_key.to_string();
        let ranks: HashMap<String, usize> = ordered_ids
            .iter()
            .enumerate()
            .map(|(rank, id)| (id.clone(), rank))
            .collect();
        let engine = self.base.engine().clone();
        let now = engine.now_ms();
        engine.open().await?;
        engine
            .transaction(&[ENTITY_POSITIONS], TxMode::ReadWrite)?
            .run(move |tx| {
                let board_value = Value::String(board_id.clone());
                let positions: Vec<EntityPosition> = decode_listing(
                    ENTITY_POSITIONS,
                    tx.get_by_index(ENTITY_POSITIONS, "boardId", &board_value)?,
                );
                let mut cell =
                    cell_members(positions, &board_id, &context, row_id.as_deref(), &column_key);
                // Listed ids first by rank, the rest after in current order.
                cell.sort_by_key(|position| {
                    ranks
                        .get(&position.entity_id)
                        .copied()
                        .unwrap_or(usize::MAX)
                });
                let mut reordered = Vec::with_capacity(cell.len());
                for (rank, mut position) in cell.into_iter().enumerate() {
                    position.order = rank as f64;
                    let mut document = serde_json::to_value(&position)?;
                    stamp(&mut document, now)?;
                    tx.put(ENTITY_POSITIONS, &document)?;
                    reordered.push(decode(ENTITY_POSITIONS, document)?);
                }
                Ok(reordered)
            })
            .await
    }

    pub async fn remove_position(
        &self,
        entity_id: &str,
        board_id: &str,
        context: &str,
    ) -> StoreResult<bool> {
        self.base
            .delete(&position_key(entity_id, board_id, context))
            .await
    }

    /// Removes every placement of one entity; returns how many were removed.
    pub async fn remove_positions_for_entity(&self, entity_id: &str) -> StoreResult<usize> {
        let entity_value = Value::String(entity_id.to_string());
        let engine = self.base.engine().clone();
        engine.open().await?;
        let removed = engine
            .transaction(&[ENTITY_POSITIONS], TxMode::ReadWrite)?
            .run(move |tx| {
                let mut removed = 0usize;
                for document in tx.get_by_index(ENTITY_POSITIONS, "entityId", &entity_value)? {
                    if let Some(key) = document.get("id").and_then(Value::as_str) {
                        tx.delete(ENTITY_POSITIONS, key)?;
                        removed += 1;
                    }
                }
                Ok(removed)
            })
            .await?;
        info!(
            "event=positions_remove module=adapter status=ok entity_id={entity_id} removed={removed}"
        );
        Ok(removed)
    }

    /// Ids from `all_entity_ids` with no placement in `board_id`/`context`,
    /// in input order.
    pub async fn get_orphaned_entities(
        &self,
        all_entity_ids: &[String],
        board_id: &str,
        context: &str,
    ) -> StoreResult<Vec<String>> {
        let placed: HashSet<String> = self
            .get_positions_for_board(board_id)
            .await?
            .into_iter()
            .filter(|position| position.context == context)
            .map(|position| position.entity_id)
            .collect();
        Ok(all_entity_ids
            .iter()
            .filter(|id| !placed.contains(id.as_str()))
            .cloned()
            .collect())
    }
}

fn cell_members(
    positions: Vec<EntityPosition>,
    board_id: &str,
    context: &str,
    row_id: Option<&str>,
    column_key: &str,
) -> Vec<EntityPosition> {
    let mut cell: Vec<EntityPosition> = positions
        .into_iter()
        .filter(|position| position.is_in_cell(board_id, context, row_id, column_key))
        .collect();
    cell.sort_by(|left, right| left.order.total_cmp(&right.order));
    cell
}

impl Deref for EntityPositionAdapter {
    type Target = BaseAdapter<EntityPosition>;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

#[cfg(test)]
mod tests {
    use super::cell_members;
    use crate::model::position::EntityPosition;

    #[test]
    fn cell_members_filter_and_sort_stably() {
        let positions = vec![
            EntityPosition::new("a", "b1", "board", None, "todo", 2.0),
            EntityPosition::new("b", "b1", "board", None, "todo", 1.0),
            EntityPosition::new("c", "b1", "board", None, "todo", 1.0),
            EntityPosition::new("d", "b1", "board", None, "done", 0.0),
            EntityPosition::new("e", "b1", "list", None, "todo", 0.0),
        ];
        let ids: Vec<_> = cell_members(positions, "b1", "board", None, "todo")
            .into_iter()
            .map(|position| position.entity_id)
            .collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }
}
