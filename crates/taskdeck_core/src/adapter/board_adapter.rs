//! Board structure adapter over `boards`, `groups`, `rows` and `columns`.
//!
//! # Responsibility
//! - CRUD for each structural kind and per-board listings.
//! - Assemble a [`BoardStructure`] read model.
//!
//! # Invariants
//! - `save_row` rejects a `groupId` that is missing or belongs to another
//!   board; the check and the write share one transaction.
//! - `save_column` rejects a `key` already used by another column of the
//!   same board.
//! - Deletes never cascade; callers remove dependents explicitly.

use super::base::{decode, stamp};
use super::BaseAdapter;
use crate::db::{StorageEngine, StoreError, StoreResult, TxMode};
use crate::model::board::{Board, BoardStructure, Column, Group, Row};
use crate::schema::{COLUMNS, GROUPS, ROWS};
use serde_json::json;
use std::ops::Deref;

#[derive(Clone)]
pub struct BoardAdapter {
    boards: BaseAdapter<Board>,
    groups: BaseAdapter<Group>,
    rows: BaseAdapter<Row>,
    columns: BaseAdapter<Column>,
}

impl BoardAdapter {
    pub fn new(engine: StorageEngine) -> Self {
        Self {
            boards: BaseAdapter::new(engine.clone()),
            groups: BaseAdapter::new(engine.clone()),
            rows: BaseAdapter::new(engine.clone()),
            columns: BaseAdapter::new(engine),
        }
    }

    pub async fn save_board(&self, board: &Board) -> StoreResult<Board> {
        self.boards.save(board).await
    }

    pub async fn get_board(&self, id: &str) -> StoreResult<Option<Board>> {
        self.boards.get_by_id(id).await
    }

    pub async fn delete_board(&self, id: &str) -> StoreResult<bool> {
        self.boards.delete(id).await
    }

    pub async fn get_all_boards(&self) -> StoreResult<Vec<Board>> {
        self.boards.get_all().await
    }

    /// Exact name lookup; the first match by id wins when names repeat.
    pub async fn get_board_by_name(&self, name: &str) -> StoreResult<Option<Board>> {
        Ok(self.boards.get_by_index("name", name).await?.into_iter().next())
    }

    pub async fn save_group(&self, group: &Group) -> StoreResult<Group> {
        self.groups.save(group).await
    }

    pub async fn get_group(&self, id: &str) -> StoreResult<Option<Group>> {
        self.groups.get_by_id(id).await
    }

    pub async fn delete_group(&self, id: &str) -> StoreResult<bool> {
        self.groups.delete(id).await
    }

    pub async fn get_groups(&self, board_id: &str) -> StoreResult<Vec<Group>> {
        let mut groups = self.groups.get_by_index("boardId", board_id).await?;
        groups.sort_by(|left, right| (left.order, &left.id).cmp(&(right.order, &right.id)));
        Ok(groups)
    }

    /// Saves a row after checking its group reference.
    ///
    /// # Errors
    /// - `InvalidOperation` when `groupId` names a missing group or a group
    ///   of another board.
    pub async fn save_row(&self, row: &Row) -> StoreResult<Row> {
        let engine = self.rows.engine().clone();
        let mut document = serde_json::to_value(row)?;
        stamp(&mut document, engine.now_ms())?;
        let group_id = row.group_id.clone();
        let board_id = row.board_id.clone();
        engine.open().await?;
        engine
            .transaction(&[ROWS, GROUPS], TxMode::ReadWrite)?
            .run(move |tx| {
                if let Some(group_id) = group_id {
                    let group: Option<Group> = tx
                        .get(GROUPS, &group_id)?
                        .map(|value| decode(GROUPS, value))
                        .transpose()?;
                    match group {
                        Some(group) if group.board_id == board_id => {}
                        Some(group) => {
                            return Err(StoreError::InvalidOperation(format!(
                                "group `{group_id}` belongs to board `{}`, not `{board_id}`",
                                group.board_id
                            )))
                        }
                        None => {
                            return Err(StoreError::InvalidOperation(format!(
                                "group `{group_id}` does not exist"
                            )))
                        }
                    }
                }
                tx.put(ROWS, &document)?;
                decode(ROWS, document)
            })
            .await
    }

    pub async fn get_row(&self, id: &str) -> StoreResult<Option<Row>> {
        self.rows.get_by_id(id).await
    }

    pub async fn delete_row(&self, id: &str) -> StoreResult<bool> {
        self.rows.delete(id).await
    }

    pub async fn get_rows(&self, board_id: &str) -> StoreResult<Vec<Row>> {
        let mut rows = self.rows.get_by_index("boardId", board_id).await?;
        rows.sort_by(|left, right| (left.order, &left.id).cmp(&(right.order, &right.id)));
        Ok(rows)
    }

    pub async fn get_rows_in_group(&self, group_id: &str) -> StoreResult<Vec<Row>> {
        let mut rows = self.rows.get_by_index("groupId", group_id).await?;
        rows.sort_by(|left, right| (left.order, &left.id).cmp(&(right.order, &right.id)));
        Ok(rows)
    }

    /// Saves a column after checking key uniqueness within its board.
    ///
    /// # Errors
    /// - `InvalidOperation` when another column of the board uses the key.
    pub async fn save_column(&self, column: &Column) -> StoreResult<Column> {
        let engine = self.columns.engine().clone();
        let mut document = serde_json::to_value(column)?;
        stamp(&mut document, engine.now_ms())?;
        let lookup = json!([column.board_id, column.key]);
        let id = column.id.clone();
        engine.open().await?;
        engine
            .transaction(&[COLUMNS], TxMode::ReadWrite)?
            .run(move |tx| {
                let clash = tx
                    .get_by_index(COLUMNS, "boardId_key", &lookup)?
                    .into_iter()
                    .filter_map(|value| decode::<Column>(COLUMNS, value).ok())
                    .find(|existing| existing.id != id);
                if let Some(existing) = clash {
                    return Err(StoreError::InvalidOperation(format!(
                        "column key `{}` is already used by column `{}` in board `{}`",
                        existing.key, existing.id, existing.board_id
                    )));
                }
                tx.put(COLUMNS, &document)?;
                decode(COLUMNS, document)
            })
            .await
    }

    pub async fn get_column(&self, id: &str) -> StoreResult<Option<Column>> {
        self.columns.get_by_id(id).await
    }

    pub async fn delete_column(&self, id: &str) -> StoreResult<bool> {
        self.columns.delete(id).await
    }

    /// Columns of one board ordered by `order`, then id.
    pub async fn get_columns(&self, board_id: &str) -> StoreResult<Vec<Column>> {
        let mut columns = self.columns.get_by_index("boardId", board_id).await?;
        columns.sort_by(|left, right| (left.order, &left.id).cmp(&(right.order, &right.id)));
        Ok(columns)
    }

    pub async fn get_column_by_key(&self, board_id: &str, key: &str) -> StoreResult<Option<Column>> {
        let columns = self
            .columns
            .get_by_index("boardId_key", json!([board_id, key]))
            .await?;
        Ok(columns.into_iter().next())
    }

    /// Loads one board with its groups, rows and columns.
    ///
    /// Returns `None` when the board does not exist.
    pub async fn get_board_structure(&self, board_id: &str) -> StoreResult<Option<BoardStructure>> {
        let Some(board) = self.get_board(board_id).await? else {
            return Ok(None);
        };
        Ok(Some(BoardStructure {
            board,
            groups: self.get_groups(board_id).await?,
            rows: self.get_rows(board_id).await?,
            columns: self.get_columns(board_id).await?,
        }))
    }
}

impl Deref for BoardAdapter {
    type Target = BaseAdapter<Board>;

    fn deref(&self) -> &Self::Target {
        &self.boards
    }
}
