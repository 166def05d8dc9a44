//! Board structure records: Board → Groups → Rows → (Row × Column) cells.
//!
//! # Invariants
//! - Groups, rows and columns reference their board through `boardId`.
//! - A row's `groupId`, when set, names a group of the same board.
//! - Column `key` is unique within one board.

use super::Record;
use crate::schema::{BOARDS, COLUMNS, GROUPS, ROWS};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Column keys in display order.
    #[serde(default)]
    pub column_order: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Board {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            column_order: Vec::new(),
            created_at: None,
            updated_at: None,
            extra: Map::new(),
        }
    }
}

impl Record for Board {
    const COLLECTION: &'static str = BOARDS;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub board_id: String,
    pub name: String,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl Group {
    pub fn new(id: impl Into<String>, board_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            board_id: board_id.into(),
            name: name.into(),
            order: 0,
            collapsed: false,
            created_at: None,
            updated_at: None,
        }
    }
}

impl Record for Group {
    const COLLECTION: &'static str = GROUPS;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    pub id: String,
    pub board_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub order: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl Row {
    pub fn new(id: impl Into<String>, board_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            board_id: board_id.into(),
            group_id: None,
            name: name.into(),
            order: 0,
            created_at: None,
            updated_at: None,
        }
    }
}

impl Record for Row {
    const COLLECTION: &'static str = ROWS;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: String,
    pub board_id: String,
    /// Stable key used by entity positions (`columnKey`).
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub order: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl Column {
    pub fn new(
        id: impl Into<String>,
        board_id: impl Into<String>,
        key: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            board_id: board_id.into(),
            key: key.into(),
            name: name.into(),
            order: 0,
            color: None,
            created_at: None,
            updated_at: None,
        }
    }
}

impl Record for Column {
    const COLLECTION: &'static str = COLUMNS;
}

/// Read model joining one board with its full structure.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardStructure {
    pub board: Board,
    /// Sorted by `order ASC, id ASC`.
    pub groups: Vec<Group>,
    /// Sorted by `order ASC, id ASC`.
    pub rows: Vec<Row>,
    /// Sorted by `order ASC, id ASC`.
    pub columns: Vec<Column>,
}
