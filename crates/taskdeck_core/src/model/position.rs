//! Entity placement within a board/context/row/column coordinate space.
//!
//! # Invariants
//! - `id` is derived from `(entityId, boardId, context)`; one record per triple.
//! - Distinct triples never share an `id`, even when parts contain `::`.
//! - `order` ranks entities inside one cell only and may be sparse.

use super::Record;
use crate::schema::ENTITY_POSITIONS;
use serde::{Deserialize, Serialize};

const KEY_SEPARATOR: &str = "::";

/// Builds the composite primary key for one placement.
///
/// Each part is escaped (`%` as `%25`, `:` as `%3A`) before joining, so the
/// separator only ever appears between parts.
pub fn position_key(entity_id: &str, board_id: &str, context: &str) -> String {
    [entity_id, board_id, context]
        .iter()
        .map(|part| escape_key_part(part))
        .collect::<Vec<_>>()
        .join(KEY_SEPARATOR)
}

fn escape_key_part(part: &str) -> String {
    let mut escaped = String::with_capacity(part.len());
    for ch in part.chars() {
        match ch {
            '%' => escaped.push_str("%25"),
            ':' => escaped.push_str("%3A"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityPosition {
    pub id: String,
    pub entity_id: String,
    pub board_id: String,
    /// View context such as `board`, `list` or `week`.
    pub context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_id: Option<String>,
    pub column_key: String,
    #[serde(default)]
    pub order: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl EntityPosition {
    pub fn new(
        entity_id: impl Into<String>,
        board_id: impl Into<String>,
        context: impl Into<String>,
        row_id: Option<String>,
        column_key: impl Into<String>,
        order: f64,
    ) -> Self {
        let entity_id = entity_id.into();
        let board_id = board_id.into();
        let context = context.into();
        Self {
            id: position_key(&entity_id, &board_id, &context),
            entity_id,
            board_id,
            context,
            row_id,
            column_key: column_key.into(),
            order,
            created_at: None,
            updated_at: None,
        }
    }

    /// Returns whether this placement sits in the given cell.
    pub fn is_in_cell(
        &self,
        board_id: &str,
        context: &str,
        row_id: Option<&str>,
        column_key: &str,
    ) -> bool {
        self.board_id == board_id
            && self.context == context
            && self.row_id.as_deref() == row_id
            && self.column_key == column_key
    }
}

impl Record for EntityPosition {
    const COLLECTION: &'static str = ENTITY_POSITIONS;
}
