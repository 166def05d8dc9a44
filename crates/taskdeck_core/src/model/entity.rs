//! Entity record: the task/note/event items placed on boards and weeks.
//!
//! # Invariants
//! - `id` is stable and never reused.
//! - `tags` and `people` hold ids/names, indexed per element.
//! - Fields this crate does not model are kept in `extra` so documents
//!   written by other modules survive a read-modify-write.

use super::Record;
use crate::schema::ENTITIES;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Priority stored under the `priority` index.
///
/// Values outside the named levels (numbers, other labels) are kept as
/// written so such documents still decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
    #[serde(untagged)]
    Other(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: String,
    /// Entity kind such as `task`, `note` or `event`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board_id: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// ISO-8601 calendar date (`YYYY-MM-DD`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub people: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Entity {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            title: title.into(),
            content: None,
            board_id: None,
            completed: false,
            priority: None,
            due_date: None,
            tags: Vec::new(),
            people: Vec::new(),
            created_at: None,
            updated_at: None,
            extra: Map::new(),
        }
    }

    /// Returns whether `needle` (already lower-cased) occurs in title or content.
    pub fn matches_text(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self
                .content
                .as_deref()
                .is_some_and(|content| content.to_lowercase().contains(needle))
    }
}

impl Record for Entity {
    const COLLECTION: &'static str = ENTITIES;
}

#[cfg(test)]
mod tests {
    use super::{Entity, Priority};
    use serde_json::json;

    #[test]
    fn serializes_kind_as_type_and_keeps_unknown_fields() {
        let document = json!({
            "id": "t1",
            "type": "task",
            "title": "Buy milk",
            "priority": "high",
            "estimate": 3
        });
        let entity: Entity = serde_json::from_value(document).unwrap();
        assert_eq!(entity.kind, "task");
        assert_eq!(entity.priority, Some(Priority::High));
        assert_eq!(entity.extra.get("estimate"), Some(&json!(3)));

        let back = serde_json::to_value(&entity).unwrap();
        assert_eq!(back["type"], "task");
        assert_eq!(back["estimate"], 3);
        assert!(back.get("boardId").is_none());
    }

    #[test]
    fn unnamed_priorities_decode_and_serialize_as_written() {
        let numeric: Entity =
            serde_json::from_value(json!({"id": "t2", "type": "task", "priority": 2})).unwrap();
        assert_eq!(numeric.priority, Some(Priority::Other(json!(2))));
        assert_eq!(serde_json::to_value(&numeric).unwrap()["priority"], 2);

        let label: Entity =
            serde_json::from_value(json!({"id": "t3", "type": "task", "priority": "someday"}))
                .unwrap();
        assert_eq!(label.priority, Some(Priority::Other(json!("someday"))));
    }
}
