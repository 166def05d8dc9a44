//! Tag record.
//!
//! # Invariants
//! - `name` is stored trimmed and lower-cased; it acts as a soft unique key
//!   enforced by the tags adapter, not by the store.
//! - `parent`, when set, names another tag id and forms a tree.

use super::Record;
use crate::schema::TAGS;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default)]
    pub usage_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl Record for Tag {
    const COLLECTION: &'static str = TAGS;
}

/// Input for `TagsAdapter::create_tag`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTag {
    pub name: String,
    pub color: Option<String>,
    pub category: Option<String>,
    pub parent: Option<String>,
}

impl NewTag {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// One node of the tag tree returned by `TagsAdapter::get_tag_tree`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagNode {
    pub tag: Tag,
    pub children: Vec<TagNode>,
}

/// Normalizes a tag name: trimmed and lower-cased. Blank names yield `None`.
pub fn normalize_tag_name(name: &str) -> Option<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::normalize_tag_name;

    #[test]
    fn normalization_trims_and_lowercases() {
        assert_eq!(normalize_tag_name(" WORK ").as_deref(), Some("work"));
        assert_eq!(normalize_tag_name("Deep Work").as_deref(), Some("deep work"));
        assert_eq!(normalize_tag_name("   "), None);
    }
}
