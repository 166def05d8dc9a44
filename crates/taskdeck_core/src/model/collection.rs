//! Saved views ("collections") over entities.
//!
//! # Invariants
//! - `items` is authoritative only for `CollectionKind::Manual`; for the other
//!   kinds it is a cached materialization refreshed externally.
//! - `itemCount` always equals `items.len()` after adapter writes.

use super::Record;
use crate::schema::COLLECTIONS;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    Manual,
    SavedSearch,
    Smart,
}

impl CollectionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::SavedSearch => "saved_search",
            Self::Smart => "smart",
        }
    }
}

/// Filter definition evaluated by the external refresh job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CollectionFilters {
    pub types: Vec<String>,
    pub tags: Vec<String>,
    pub people: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub board_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: CollectionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub filters: CollectionFilters,
    #[serde(default)]
    pub items: Vec<String>,
    #[serde(default)]
    pub item_count: u64,
    #[serde(default)]
    pub auto_update: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    /// Last time `items` changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<i64>,
}

/// Input for `CollectionsAdapter::create_collection`; unset fields take defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewCollection {
    pub name: String,
    pub description: Option<String>,
    /// Defaults to `Manual`.
    pub kind: Option<CollectionKind>,
    pub category: Option<String>,
    pub filters: Option<CollectionFilters>,
    pub items: Vec<String>,
    /// Defaults to `true` for saved searches and smart collections.
    pub auto_update: Option<bool>,
    pub hidden: bool,
}

impl Record for Collection {
    const COLLECTION: &'static str = COLLECTIONS;
}
