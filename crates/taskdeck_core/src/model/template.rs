//! Reusable templates and the nested template library.
//!
//! # Responsibility
//! - `Template` is a first-class collection record.
//! - `TaskSet`, `Checklist` and `NoteTemplate` live inside one
//!   `TemplateLibrary` document stored in the metadata collection.
//!
//! # Invariants
//! - Library maps are keyed by the item's own `id`.
//! - Template bodies are opaque here; their meaning belongs to the
//!   template-content module.

use super::Record;
use crate::schema::TEMPLATES;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Template kind such as `board`, `task` or `note`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Structural/content snapshot applied by the template-content module.
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub usage_count: u64,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl Template {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            kind: kind.into(),
            category: None,
            tags: Vec::new(),
            content: Value::Null,
            usage_count: 0,
            hidden: false,
            last_used: None,
            created_at: None,
            updated_at: None,
        }
    }
}

impl Record for Template {
    const COLLECTION: &'static str = TEMPLATES;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TaskSetItem {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TaskSet {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub tasks: Vec<TaskSetItem>,
    pub usage_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChecklistItem {
    pub text: String,
    pub required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Checklist {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub items: Vec<ChecklistItem>,
    pub usage_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NoteTemplate {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub body: String,
    pub usage_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

/// Container document nesting every library item map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TemplateLibrary {
    pub task_sets: BTreeMap<String, TaskSet>,
    pub checklists: BTreeMap<String, Checklist>,
    pub note_templates: BTreeMap<String, NoteTemplate>,
}

/// Item kind stored inside [`TemplateLibrary`].
pub trait LibraryItem: Clone + Serialize + DeserializeOwned + Send + 'static {
    /// Prefix used for generated ids.
    const ID_PREFIX: &'static str;

    fn entries(library: &TemplateLibrary) -> &BTreeMap<String, Self>;
    fn entries_mut(library: &mut TemplateLibrary) -> &mut BTreeMap<String, Self>;
    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn usage_count_mut(&mut self) -> &mut u64;
    fn stamp(&mut self, now_ms: i64);
    /// Carries `createdAt` over from the version being replaced.
    fn keep_created_at(&mut self, previous: &Self);
}

macro_rules! library_item {
    ($item:ty, $prefix:literal, $field:ident) => {
        impl LibraryItem for $item {
            const ID_PREFIX: &'static str = $prefix;

            fn entries(library: &TemplateLibrary) -> &BTreeMap<String, Self> {
                &library.$field
            }

            fn entries_mut(library: &mut TemplateLibrary) -> &mut BTreeMap<String, Self> {
                &mut library.$field
            }

            fn id(&self) -> &str {
                &self.id
            }

            fn set_id(&mut self, id: String) {
                self.id = id;
            }

            fn usage_count_mut(&mut self) -> &mut u64 {
                &mut self.usage_count
            }

            fn stamp(&mut self, now_ms: i64) {
                self.created_at.get_or_insert(now_ms);
                self.updated_at = Some(now_ms);
            }

            fn keep_created_at(&mut self, previous: &Self) {
                if previous.created_at.is_some() {
                    self.created_at = previous.created_at;
                }
            }
        }
    };
}

library_item!(TaskSet, "taskset", task_sets);
library_item!(Checklist, "checklist", checklists);
library_item!(NoteTemplate, "notetpl", note_templates);
