//! Consistency audit between the adapter-backed store and a legacy
//! in-memory representation.
//!
//! # Responsibility
//! - Diff entities and boards per record and per comparison field.
//! - Never write to either side.
//!
//! # Invariants
//! - An absent field compares equal to `null`.
//! - Array fields compare as multisets; absent or `null` reads as `[]`.
//! - `overall_valid` holds only when every result has no missing, extra or
//!   different records.

use crate::adapter::BaseAdapter;
use crate::db::{StorageEngine, StoreResult};
use crate::schema::{BOARDS, ENTITIES};
use log::{error, info};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

const ENTITY_FIELDS: &[&str] = &[
    "type",
    "title",
    "content",
    "boardId",
    "completed",
    "priority",
    "dueDate",
];
const ENTITY_MULTISETS: &[&str] = &["tags", "people"];
const BOARD_FIELDS: &[&str] = &["name", "description"];
const BOARD_MULTISETS: &[&str] = &["columnOrder"];

/// Record kinds the validator knows how to compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Entity,
    Board,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Entity => "entity",
            Self::Board => "board",
        }
    }

    fn fields(self) -> (&'static [&'static str], &'static [&'static str]) {
        match self {
            Self::Entity => (ENTITY_FIELDS, ENTITY_MULTISETS),
            Self::Board => (BOARD_FIELDS, BOARD_MULTISETS),
        }
    }
}

/// Legacy in-memory maps keyed by record id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacySnapshot {
    pub entities: BTreeMap<String, Value>,
    pub boards: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDifference {
    pub field: String,
    pub legacy: Value,
    pub store: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordDifference {
    pub id: String,
    pub fields: Vec<FieldDifference>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub kind: RecordKind,
    pub legacy_count: usize,
    pub store_count: usize,
    /// Ids present in legacy only.
    pub missing: Vec<String>,
    /// Ids present in the store only.
    pub extra: Vec<String>,
    pub different: Vec<RecordDifference>,
    pub matching: usize,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty() && self.different.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyReport {
    pub results: Vec<ValidationResult>,
    pub overall_valid: bool,
}

/// On-demand auditor. Reads stored documents as written; no state between runs.
#[derive(Clone)]
pub struct ConsistencyValidator {
    engine: StorageEngine,
}

impl ConsistencyValidator {
    pub fn new(engine: StorageEngine) -> Self {
        Self { engine }
    }

    /// Runs every record-kind validation concurrently.
    pub async fn validate_consistency(&self, legacy: &LegacySnapshot) -> StoreResult<ConsistencyReport> {
        let (entities, boards) = tokio::join!(
            self.validate_entities(&legacy.entities),
            self.validate_boards(&legacy.boards)
        );
        let results = vec![entities?, boards?];
        let overall_valid = results.iter().all(ValidationResult::is_valid);
        info!(
            "event=consistency_check module=validator status={} results={}",
            if overall_valid { "ok" } else { "diverged" },
            results.len()
        );
        Ok(ConsistencyReport {
            results,
            overall_valid,
        })
    }

    pub async fn validate_entities(
        &self,
        legacy: &BTreeMap<String, Value>,
    ) -> StoreResult<ValidationResult> {
        let stored = self.stored_documents(RecordKind::Entity, ENTITIES).await?;
        Ok(compare(RecordKind::Entity, legacy, &stored))
    }

    pub async fn validate_boards(
        &self,
        legacy: &BTreeMap<String, Value>,
    ) -> StoreResult<ValidationResult> {
        let stored = self.stored_documents(RecordKind::Board, BOARDS).await?;
        Ok(compare(RecordKind::Board, legacy, &stored))
    }

    /// Stored documents as written, keyed by `id`.
    async fn stored_documents(
        &self,
        kind: RecordKind,
        collection: &str,
    ) -> StoreResult<BTreeMap<String, Value>> {
        let raw: BaseAdapter<Value> = BaseAdapter::for_collection(self.engine.clone(), collection)?;
        let documents = raw.get_all().await.map_err(|err| {
            error!(
                "event=consistency_check module=validator status=error kind={} error={err}",
                kind.as_str()
            );
            err
        })?;
        Ok(documents
            .into_iter()
            .filter_map(|document| {
                let id = document.get("id")?.as_str()?.to_string();
                Some((id, document))
            })
            .collect())
    }
}

fn compare(
    kind: RecordKind,
    legacy: &BTreeMap<String, Value>,
    stored: &BTreeMap<String, Value>,
) -> ValidationResult {
    let (fields, multisets) = kind.fields();
    let mut result = ValidationResult {
        kind,
        legacy_count: legacy.len(),
        store_count: stored.len(),
        missing: Vec::new(),
        extra: stored
            .keys()
            .filter(|id| !legacy.contains_key(*id))
            .cloned()
            .collect(),
        different: Vec::new(),
        matching: 0,
    };

    for (id, legacy_record) in legacy {
        let Some(stored_record) = stored.get(id) else {
            result.missing.push(id.clone());
            continue;
        };
        let mut differences = Vec::new();
        for field in fields {
            let left = field_value(legacy_record, field);
            let right = field_value(stored_record, field);
            if left != right {
                differences.push(FieldDifference {
                    field: (*field).to_string(),
                    legacy: left,
                    store: right,
                });
            }
        }
        for field in multisets {
            let left = field_value(legacy_record, field);
            let right = field_value(stored_record, field);
            if multiset(&left) != multiset(&right) {
                differences.push(FieldDifference {
                    field: (*field).to_string(),
                    legacy: left,
                    store: right,
                });
            }
        }
        if differences.is_empty() {
            result.matching += 1;
        } else {
            result.different.push(RecordDifference {
                id: id.clone(),
                fields: differences,
            });
        }
    }
    result
}

fn field_value(record: &Value, field: &str) -> Value {
    record.get(field).cloned().unwrap_or(Value::Null)
}

/// Sorted canonical encodings of the array elements.
fn multiset(value: &Value) -> Vec<String> {
    let mut elements: Vec<String> = match value {
        Value::Array(items) => items.iter().map(Value::to_string).collect(),
        Value::Null => Vec::new(),
        other => vec![other.to_string()],
    };
    elements.sort();
    elements
}
