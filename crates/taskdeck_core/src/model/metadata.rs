use super::Record;
use crate::schema::METADATA;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Generic key-value record backing settings, feature flags and the
/// template library container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRecord {
    pub key: String,
    pub category: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl MetadataRecord {
    pub fn new(key: impl Into<String>, category: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            category: category.into(),
            value,
            created_at: None,
            updated_at: None,
        }
    }
}

impl Record for MetadataRecord {
    const COLLECTION: &'static str = METADATA;
}
