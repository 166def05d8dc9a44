use super::Record;
use crate::schema::ENTITY_RELATIONSHIPS;
use serde::{Deserialize, Serialize};

/// Labeled edge between an entity and a person or another entity.
///
/// Edges are not unique per pair; duplicates are possible unless callers
/// de-duplicate before creating one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub id: String,
    pub entity_id: String,
    pub related_id: String,
    pub relationship_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl Record for Relationship {
    const COLLECTION: &'static str = ENTITY_RELATIONSHIPS;
}
