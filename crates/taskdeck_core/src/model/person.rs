//! Person record for the lightweight contacts view.

use super::Record;
use crate::schema::PEOPLE;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Free-form label such as `colleague`, `client` or `friend`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_type: Option<String>,
    /// Epoch milliseconds of the last recorded interaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_interaction: Option<i64>,
    /// Desired contact cadence such as `weekly`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interaction_frequency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl Person {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: None,
            company: None,
            tags: Vec::new(),
            relationship_type: None,
            last_interaction: None,
            interaction_frequency: None,
            created_at: None,
            updated_at: None,
        }
    }
}

impl Record for Person {
    const COLLECTION: &'static str = PEOPLE;
}
