//! Collection schema registry.
//!
//! # Responsibility
//! - Declare every collection's primary-key field and secondary indexes.
//! - Answer shape lookups for the storage engine and tests.
//!
//! # Invariants
//! - Declaration order is stable; upgrades create collections in this order.
//! - Index names are unique within one collection.
//! - Multi-entry indexes always cover exactly one field.
//! - Schemas are additive: a collection or index is never removed once
//!   shipped under a version.

use crate::db::{StoreError, StoreResult};

/// Current schema version requested by this binary.
pub const SCHEMA_VERSION: u32 = 3;

/// One secondary index over a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexDescriptor {
    pub name: &'static str,
    /// Indexed field paths. More than one field makes a compound index.
    pub fields: &'static [&'static str],
    pub unique: bool,
    /// Array-valued field indexed once per element.
    pub multi_entry: bool,
}

/// Declared shape of one collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionDescriptor {
    pub name: &'static str,
    pub primary_key: &'static str,
    pub indexes: &'static [IndexDescriptor],
}

impl CollectionDescriptor {
    /// Looks up one declared index.
    ///
    /// # Errors
    /// - `IndexNotFound` when the collection does not declare `name`.
    pub fn index(&self, name: &str) -> StoreResult<&'static IndexDescriptor> {
        self.indexes
            .iter()
            .find(|index| index.name == name)
            .ok_or_else(|| StoreError::IndexNotFound {
                collection: self.name.to_string(),
                index: name.to_string(),
            })
    }

    /// Returns whether `name` is a declared index.
    pub fn has_index(&self, name: &str) -> bool {
        self.indexes.iter().any(|index| index.name == name)
    }
}

const fn idx(name: &'static str, fields: &'static [&'static str]) -> IndexDescriptor {
    IndexDescriptor {
        name,
        fields,
        unique: false,
        multi_entry: false,
    }
}

const fn multi(name: &'static str, fields: &'static [&'static str]) -> IndexDescriptor {
    IndexDescriptor {
        name,
        fields,
        unique: false,
        multi_entry: true,
    }
}

pub const ENTITIES: &str = "entities";
pub const BOARDS: &str = "boards";
pub const GROUPS: &str = "groups";
pub const ROWS: &str = "rows";
pub const COLUMNS: &str = "columns";
pub const ENTITY_POSITIONS: &str = "entityPositions";
pub const PEOPLE: &str = "people";
pub const ENTITY_RELATIONSHIPS: &str = "entityRelationships";
pub const COLLECTIONS: &str = "collections";
pub const TAGS: &str = "tags";
pub const WEEKLY_PLANS: &str = "weeklyPlans";
pub const WEEKLY_ITEMS: &str = "weeklyItems";
pub const TEMPLATES: &str = "templates";
pub const METADATA: &str = "metadata";

static REGISTRY: &[CollectionDescriptor] = &[
    CollectionDescriptor {
        name: ENTITIES,
        primary_key: "id",
        indexes: &[
            idx("type", &["type"]),
            idx("boardId", &["boardId"]),
            idx("completed", &["completed"]),
            idx("priority", &["priority"]),
            idx("dueDate", &["dueDate"]),
            multi("tags", &["tags"]),
            multi("people", &["people"]),
        ],
    },
    CollectionDescriptor {
        name: BOARDS,
        primary_key: "id",
        indexes: &[idx("name", &["name"])],
    },
    CollectionDescriptor {
        name: GROUPS,
        primary_key: "id",
        indexes: &[idx("boardId", &["boardId"])],
    },
    CollectionDescriptor {
        name: ROWS,
        primary_key: "id",
        indexes: &[idx("boardId", &["boardId"]), idx("groupId", &["groupId"])],
    },
    CollectionDescriptor {
        name: COLUMNS,
        primary_key: "id",
        indexes: &[
            idx("boardId", &["boardId"]),
            idx("key", &["key"]),
            idx("boardId_key", &["boardId", "key"]),
        ],
    },
    CollectionDescriptor {
        name: ENTITY_POSITIONS,
        primary_key: "id",
        indexes: &[
            idx("entityId", &["entityId"]),
            idx("boardId", &["boardId"]),
            idx("context", &["context"]),
            idx("rowId", &["rowId"]),
            idx("columnKey", &["columnKey"]),
        ],
    },
    CollectionDescriptor {
        name: PEOPLE,
        primary_key: "id",
        indexes: &[
            idx("name", &["name"]),
            idx("email", &["email"]),
            multi("tags", &["tags"]),
            idx("lastInteraction", &["lastInteraction"]),
            idx("relationshipType", &["relationshipType"]),
        ],
    },
    CollectionDescriptor {
        name: ENTITY_RELATIONSHIPS,
        primary_key: "id",
        indexes: &[
            idx("entityId", &["entityId"]),
            idx("relatedId", &["relatedId"]),
            idx("relationshipType", &["relationshipType"]),
        ],
    },
    CollectionDescriptor {
        name: COLLECTIONS,
        primary_key: "id",
        indexes: &[
            idx("name", &["name"]),
            idx("type", &["type"]),
            idx("category", &["category"]),
            idx("updatedAt", &["updatedAt"]),
        ],
    },
    CollectionDescriptor {
        name: TAGS,
        primary_key: "id",
        indexes: &[
            idx("name", &["name"]),
            idx("category", &["category"]),
            idx("parent", &["parent"]),
            idx("usageCount", &["usageCount"]),
        ],
    },
    CollectionDescriptor {
        name: WEEKLY_PLANS,
        primary_key: "weekKey",
        indexes: &[idx("weekStart", &["weekStart"])],
    },
    CollectionDescriptor {
        name: WEEKLY_ITEMS,
        primary_key: "id",
        indexes: &[
            idx("weekKey", &["weekKey"]),
            idx("entityId", &["entityId"]),
            idx("day", &["day"]),
        ],
    },
    CollectionDescriptor {
        name: TEMPLATES,
        primary_key: "id",
        indexes: &[
            idx("name", &["name"]),
            idx("category", &["category"]),
            idx("type", &["type"]),
            idx("usageCount", &["usageCount"]),
        ],
    },
    CollectionDescriptor {
        name: METADATA,
        primary_key: "key",
        indexes: &[idx("category", &["category"]), idx("updatedAt", &["updatedAt"])],
    },
];

/// Returns the descriptor for one collection.
///
/// # Errors
/// - `UnknownCollection` when `name` is not declared.
pub fn describe(name: &str) -> StoreResult<&'static CollectionDescriptor> {
    REGISTRY
        .iter()
        .find(|descriptor| descriptor.name == name)
        .ok_or_else(|| StoreError::UnknownCollection(name.to_string()))
}

/// Returns every declared collection name in declaration order.
pub fn all_collection_names() -> Vec<&'static str> {
    REGISTRY.iter().map(|descriptor| descriptor.name).collect()
}

/// Returns every declared collection descriptor in declaration order.
pub fn all_collections() -> &'static [CollectionDescriptor] {
    REGISTRY
}
