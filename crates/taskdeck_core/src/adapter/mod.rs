//! Record adapters layered over the storage engine.
//!
//! # Responsibility
//! - `BaseAdapter` provides CRUD and index queries for one collection.
//! - Specialized adapters compose it and add domain queries/workflows.
//!
//! # Invariants
//! - Adapters never manage engine lifecycle; every call opens on demand.
//! - Read-modify-write workflows run inside one read-write transaction.
//!
//! # See also
//! - `crate::schema` for the collections and indexes adapters rely on.

pub mod base;
pub mod board_adapter;
pub mod collection_adapter;
pub mod entity_adapter;
pub mod filter;
pub mod metadata_adapter;
pub mod people_adapter;
pub mod position_adapter;
pub mod relationship_adapter;
pub mod tag_adapter;
pub mod template_adapter;
pub mod template_library_adapter;
pub mod weekly_adapter;

pub use base::BaseAdapter;
pub use board_adapter::BoardAdapter;
pub use collection_adapter::CollectionsAdapter;
pub use entity_adapter::EntityAdapter;
pub use filter::{ListQuery, SortBy, SortDirection};
pub use metadata_adapter::{MetadataAdapter, SettingsAdapter};
pub use people_adapter::PeopleAdapter;
pub use position_adapter::EntityPositionAdapter;
pub use relationship_adapter::RelationshipAdapter;
pub use tag_adapter::TagsAdapter;
pub use template_adapter::TemplateAdapter;
pub use template_library_adapter::TemplateLibraryAdapter;
pub use weekly_adapter::WeeklyAdapter;
