//! Typed records stored in the document collections.
//!
//! # Responsibility
//! - Define one record shape per collection, serialized in camelCase.
//! - Bind each record type to its collection name.
//!
//! # Invariants
//! - Field names match the index fields declared in `schema`.
//! - `createdAt`/`updatedAt` are epoch milliseconds stamped by the adapter
//!   layer, never by callers.
//!
//! # See also
//! - `crate::schema` for keys and indexes.

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

pub mod board;
pub mod collection;
pub mod entity;
pub mod metadata;
pub mod person;
pub mod position;
pub mod relationship;
pub mod tag;
pub mod template;
pub mod weekly;

/// Record type bound to one collection.
pub trait Record: Serialize + DeserializeOwned + Send + 'static {
    const COLLECTION: &'static str;
}

const ID_SUFFIX_LEN: usize = 9;

/// Generates a synthetic unique id: `<prefix>_<epoch ms>_<random suffix>`.
pub fn generate_id(prefix: &str, now_ms: i64) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("{prefix}_{now_ms}_{}", &random[..ID_SUFFIX_LEN])
}
