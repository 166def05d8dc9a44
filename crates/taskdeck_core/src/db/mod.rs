//! SQLite-backed storage engine for schema-versioned document collections.
//!
//! # Responsibility
//! - Own the single connection to the versioned store.
//! - Create missing collections/indexes on schema upgrade.
//! - Hand out transactions scoped to declared collections.
//!
//! # Invariants
//! - Schema version is tracked via `PRAGMA user_version`.
//! - Upgrades are additive: existing collections are never altered.
//! - No adapter reads or writes data before the open procedure succeeds.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

mod engine;
mod open;
mod tx;
mod upgrade;

pub use engine::{Database, EnginePhase, StorageEngine, TransactionHandle, TxMode};
pub use tx::TxScope;
pub use upgrade::UpgradeReport;

pub type StoreResult<T> = Result<T, StoreError>;

/// Error taxonomy shared by the engine, adapters and validator.
///
/// Cloneable so a single failed open attempt can be reported to every
/// caller that awaited it.
#[derive(Debug, Clone)]
pub enum StoreError {
    /// Host cannot provide a usable transactional store.
    NotSupported(String),
    /// Engine used before `open()` completed or after `close()`.
    NotInitialized,
    /// Another connection holds a lock that prevents the schema upgrade.
    UpgradeBlocked { requested_version: u32 },
    /// Commit failed and the transaction was rolled back.
    TransactionAborted(String),
    /// Engine-reported failure.
    Sqlite(Arc<rusqlite::Error>),
    UnknownCollection(String),
    IndexNotFound { collection: String, index: String },
    /// Domain rule violation, e.g. adding items to a non-manual collection.
    InvalidOperation(String),
    /// Document lacks its collection's primary-key field.
    MissingKey {
        collection: String,
        field: &'static str,
    },
    /// Key or index value cannot be used as a lookup key.
    InvalidKey(String),
    /// Declared collections still absent after the one-shot repair re-open.
    MissingCollections(Vec<String>),
    /// Write attempted inside a read-only transaction.
    ReadOnly(String),
    Serialization(String),
    /// Persisted document cannot be converted into its record type.
    InvalidData(String),
    Timeout(Duration),
    /// Background task running engine work panicked or was cancelled.
    TaskFailed(String),
}

impl StoreError {
    /// Returns whether this error should be shown as a non-fatal warning.
    pub fn is_user_warning(&self) -> bool {
        matches!(self, Self::UpgradeBlocked { .. })
    }

    /// Returns whether this error indicates a caller bug.
    pub fn is_programmer_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownCollection(_) | Self::IndexNotFound { .. } | Self::MissingKey { .. }
        )
    }

    /// Stable machine-readable code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotSupported(_) => "not_supported",
            Self::NotInitialized => "not_initialized",
            Self::UpgradeBlocked { .. } => "upgrade_blocked",
            Self::TransactionAborted(_) => "transaction_aborted",
            Self::Sqlite(_) => "store_error",
            Self::UnknownCollection(_) => "unknown_collection",
            Self::IndexNotFound { .. } => "index_not_found",
            Self::InvalidOperation(_) => "invalid_operation",
            Self::MissingKey { .. } => "missing_key",
            Self::InvalidKey(_) => "invalid_key",
            Self::MissingCollections(_) => "missing_collections",
            Self::ReadOnly(_) => "read_only",
            Self::Serialization(_) => "serialization",
            Self::InvalidData(_) => "invalid_data",
            Self::Timeout(_) => "timeout",
            Self::TaskFailed(_) => "task_failed",
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotSupported(message) => {
                write!(f, "transactional storage is not supported: {message}")
            }
            Self::NotInitialized => write!(f, "storage engine is not initialized"),
            Self::UpgradeBlocked { requested_version } => write!(
                f,
                "schema upgrade to version {requested_version} is blocked by another open session; close other sessions and retry"
            ),
            Self::TransactionAborted(message) => write!(f, "transaction aborted: {message}"),
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnknownCollection(name) => write!(f, "unknown collection `{name}`"),
            Self::IndexNotFound { collection, index } => {
                write!(f, "index `{index}` is not declared on collection `{collection}`")
            }
            Self::InvalidOperation(message) => write!(f, "invalid operation: {message}"),
            Self::MissingKey { collection, field } => write!(
                f,
                "record for collection `{collection}` is missing primary key field `{field}`"
            ),
            Self::InvalidKey(message) => write!(f, "invalid key: {message}"),
            Self::MissingCollections(names) => write!(
                f,
                "collections still missing after schema repair: {}",
                names.join(", ")
            ),
            Self::ReadOnly(collection) => {
                write!(f, "write to `{collection}` inside a read-only transaction")
            }
            Self::Serialization(message) => write!(f, "serialization failed: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::Timeout(limit) => {
                write!(f, "storage operation timed out after {} ms", limit.as_millis())
            }
            Self::TaskFailed(message) => write!(f, "storage task failed: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(Arc::new(value))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value.to_string())
    }
}
