//! Persistence core for Taskdeck.
//! Schema-versioned document collections over SQLite, with typed adapters
//! for every record kind the app stores.

pub mod adapter;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod schema;
pub mod snapshot;
pub mod store;
pub mod validator;

pub use adapter::{BaseAdapter, ListQuery, SortBy, SortDirection};
pub use config::{AppConfig, LoggingConfig, StoreConfig, StoreLocation};
pub use db::{EnginePhase, StorageEngine, StoreError, StoreResult, TxMode};
pub use logging::{default_log_level, init_logging, logging_status};
pub use snapshot::{ImportMode, ImportSummary, Snapshot};
pub use store::{Store, StoreStatistics};
pub use validator::{ConsistencyReport, ConsistencyValidator, LegacySnapshot, ValidationResult};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
