//! Store handle: one engine plus every adapter, built once and passed around.
//!
//! # Responsibility
//! - Construct the engine and adapters from a [`StoreConfig`].
//! - Expose lifecycle, statistics and snapshot entry points.
//!
//! # Invariants
//! - All adapters of one `Store` share one engine and connection.
//! - `statistics()` never fails; unreadable collections count as zero.

use crate::adapter::{
    BoardAdapter, CollectionsAdapter, EntityAdapter, EntityPositionAdapter, MetadataAdapter,
    PeopleAdapter, RelationshipAdapter, SettingsAdapter, TagsAdapter, TemplateAdapter,
    TemplateLibraryAdapter, WeeklyAdapter,
};
use crate::config::StoreConfig;
use crate::db::{Database, EnginePhase, StorageEngine, StoreResult, TxMode};
use crate::schema;
use crate::snapshot::{self, ImportMode, ImportSummary, Snapshot};
use crate::validator::ConsistencyValidator;
use log::warn;
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-collection record counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStatistics {
    pub schema_version: u32,
    pub collections: BTreeMap<String, u64>,
}

impl StoreStatistics {
    pub fn total_records(&self) -> u64 {
        self.collections.values().sum()
    }
}

/// Persistence entry point handed to every consumer.
#[derive(Clone)]
pub struct Store {
    engine: StorageEngine,
    entities: EntityAdapter,
    boards: BoardAdapter,
    people: PeopleAdapter,
    relationships: RelationshipAdapter,
    collections: CollectionsAdapter,
    tags: TagsAdapter,
    templates: TemplateAdapter,
    template_library: TemplateLibraryAdapter,
    metadata: MetadataAdapter,
    settings: SettingsAdapter,
    positions: EntityPositionAdapter,
    weekly: WeeklyAdapter,
    validator: ConsistencyValidator,
}

impl Store {
    /// Builds the handle; nothing is opened until first use.
    pub fn new(config: StoreConfig) -> Self {
        let engine = StorageEngine::new(config);
        let entities = EntityAdapter::new(engine.clone());
        let boards = BoardAdapter::new(engine.clone());
        let metadata = MetadataAdapter::new(engine.clone());
        Self {
            people: PeopleAdapter::new(engine.clone()),
            relationships: RelationshipAdapter::new(engine.clone()),
            collections: CollectionsAdapter::new(engine.clone()),
            tags: TagsAdapter::new(engine.clone()),
            templates: TemplateAdapter::new(engine.clone()),
            template_library: TemplateLibraryAdapter::new(engine.clone()),
            settings: SettingsAdapter::new(metadata.clone()),
            positions: EntityPositionAdapter::new(engine.clone()),
            weekly: WeeklyAdapter::new(engine.clone()),
            validator: ConsistencyValidator::new(engine.clone()),
            entities,
            boards,
            metadata,
            engine,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(StoreConfig::in_memory())
    }

    pub fn engine(&self) -> &StorageEngine {
        &self.engine
    }

    pub fn entities(&self) -> &EntityAdapter {
        &self.entities
    }

    pub fn boards(&self) -> &BoardAdapter {
        &self.boards
    }

    pub fn people(&self) -> &PeopleAdapter {
        &self.people
    }

    pub fn relationships(&self) -> &RelationshipAdapter {
        &self.relationships
    }

    pub fn collections(&self) -> &CollectionsAdapter {
        &self.collections
    }

    pub fn tags(&self) -> &TagsAdapter {
        &self.tags
    }

    pub fn templates(&self) -> &TemplateAdapter {
        &self.templates
    }

    pub fn template_library(&self) -> &TemplateLibraryAdapter {
        &self.template_library
    }

    pub fn metadata(&self) -> &MetadataAdapter {
        &self.metadata
    }

    pub fn settings(&self) -> &SettingsAdapter {
        &self.settings
    }

    pub fn positions(&self) -> &EntityPositionAdapter {
        &self.positions
    }

    pub fn weekly(&self) -> &WeeklyAdapter {
        &self.weekly
    }

    pub fn validator(&self) -> &ConsistencyValidator {
        &self.validator
    }

    pub async fn open(&self) -> StoreResult<Database> {
        self.engine.open().await
    }

    pub fn close(&self) {
        self.engine.close();
    }

    pub fn phase(&self) -> EnginePhase {
        self.engine.phase()
    }

    /// Record counts per collection, read in one transaction.
    ///
    /// Degrades to zero counts when the store cannot be opened or read.
    pub async fn statistics(&self) -> StoreStatistics {
        let names = schema::all_collection_names();
        let mut statistics = StoreStatistics {
            schema_version: self.engine.working_version(),
            collections: names.iter().map(|name| (name.to_string(), 0)).collect(),
        };
        match self.read_counts(names).await {
            Ok((version, counts)) => {
                statistics.schema_version = version;
                statistics.collections.extend(counts);
            }
            Err(err) => {
                warn!("event=store_statistics module=store status=degraded error={err}");
            }
        }
        statistics
    }

    async fn read_counts(&self, names: Vec<&'static str>) -> StoreResult<(u32, Vec<(String, u64)>)> {
        let db = self.engine.open().await?;
        let counts = self
            .engine
            .transaction(&names, TxMode::ReadOnly)?
            .run(move |tx| {
                let mut counts = Vec::with_capacity(names.len());
                for name in names {
                    counts.push((name.to_string(), tx.count(name)?));
                }
                Ok(counts)
            })
            .await?;
        Ok((db.version(), counts))
    }

    pub async fn export_snapshot(&self) -> StoreResult<Snapshot> {
        snapshot::export_snapshot(&self.engine).await
    }

    pub async fn import_snapshot(
        &self,
        snapshot: &Snapshot,
        mode: ImportMode,
    ) -> StoreResult<ImportSummary> {
        snapshot::import_snapshot(&self.engine, snapshot, mode).await
    }
}
