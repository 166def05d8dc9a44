//! Full-store snapshot export/import for the sync collaborator.
//!
//! # Responsibility
//! - Export every registry collection as raw JSON in one read transaction.
//! - Import a snapshot in one write transaction, merging or replacing.
//!
//! # Invariants
//! - Export and import each see one consistent view of the store.
//! - Unknown collection names in an import are skipped, not fatal.
//! - A record without a valid primary key aborts the whole import.

use crate::adapter::base::stamp;
use crate::db::{StorageEngine, StoreResult, TxMode};
use crate::schema::{self, SCHEMA_VERSION};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Plain union of every collection's documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub exported_at: i64,
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(flatten)]
    pub collections: BTreeMap<String, Vec<Value>>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl Snapshot {
    pub fn record_count(&self) -> usize {
        self.collections.values().map(Vec::len).sum()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Upsert records over existing data.
    #[default]
    Merge,
    /// Clear each imported collection first.
    Replace,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub mode: ImportMode,
    /// Records written per collection.
    pub imported: BTreeMap<String, usize>,
    /// Collection names not in the registry.
    pub skipped: Vec<String>,
}

impl ImportSummary {
    pub fn total(&self) -> usize {
        self.imported.values().sum()
    }
}

/// Reads every declared collection.
pub async fn export_snapshot(engine: &StorageEngine) -> StoreResult<Snapshot> {
    let db = engine.open().await?;
    let names = schema::all_collection_names();
    let collections = engine
        .transaction(&names, TxMode::ReadOnly)?
        .run(move |tx| {
            let mut collections = BTreeMap::new();
            for name in names {
                collections.insert(name.to_string(), tx.get_all(name)?);
            }
            Ok(collections)
        })
        .await?;
    let snapshot = Snapshot {
        exported_at: engine.now_ms(),
        schema_version: db.version(),
        collections,
    };
    info!(
        "event=snapshot_export module=snapshot status=ok records={}",
        snapshot.record_count()
    );
    Ok(snapshot)
}

/// Writes `snapshot` back; each record is saved as by `BaseAdapter::save`.
pub async fn import_snapshot(
    engine: &StorageEngine,
    snapshot: &Snapshot,
    mode: ImportMode,
) -> StoreResult<ImportSummary> {
    let mut summary = ImportSummary {
        mode,
        ..ImportSummary::default()
    };
    let mut batches = Vec::new();
    for (name, documents) in &snapshot.collections {
        match schema::describe(name) {
            Ok(descriptor) => batches.push((descriptor.name, documents.clone())),
            Err(_) => {
                warn!("event=snapshot_import module=snapshot status=skip collection={name}");
                summary.skipped.push(name.clone());
            }
        }
    }
    if batches.is_empty() {
        return Ok(summary);
    }

    engine.open().await?;
    let now = engine.now_ms();
    let scope: Vec<&str> = batches.iter().map(|(name, _)| *name).collect();
    let imported = engine
        .transaction(&scope, TxMode::ReadWrite)?
        .run(move |tx| {
            let mut imported = BTreeMap::new();
            for (name, documents) in batches {
                if mode == ImportMode::Replace {
                    tx.clear(name)?;
                }
                let written = documents.len();
                for mut document in documents {
                    stamp(&mut document, now)?;
                    tx.put(name, &document)?;
                }
                imported.insert(name.to_string(), written);
            }
            Ok(imported)
        })
        .await?;
    summary.imported = imported;
    info!(
        "event=snapshot_import module=snapshot status=ok mode={:?} records={} skipped={}",
        mode,
        summary.total(),
        summary.skipped.len()
    );
    Ok(summary)
}
