//! Key-value metadata and the settings layer on top of it.
//!
//! # Responsibility
//! - `MetadataAdapter`: raw `key -> value` records tagged with a category.
//! - `SettingsAdapter`: namespaced settings and feature flags.
//!
//! # Invariants
//! - Setting keys are `<category>:<name>`; the category is also stored in
//!   the `category` field for indexed group retrieval.
//! - Feature flags live in the `features` category and default to off.

use super::BaseAdapter;
use crate::db::{StorageEngine, StoreError, StoreResult, TxMode};
use crate::model::metadata::MetadataRecord;
use crate::schema::METADATA;
use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::ops::Deref;

pub const FEATURES_CATEGORY: &str = "features";
const KEY_SEPARATOR: char = ':';

#[derive(Clone)]
pub struct MetadataAdapter {
    base: BaseAdapter<MetadataRecord>,
}

impl MetadataAdapter {
    pub fn new(engine: StorageEngine) -> Self {
        Self {
            base: BaseAdapter::new(engine),
        }
    }

    pub async fn get_value(&self, key: &str) -> StoreResult<Option<Value>> {
        Ok(self.base.get_by_id(key).await?.map(|record| record.value))
    }

    /// Upserts one value, keeping the original `createdAt`.
    pub async fn set_value(
        &self,
        key: &str,
        category: &str,
        value: Value,
    ) -> StoreResult<MetadataRecord> {
        if key.trim().is_empty() {
            return Err(StoreError::InvalidKey(
                "metadata key must not be blank".to_string(),
            ));
        }
        let category = category.to_string();
        let key_owned = key.to_string();
        let stored = self
            .base
            .upsert_with(key, move |current| {
                let mut record = current
                    .unwrap_or_else(|| MetadataRecord::new(key_owned, category.clone(), Value::Null));
                record.category = category;
                record.value = value;
                Ok(Some(record))
            })
            .await?;
        stored.ok_or_else(|| {
            StoreError::TransactionAborted(format!("metadata `{key}` was not written"))
        })
    }

    pub async fn remove(&self, key: &str) -> StoreResult<bool> {
        self.base.delete(key).await
    }

    pub async fn get_by_category(&self, category: &str) -> StoreResult<Vec<MetadataRecord>> {
        self.base.get_by_index("category", category).await
    }
}

impl Deref for MetadataAdapter {
    type Target = BaseAdapter<MetadataRecord>;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

/// Builds the storage key of one setting.
pub fn setting_key(category: &str, name: &str) -> String {
    format!("{category}{KEY_SEPARATOR}{name}")
}

/// Namespaced settings backed by [`MetadataAdapter`].
#[derive(Clone)]
pub struct SettingsAdapter {
    metadata: MetadataAdapter,
}

impl SettingsAdapter {
    pub fn new(metadata: MetadataAdapter) -> Self {
        Self { metadata }
    }

    /// Returns the stored setting, or `default` when absent or undecodable.
    pub async fn get_setting<T: DeserializeOwned>(
        &self,
        category: &str,
        name: &str,
        default: T,
    ) -> StoreResult<T> {
        let key = setting_key(category, name);
        let Some(value) = self.metadata.get_value(&key).await? else {
            return Ok(default);
        };
        match serde_json::from_value(value) {
            Ok(setting) => Ok(setting),
            Err(err) => {
                warn!("event=setting_decode module=adapter status=warn key={key} error={err}");
                Ok(default)
            }
        }
    }

    pub async fn set_setting<T: Serialize>(
        &self,
        category: &str,
        name: &str,
        value: &T,
    ) -> StoreResult<MetadataRecord> {
        if category.contains(KEY_SEPARATOR) {
            return Err(StoreError::InvalidKey(format!(
                "setting category `{category}` must not contain `{KEY_SEPARATOR}`"
            )));
        }
        let value = serde_json::to_value(value)?;
        self.metadata
            .set_value(&setting_key(category, name), category, value)
            .await
    }

    /// Settings of one category keyed by setting name.
    pub async fn get_settings_by_category(&self, category: &str) -> StoreResult<BTreeMap<String, Value>> {
        let prefix = setting_key(category, "");
        let records = self.metadata.get_by_category(category).await?;
        Ok(records
            .into_iter()
            .filter_map(|record| {
                let name = record.key.strip_prefix(&prefix)?.to_string();
                Some((name, record.value))
            })
            .collect())
    }

    /// Deletes every setting in `category`; returns how many were removed.
    pub async fn reset_category(&self, category: &str) -> StoreResult<usize> {
        let category_value = Value::String(category.to_string());
        let prefix = setting_key(category, "");
        let engine = self.metadata.engine().clone();
        engine.open().await?;
        let removed = engine
            .transaction(&[METADATA], TxMode::ReadWrite)?
            .run(move |tx| {
                let mut removed = 0usize;
                for record in tx.get_by_index(METADATA, "category", &category_value)? {
                    let Some(key) = record.get("key").and_then(Value::as_str) else {
                        continue;
                    };
                    if key.starts_with(&prefix) {
                        tx.delete(METADATA, key)?;
                        removed += 1;
                    }
                }
                Ok(removed)
            })
            .await?;
        info!("event=settings_reset module=adapter status=ok category={category} removed={removed}");
        Ok(removed)
    }

    pub async fn is_feature_enabled(&self, flag: &str) -> StoreResult<bool> {
        self.get_setting(FEATURES_CATEGORY, flag, false).await
    }

    pub async fn set_feature_flag(&self, flag: &str, enabled: bool) -> StoreResult<()> {
        self.set_setting(FEATURES_CATEGORY, flag, &enabled).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::setting_key;

    #[test]
    fn setting_keys_are_namespaced_by_category() {
        assert_eq!(setting_key("appearance", "theme"), "appearance:theme");
        assert_eq!(setting_key("features", ""), "features:");
    }
}
