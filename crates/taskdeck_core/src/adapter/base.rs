//! Generic CRUD + index-query adapter over one collection.
//!
//! # Responsibility
//! - Provide the record-level contract every specialized adapter composes.
//! - Stamp `createdAt`/`updatedAt` on writes.
//! - Open the engine transparently before each call.
//!
//! # Invariants
//! - `save` is an upsert; last writer wins.
//! - `createdAt` is kept when present and stamped when absent.
//! - `updatedAt` is refreshed on every write and strictly increases.
//! - Undeclared indexes fail with `IndexNotFound` before any I/O.
//! - Listings skip undecodable documents instead of failing.

use crate::db::{StorageEngine, StoreError, StoreResult, TxMode};
use crate::model::Record;
use crate::schema::{self, CollectionDescriptor};
use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;

const CREATED_AT: &str = "createdAt";
const UPDATED_AT: &str = "updatedAt";

/// Typed adapter over a single collection.
pub struct BaseAdapter<T> {
    engine: StorageEngine,
    collection: &'static str,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for BaseAdapter<T> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            collection: self.collection,
            _record: PhantomData,
        }
    }
}

impl<T: Record> BaseAdapter<T> {
    /// Adapter for the record type's own collection.
    ///
    /// The collection is resolved against the registry on every call, so a
    /// record bound to an undeclared collection fails with `UnknownCollection`.
    pub fn new(engine: StorageEngine) -> Self {
        Self {
            engine,
            collection: T::COLLECTION,
            _record: PhantomData,
        }
    }
}

impl<T> BaseAdapter<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    /// Adapter over an arbitrary declared collection (used for raw JSON access).
    ///
    /// # Errors
    /// - `UnknownCollection` when `collection` is not declared.
    pub fn for_collection(engine: StorageEngine, collection: &str) -> StoreResult<Self> {
        Ok(Self {
            engine,
            collection: schema::describe(collection)?.name,
            _record: PhantomData,
        })
    }

    pub fn collection(&self) -> &'static str {
        self.collection
    }

    pub fn engine(&self) -> &StorageEngine {
        &self.engine
    }

    pub async fn get_by_id(&self, key: &str) -> StoreResult<Option<T>> {
        let collection = self.collection;
        let key = key.to_string();
        let document = self
            .run(TxMode::ReadOnly, move |tx| tx.get(collection, &key))
            .await?;
        document.map(|value| decode(collection, value)).transpose()
    }

    /// Upserts one record and returns it as stored.
    pub async fn save(&self, record: &T) -> StoreResult<T> {
        let collection = self.collection;
        let mut document = serde_json::to_value(record)?;
        stamp(&mut document, self.engine.now_ms())?;
        let stored = document.clone();
        self.run(TxMode::ReadWrite, move |tx| tx.put(collection, &document))
            .await?;
        decode(collection, stored)
    }

    /// Upserts many records in one transaction; returns how many were written.
    pub async fn save_many(&self, records: &[T]) -> StoreResult<usize> {
        let collection = self.collection;
        let mut documents = Vec::with_capacity(records.len());
        for record in records {
            let mut document = serde_json::to_value(record)?;
            stamp(&mut document, self.engine.now_ms())?;
            documents.push(document);
        }
        self.run(TxMode::ReadWrite, move |tx| {
            for document in &documents {
                tx.put(collection, document)?;
            }
            Ok(documents.len())
        })
        .await
    }

    /// Deletes by primary key. Returns `true` once the delete completed,
    /// whether or not the key existed.
    pub async fn delete(&self, key: &str) -> StoreResult<bool> {
        let collection = self.collection;
        let key = key.to_string();
        self.run(TxMode::ReadWrite, move |tx| tx.delete(collection, &key))
            .await?;
        Ok(true)
    }

    pub async fn get_all(&self) -> StoreResult<Vec<T>> {
        let collection = self.collection;
        let documents = self
            .run(TxMode::ReadOnly, move |tx| tx.get_all(collection))
            .await?;
        Ok(decode_listing(collection, documents))
    }

    /// Equality lookup on a declared secondary index.
    ///
    /// # Errors
    /// - `IndexNotFound` when `index` is not declared for this collection.
    pub async fn get_by_index<V: Serialize>(&self, index: &str, value: V) -> StoreResult<Vec<T>> {
        let collection = self.collection;
        let index = self.descriptor()?.index(index)?.name;
        let value = serde_json::to_value(value)?;
        let documents = self
            .run(TxMode::ReadOnly, move |tx| {
                tx.get_by_index(collection, index, &value)
            })
            .await?;
        Ok(decode_listing(collection, documents))
    }

    pub async fn count(&self) -> StoreResult<u64> {
        let collection = self.collection;
        self.run(TxMode::ReadOnly, move |tx| tx.count(collection))
            .await
    }

    pub async fn clear(&self) -> StoreResult<bool> {
        let collection = self.collection;
        self.run(TxMode::ReadWrite, move |tx| tx.clear(collection))
            .await?;
        Ok(true)
    }

    /// Read-modify-write of one record inside a single read-write transaction.
    ///
    /// `f` receives the current record (if any) and returns the record to
    /// store, or `None` to leave the collection unchanged. Returns what was
    /// stored.
    pub async fn upsert_with<F>(&self, key: &str, f: F) -> StoreResult<Option<T>>
    where
        F: FnOnce(Option<T>) -> StoreResult<Option<T>> + Send + 'static,
    {
        let collection = self.collection;
        let key = key.to_string();
        let now = self.engine.now_ms();
        self.run(TxMode::ReadWrite, move |tx| {
            let current = tx
                .get(collection, &key)?
                .map(|value| decode::<T>(collection, value))
                .transpose()?;
            let Some(next) = f(current)? else {
                return Ok(None);
            };
            let mut document = serde_json::to_value(&next)?;
            stamp(&mut document, now)?;
            let stored_key = tx.put(collection, &document)?;
            if stored_key != key {
                return Err(StoreError::InvalidOperation(format!(
                    "update of `{key}` in `{collection}` changed its primary key to `{stored_key}`"
                )));
            }
            decode(collection, document).map(Some)
        })
        .await
    }

    /// Read-modify-write of an existing record. Returns `None` when absent.
    pub async fn update<F>(&self, key: &str, f: F) -> StoreResult<Option<T>>
    where
        F: FnOnce(&mut T) -> StoreResult<()> + Send + 'static,
    {
        self.upsert_with(key, move |current| match current {
            Some(mut record) => {
                f(&mut record)?;
                Ok(Some(record))
            }
            None => Ok(None),
        })
        .await
    }

    fn descriptor(&self) -> StoreResult<&'static CollectionDescriptor> {
        schema::describe(self.collection)
    }

    async fn run<R, F>(&self, mode: TxMode, f: F) -> StoreResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&crate::db::TxScope<'_>) -> StoreResult<R> + Send + 'static,
    {
        self.engine.open().await?;
        self.engine
            .transaction(&[self.collection], mode)?
            .run(f)
            .await
    }
}

/// Stamps `createdAt` when absent and always refreshes `updatedAt`.
pub(crate) fn stamp(document: &mut Value, now_ms: i64) -> StoreResult<()> {
    let Value::Object(fields) = document else {
        return Err(StoreError::InvalidData(
            "records must serialize to JSON objects".to_string(),
        ));
    };
    if fields.get(CREATED_AT).map_or(true, Value::is_null) {
        fields.insert(CREATED_AT.to_string(), Value::from(now_ms));
    }
    fields.insert(UPDATED_AT.to_string(), Value::from(now_ms));
    Ok(())
}

pub(super) fn decode<T: DeserializeOwned>(collection: &str, value: Value) -> StoreResult<T> {
    serde_json::from_value(value).map_err(|err| {
        StoreError::InvalidData(format!("document in `{collection}` does not decode: {err}"))
    })
}

pub(super) fn decode_listing<T: DeserializeOwned>(collection: &str, documents: Vec<Value>) -> Vec<T> {
    let mut records = Vec::with_capacity(documents.len());
    for document in documents {
        match serde_json::from_value(document) {
            Ok(record) => records.push(record),
            Err(err) => warn!(
                "event=record_decode module=adapter status=warn collection={collection} error={err}"
            ),
        }
    }
    records
}
