//! Collection primitives executed inside one engine transaction.
//!
//! # Responsibility
//! - Map document reads/writes onto collection tables.
//! - Keep multi-entry index side tables in step with document writes.
//!
//! # Invariants
//! - Only collections declared in the transaction scope are reachable.
//! - Read-only scopes reject every mutation.
//! - Result sets are ordered by primary key.

use super::engine::TxMode;
use super::upgrade::{json_path, multi_entry_table, quoted};
use super::{StoreError, StoreResult};
use crate::schema::{self, CollectionDescriptor};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::Value;

/// Handle passed to transaction closures.
pub struct TxScope<'a> {
    conn: &'a Connection,
    mode: TxMode,
    scope: Vec<&'static CollectionDescriptor>,
}

impl<'a> TxScope<'a> {
    pub(crate) fn new(
        conn: &'a Connection,
        mode: TxMode,
        scope: Vec<&'static CollectionDescriptor>,
    ) -> Self {
        Self { conn, mode, scope }
    }

    pub fn mode(&self) -> TxMode {
        self.mode
    }

    /// Loads one document by primary key.
    pub fn get(&self, collection: &str, key: &str) -> StoreResult<Option<Value>> {
        let descriptor = self.descriptor(collection)?;
        let body: Option<String> = self
            .conn
            .query_row(
                &format!("SELECT body FROM {} WHERE key = ?1;", quoted(descriptor.name)),
                [key],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|text| parse_body(descriptor.name, &text))
            .transpose()
    }

    /// Inserts or replaces one document and returns its primary key.
    pub fn put(&self, collection: &str, document: &Value) -> StoreResult<String> {
        let descriptor = self.writable_descriptor(collection)?;
        let key = extract_key(descriptor, document)?;
        let body = serde_json::to_string(document)?;
        let table = quoted(descriptor.name);

        self.conn.execute(
            &format!(
                "INSERT INTO {table} (key, body) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET body = excluded.body;"
            ),
            params![key, body],
        )?;

        for index in descriptor.indexes.iter().filter(|index| index.multi_entry) {
            let side = quoted(&multi_entry_table(descriptor.name, index.name));
            self.conn.execute(
                &format!("DELETE FROM {side} WHERE record_key = ?1;"),
                [key.as_str()],
            )?;
            self.conn.execute(
                &format!(
                    "INSERT OR IGNORE INTO {side} (value, record_key)
                     SELECT j.value, ?1
                     FROM json_each(?2, {}) j
                     WHERE j.type NOT IN ('object', 'array', 'null');",
                    json_path(index.fields[0])
                ),
                params![key, body],
            )?;
        }

        Ok(key)
    }

    /// Deletes one document. Deleting an absent key is not an error.
    pub fn delete(&self, collection: &str, key: &str) -> StoreResult<()> {
        let descriptor = self.writable_descriptor(collection)?;
        self.conn.execute(
            &format!("DELETE FROM {} WHERE key = ?1;", quoted(descriptor.name)),
            [key],
        )?;
        Ok(())
    }

    /// Loads every document of one collection.
    pub fn get_all(&self, collection: &str) -> StoreResult<Vec<Value>> {
        let descriptor = self.descriptor(collection)?;
        self.query_bodies(
            descriptor,
            &format!("SELECT body FROM {} ORDER BY key ASC;", quoted(descriptor.name)),
            Vec::new(),
        )
    }

    /// Equality lookup over one declared secondary index.
    ///
    /// Compound indexes take a JSON array with one element per field.
    /// `null` never matches, mirroring absent index entries.
    pub fn get_by_index(
        &self,
        collection: &str,
        index_name: &str,
        value: &Value,
    ) -> StoreResult<Vec<Value>> {
        let descriptor = self.descriptor(collection)?;
        let index = descriptor.index(index_name)?;
        let table = quoted(descriptor.name);

        if index.multi_entry {
            let Some(bound) = to_sql_key(value)? else {
                return Ok(Vec::new());
            };
            let side = quoted(&multi_entry_table(descriptor.name, index.name));
            return self.query_bodies(
                descriptor,
                &format!(
                    "SELECT c.body
                     FROM {table} c
                     INNER JOIN {side} s ON s.record_key = c.key
                     WHERE s.value = ?1
                     ORDER BY c.key ASC;"
                ),
                vec![bound],
            );
        }

        let parts: Vec<&Value> = if index.fields.len() == 1 {
            vec![value]
        } else {
            match value {
                Value::Array(items) if items.len() == index.fields.len() => items.iter().collect(),
                _ => {
                    return Err(StoreError::InvalidKey(format!(
                        "compound index `{}.{}` expects an array of {} values",
                        descriptor.name,
                        index.name,
                        index.fields.len()
                    )))
                }
            }
        };

        let mut bind_values = Vec::with_capacity(parts.len());
        for part in parts {
            match to_sql_key(part)? {
                Some(bound) => bind_values.push(bound),
                None => return Ok(Vec::new()),
            }
        }

        let conditions = index
            .fields
            .iter()
            .enumerate()
            .map(|(position, field)| {
                format!("json_extract(body, {}) = ?{}", json_path(field), position + 1)
            })
            .collect::<Vec<_>>()
            .join(" AND ");

        self.query_bodies(
            descriptor,
            &format!("SELECT body FROM {table} WHERE {conditions} ORDER BY key ASC;"),
            bind_values,
        )
    }

    pub fn count(&self, collection: &str) -> StoreResult<u64> {
        let descriptor = self.descriptor(collection)?;
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {};", quoted(descriptor.name)),
            [],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Removes every document of one collection.
    pub fn clear(&self, collection: &str) -> StoreResult<()> {
        let descriptor = self.writable_descriptor(collection)?;
        self.conn
            .execute(&format!("DELETE FROM {};", quoted(descriptor.name)), [])?;
        Ok(())
    }

    fn descriptor(&self, collection: &str) -> StoreResult<&'static CollectionDescriptor> {
        if let Some(descriptor) = self.scope.iter().find(|d| d.name == collection) {
            return Ok(*descriptor);
        }
        let descriptor = schema::describe(collection)?;
        Err(StoreError::InvalidOperation(format!(
            "collection `{}` is outside this transaction's scope",
            descriptor.name
        )))
    }

    fn writable_descriptor(&self, collection: &str) -> StoreResult<&'static CollectionDescriptor> {
        let descriptor = self.descriptor(collection)?;
        if self.mode == TxMode::ReadOnly {
            return Err(StoreError::ReadOnly(descriptor.name.to_string()));
        }
        Ok(descriptor)
    }

    fn query_bodies(
        &self,
        descriptor: &CollectionDescriptor,
        sql: &str,
        bind_values: Vec<SqlValue>,
    ) -> StoreResult<Vec<Value>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next()? {
            let body: String = row.get(0)?;
            documents.push(parse_body(descriptor.name, &body)?);
        }
        Ok(documents)
    }
}

/// Reads the primary key of a document according to its descriptor.
pub(crate) fn extract_key(
    descriptor: &CollectionDescriptor,
    document: &Value,
) -> StoreResult<String> {
    let Value::Object(fields) = document else {
        return Err(StoreError::InvalidData(format!(
            "documents in `{}` must be JSON objects",
            descriptor.name
        )));
    };

    match fields.get(descriptor.primary_key) {
        Some(Value::String(key)) if !key.is_empty() => Ok(key.clone()),
        Some(Value::Number(number)) => Ok(number.to_string()),
        None | Some(Value::Null) => Err(StoreError::MissingKey {
            collection: descriptor.name.to_string(),
            field: descriptor.primary_key,
        }),
        Some(Value::String(_)) => Err(StoreError::InvalidKey(format!(
            "empty `{}` in `{}`",
            descriptor.primary_key, descriptor.name
        ))),
        Some(_) => Err(StoreError::InvalidKey(format!(
            "`{}` in `{}` must be a string or number",
            descriptor.primary_key, descriptor.name
        ))),
    }
}

/// Converts a JSON scalar into the SQL value produced by `json_extract`.
fn to_sql_key(value: &Value) -> StoreResult<Option<SqlValue>> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(flag) => Ok(Some(SqlValue::Integer(i64::from(*flag)))),
        Value::Number(number) => match number.as_i64() {
            Some(integer) => Ok(Some(SqlValue::Integer(integer))),
            None => number
                .as_f64()
                .map(|real| Some(SqlValue::Real(real)))
                .ok_or_else(|| StoreError::InvalidKey(format!("unsupported number `{number}`"))),
        },
        Value::String(text) => Ok(Some(SqlValue::Text(text.clone()))),
        Value::Array(_) | Value::Object(_) => Err(StoreError::InvalidKey(
            "index lookups take scalar values".to_string(),
        )),
    }
}

fn parse_body(collection: &str, body: &str) -> StoreResult<Value> {
    serde_json::from_str(body).map_err(|err| {
        StoreError::InvalidData(format!("unreadable document in `{collection}`: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use super::{extract_key, to_sql_key};
    use crate::db::StoreError;
    use crate::schema::describe;
    use rusqlite::types::Value as SqlValue;
    use serde_json::json;

    #[test]
    fn extract_key_reads_declared_primary_key() {
        let metadata = describe("metadata").unwrap();
        let key = extract_key(metadata, &json!({"key": "theme", "value": "dark"})).unwrap();
        assert_eq!(key, "theme");

        let err = extract_key(metadata, &json!({"id": "theme"})).unwrap_err();
        assert!(matches!(err, StoreError::MissingKey { field: "key", .. }));
    }

    #[test]
    fn extract_key_rejects_non_object_documents() {
        let entities = describe("entities").unwrap();
        assert!(matches!(
            extract_key(entities, &json!(["t1"])),
            Err(StoreError::InvalidData(_))
        ));
        assert!(matches!(
            extract_key(entities, &json!({"id": true})),
            Err(StoreError::InvalidKey(_))
        ));
    }

    #[test]
    fn booleans_bind_like_json_extract_results() {
        assert_eq!(to_sql_key(&json!(true)).unwrap(), Some(SqlValue::Integer(1)));
        assert_eq!(to_sql_key(&json!(null)).unwrap(), None);
        assert!(to_sql_key(&json!({"a": 1})).is_err());
    }
}
