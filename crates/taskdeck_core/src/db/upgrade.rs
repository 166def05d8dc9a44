//! Additive schema upgrade pass.
//!
//! # Responsibility
//! - Create registry collections that are not yet present.
//! - Add declared index structures that a present collection lacks.
//! - Mirror the applied version to `PRAGMA user_version`.
//!
//! # Invariants
//! - Existing documents are never rewritten or dropped.
//! - The whole pass runs in one `IMMEDIATE` transaction.
//! - Lock contention while upgrading surfaces as `UpgradeBlocked`.

use super::{StoreError, StoreResult};
use crate::schema::{self, CollectionDescriptor, IndexDescriptor};
use rusqlite::{Connection, ErrorCode, TransactionBehavior};
use std::collections::BTreeSet;

/// Outcome of the open procedure's upgrade step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpgradeReport {
    /// Version found on disk before the upgrade (0 for a new database).
    pub from_version: u32,
    /// Version the connection is running at.
    pub to_version: u32,
    /// Collections created by this pass, in registry order.
    pub created: Vec<String>,
    /// `collection.index` structures added to collections that already existed.
    pub indexes_added: Vec<String>,
}

impl UpgradeReport {
    pub fn upgraded(&self) -> bool {
        self.to_version > self.from_version
    }
}

pub(crate) fn stored_version(conn: &Connection) -> StoreResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

/// Applies the upgrade from `from_version` to `to_version`.
pub(crate) fn apply_upgrade(
    conn: &mut Connection,
    from_version: u32,
    to_version: u32,
) -> StoreResult<UpgradeReport> {
    let blocked = |err: rusqlite::Error| match err.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
            StoreError::UpgradeBlocked {
                requested_version: to_version,
            }
        }
        _ => err.into(),
    };

    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(blocked)?;

    let mut report = UpgradeReport {
        from_version,
        to_version,
        ..UpgradeReport::default()
    };

    for descriptor in schema::all_collections() {
        if table_exists(&tx, descriptor.name)? {
            for index in descriptor.indexes {
                if !index_structure_exists(&tx, descriptor, index)? {
                    create_index_structure(&tx, descriptor, index)?;
                    report
                        .indexes_added
                        .push(format!("{}.{}", descriptor.name, index.name));
                }
            }
            continue;
        }

        create_collection(&tx, descriptor)?;
        report.created.push(descriptor.name.to_string());
    }

    tx.execute_batch(&format!("PRAGMA user_version = {to_version};"))?;
    tx.commit().map_err(blocked)?;

    Ok(report)
}

/// Returns registry collection names that have a backing table.
pub(crate) fn present_collections(conn: &Connection) -> StoreResult<BTreeSet<String>> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table';")?;
    let mut rows = stmt.query([])?;
    let declared: BTreeSet<&str> = schema::all_collection_names().into_iter().collect();
    let mut present = BTreeSet::new();
    while let Some(row) = rows.next()? {
        let name: String = row.get(0)?;
        if declared.contains(name.as_str()) {
            present.insert(name);
        }
    }
    Ok(present)
}

/// Returns registry collection names without a backing table, in registry order.
pub(crate) fn missing_collections(conn: &Connection) -> StoreResult<Vec<String>> {
    let present = present_collections(conn)?;
    Ok(schema::all_collection_names()
        .into_iter()
        .filter(|name| !present.contains(*name))
        .map(str::to_string)
        .collect())
}

pub(crate) fn quoted(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub(crate) fn json_path(field: &str) -> String {
    format!("'$.{field}'")
}

/// Side table that materializes one multi-entry index.
pub(crate) fn multi_entry_table(collection: &str, index: &str) -> String {
    format!("{collection}__mx__{index}")
}

fn expression_index_name(collection: &str, index: &str) -> String {
    format!("{collection}__idx__{index}")
}

fn table_exists(conn: &Connection, table: &str) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn sqlite_index_exists(conn: &Connection, name: &str) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'index' AND name = ?1
        );",
        [name],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn index_structure_exists(
    conn: &Connection,
    descriptor: &CollectionDescriptor,
    index: &IndexDescriptor,
) -> StoreResult<bool> {
    if index.multi_entry {
        table_exists(conn, &multi_entry_table(descriptor.name, index.name))
    } else {
        sqlite_index_exists(conn, &expression_index_name(descriptor.name, index.name))
    }
}

fn create_collection(conn: &Connection, descriptor: &CollectionDescriptor) -> StoreResult<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE {} (
            key TEXT PRIMARY KEY NOT NULL,
            body TEXT NOT NULL CHECK (json_valid(body))
        );",
        quoted(descriptor.name)
    ))?;
    for index in descriptor.indexes {
        create_index_structure(conn, descriptor, index)?;
    }
    Ok(())
}

fn create_index_structure(
    conn: &Connection,
    descriptor: &CollectionDescriptor,
    index: &IndexDescriptor,
) -> StoreResult<()> {
    let table = quoted(descriptor.name);

    if index.multi_entry {
        let side = multi_entry_table(descriptor.name, index.name);
        let side_quoted = quoted(&side);
        let path = json_path(index.fields[0]);
        conn.execute_batch(&format!(
            "CREATE TABLE {side_quoted} (
                value NOT NULL,
                record_key TEXT NOT NULL REFERENCES {table}(key) ON DELETE CASCADE,
                PRIMARY KEY (value, record_key)
            ) WITHOUT ROWID;
            CREATE INDEX {} ON {side_quoted} (record_key);
            INSERT OR IGNORE INTO {side_quoted} (value, record_key)
                SELECT j.value, c.key
                FROM {table} c, json_each(c.body, {path}) j
                WHERE j.type NOT IN ('object', 'array', 'null');",
            quoted(&format!("{side}__by_record"))
        ))?;
        return Ok(());
    }

    let expressions = index
        .fields
        .iter()
        .map(|field| format!("json_extract(body, {})", json_path(field)))
        .collect::<Vec<_>>()
        .join(", ");
    let unique = if index.unique { "UNIQUE " } else { "" };
    conn.execute_batch(&format!(
        "CREATE {unique}INDEX {} ON {table} ({expressions});",
        quoted(&expression_index_name(descriptor.name, index.name))
    ))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{apply_upgrade, missing_collections, present_collections, stored_version};
    use crate::schema::{all_collection_names, SCHEMA_VERSION};
    use rusqlite::Connection;

    #[test]
    fn upgrade_creates_every_collection_once() {
        let mut conn = Connection::open_in_memory().unwrap();
        let report = apply_upgrade(&mut conn, 0, SCHEMA_VERSION).unwrap();

        assert_eq!(report.created.len(), all_collection_names().len());
        assert!(report.indexes_added.is_empty());
        assert_eq!(stored_version(&conn).unwrap(), SCHEMA_VERSION);
        assert!(missing_collections(&conn).unwrap().is_empty());

        let second = apply_upgrade(&mut conn, SCHEMA_VERSION, SCHEMA_VERSION + 1).unwrap();
        assert!(second.created.is_empty());
        assert_eq!(present_collections(&conn).unwrap().len(), all_collection_names().len());
    }

    #[test]
    fn upgrade_leaves_existing_documents_untouched() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE \"tags\" (key TEXT PRIMARY KEY NOT NULL, body TEXT NOT NULL);
             INSERT INTO \"tags\" (key, body) VALUES ('t1', '{\"id\":\"t1\",\"name\":\"work\"}');",
        )
        .unwrap();

        let report = apply_upgrade(&mut conn, 1, SCHEMA_VERSION).unwrap();
        assert!(!report.created.contains(&"tags".to_string()));
        assert!(report.indexes_added.contains(&"tags.name".to_string()));

        let body: String = conn
            .query_row("SELECT body FROM \"tags\" WHERE key = 't1';", [], |row| row.get(0))
            .unwrap();
        assert!(body.contains("work"));
    }
}
