//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure connection pragmas required by the engine.
//! - Probe that the host SQLite build can act as a document store.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON` and a busy timeout.
//! - Returned connections support the JSON functions used by indexes.

use super::{StoreError, StoreResult};
use crate::config::StoreLocation;
use log::{error, info};
use rusqlite::{Connection, ErrorCode};
use std::time::{Duration, Instant};

/// Opens and configures one raw connection, without touching the schema.
///
/// # Side effects
/// - Emits `db_connect` logging events with duration and status.
pub(crate) fn open_connection(
    location: &StoreLocation,
    busy_timeout: Duration,
) -> StoreResult<Connection> {
    let started_at = Instant::now();
    let mode = location.mode();
    info!("event=db_connect module=db status=start mode={mode}");

    let opened = match location {
        StoreLocation::File(path) => Connection::open(path),
        StoreLocation::Memory => Connection::open_in_memory(),
    };
    let mut conn = match opened {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_connect module=db status=error mode={mode} duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(classify_open_error(err));
        }
    };

    match configure_connection(&mut conn, busy_timeout) {
        Ok(()) => {
            info!(
                "event=db_connect module=db status=ok mode={mode} duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_connect module=db status=error mode={mode} duration_ms={} error_code={} error={}",
                started_at.elapsed().as_millis(),
                err.code(),
                err
            );
            Err(err)
        }
    }
}

fn configure_connection(conn: &mut Connection, busy_timeout: Duration) -> StoreResult<()> {
    conn.busy_timeout(busy_timeout)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(classify_open_error)?;
    probe_json_support(conn)?;
    Ok(())
}

fn probe_json_support(conn: &Connection) -> StoreResult<()> {
    conn.query_row(
        "SELECT json_extract('{\"probe\":1}', '$.probe');",
        [],
        |row| row.get::<_, i64>(0),
    )
    .map(|_| ())
    .map_err(|err| match err.sqlite_error_code() {
        Some(ErrorCode::NotADatabase) => classify_open_error(err),
        _ => StoreError::NotSupported(format!("JSON functions unavailable: {err}")),
    })
}

/// Maps host-level open failures onto `NotSupported`; others stay store errors.
fn classify_open_error(err: rusqlite::Error) -> StoreError {
    match err.sqlite_error_code() {
        Some(ErrorCode::CannotOpen) | Some(ErrorCode::NotADatabase) => {
            StoreError::NotSupported(err.to_string())
        }
        _ => err.into(),
    }
}
