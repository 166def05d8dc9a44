//! Storage engine lifecycle: single-flight open, upgrade, repair, transactions.
//!
//! # Responsibility
//! - Hold the one connection shared by every adapter of a `Store`.
//! - Run the open procedure at most once at a time.
//! - Execute transaction closures off the async executor.
//!
//! # Invariants
//! - Concurrent `open()` callers share one attempt and its outcome.
//! - A settled attempt leaves the slot `Opened` or `Closed`, never `Opening`.
//! - Only the slot's connection is ever handed out; an attempt superseded by
//!   `close()` closes what it opened.
//! - The missing-collection repair re-open runs at most once per attempt.
//! - Stamps returned by `now_ms()` strictly increase.

use super::open::open_connection;
use super::tx::TxScope;
use super::upgrade::{apply_upgrade, missing_collections, stored_version, UpgradeReport};
use super::{StoreError, StoreResult};
use crate::config::StoreConfig;
use crate::schema::{self, CollectionDescriptor};
use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use rusqlite::{Connection, TransactionBehavior};
use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Transaction access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMode {
    ReadOnly,
    ReadWrite,
}

/// Observable state of the open procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    Closed,
    Opening,
    Upgrading,
    Opened,
}

/// Live connection handed out by [`StorageEngine::open`].
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

struct DatabaseInner {
    conn: Mutex<Option<Connection>>,
    version: u32,
    report: UpgradeReport,
    operation_timeout: Option<Duration>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("version", &self.inner.version)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Database {
    /// Schema version this connection runs at.
    pub fn version(&self) -> u32 {
        self.inner.version
    }

    /// Upgrade outcome recorded when this connection was opened.
    pub fn upgrade_report(&self) -> &UpgradeReport {
        &self.inner.report
    }

    /// Returns whether both handles refer to the same underlying connection.
    pub fn same_connection(&self, other: &Database) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.conn.lock().is_none()
    }

    fn close(&self) {
        self.inner.conn.lock().take();
    }

    /// Runs `f` inside one SQLite transaction on a blocking worker.
    ///
    /// Commits when `f` succeeds; rolls back when it fails. With an
    /// operation timeout, `Timeout` is returned only when the transaction is
    /// guaranteed not to commit; a worker that already started committing is
    /// awaited instead.
    pub(crate) async fn run<T, F>(
        &self,
        scope: Vec<&'static CollectionDescriptor>,
        mode: TxMode,
        f: F,
    ) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&TxScope<'_>) -> StoreResult<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let state = Arc::new(AtomicU8::new(RUN_PENDING));
        let worker_state = Arc::clone(&state);
        let mut task = tokio::task::spawn_blocking(move || -> StoreResult<T> {
            let mut guard = inner.conn.lock();
            let conn = guard.as_mut().ok_or(StoreError::NotInitialized)?;
            let behavior = match mode {
                TxMode::ReadOnly => TransactionBehavior::Deferred,
                TxMode::ReadWrite => TransactionBehavior::Immediate,
            };
            let tx = conn.transaction_with_behavior(behavior)?;
            let value = {
                let scope = TxScope::new(&tx, mode, scope);
                f(&scope)?
            };
            if worker_state
                .compare_exchange(RUN_PENDING, RUN_COMMITTING, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                // Caller already saw a timeout; dropping `tx` rolls back.
                return Err(StoreError::TransactionAborted(
                    "operation timed out before commit".to_string(),
                ));
            }
            tx.commit()
                .map_err(|err| StoreError::TransactionAborted(err.to_string()))?;
            Ok(value)
        });

        let joined = match self.inner.operation_timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut task).await {
                Ok(joined) => joined,
                Err(_) => {
                    let cancelled = state
                        .compare_exchange(
                            RUN_PENDING,
                            RUN_CANCELLED,
                            Ordering::SeqCst,
                            Ordering::SeqCst,
                        )
                        .is_ok();
                    if cancelled {
                        warn!(
                            "event=tx_timeout module=db status=warn limit_ms={}",
                            limit.as_millis()
                        );
                        return Err(StoreError::Timeout(limit));
                    }
                    task.await
                }
            },
            None => task.await,
        };
        joined.map_err(|err| StoreError::TaskFailed(err.to_string()))?
    }
}

const RUN_PENDING: u8 = 0;
const RUN_COMMITTING: u8 = 1;
const RUN_CANCELLED: u8 = 2;

/// Transaction scoped to a fixed set of collections.
pub struct TransactionHandle {
    db: Database,
    scope: Vec<&'static CollectionDescriptor>,
    mode: TxMode,
}

impl TransactionHandle {
    pub fn mode(&self) -> TxMode {
        self.mode
    }

    pub fn collections(&self) -> Vec<&'static str> {
        self.scope.iter().map(|descriptor| descriptor.name).collect()
    }

    /// Executes `f` and commits.
    pub async fn run<T, F>(self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&TxScope<'_>) -> StoreResult<T> + Send + 'static,
    {
        self.db.run(self.scope, self.mode, f).await
    }
}

type OpenFuture = Shared<BoxFuture<'static, StoreResult<Database>>>;

enum Slot {
    Closed,
    Opening { attempt: u64, future: OpenFuture },
    Opened(Database),
}

/// Owner of the versioned store connection.
///
/// Cheap to clone; clones share the same connection slot.
#[derive(Clone)]
pub struct StorageEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: StoreConfig,
    slot: Mutex<Slot>,
    phase: Arc<Mutex<EnginePhase>>,
    working_version: AtomicU32,
    attempts: AtomicU64,
    last_stamp: AtomicI64,
}

impl StorageEngine {
    pub fn new(config: StoreConfig) -> Self {
        let working_version = config.schema_version;
        Self {
            inner: Arc::new(EngineInner {
                config,
                slot: Mutex::new(Slot::Closed),
                phase: Arc::new(Mutex::new(EnginePhase::Closed)),
                working_version: AtomicU32::new(working_version),
                attempts: AtomicU64::new(0),
                last_stamp: AtomicI64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn phase(&self) -> EnginePhase {
        *self.inner.phase.lock()
    }

    /// Version the next open attempt will request.
    pub fn working_version(&self) -> u32 {
        self.inner.working_version.load(Ordering::SeqCst)
    }

    /// Number of open attempts started so far (shared waiters not counted).
    pub fn open_attempts(&self) -> u64 {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    /// Returns the ready connection without opening one.
    pub fn current(&self) -> Option<Database> {
        match &*self.inner.slot.lock() {
            Slot::Opened(db) => Some(db.clone()),
            _ => None,
        }
    }

    /// Opens the store, or joins the open already in flight.
    ///
    /// # Errors
    /// - `NotSupported` when the host store cannot be opened.
    /// - `UpgradeBlocked` when another session holds the upgrade lock.
    /// - `MissingCollections` when the repair re-open still lacks collections.
    /// - `NotInitialized` when `close()` ran before the attempt settled; the
    ///   connection it produced is closed, never handed out.
    pub async fn open(&self) -> StoreResult<Database> {
        let (attempt, future) = {
            let mut slot = self.inner.slot.lock();
            match &*slot {
                Slot::Opened(db) => return Ok(db.clone()),
                Slot::Opening { attempt, future } => (*attempt, future.clone()),
                Slot::Closed => {
                    let attempt = self.inner.attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    *self.inner.phase.lock() = EnginePhase::Opening;
                    let future = open_with_repair(self.clone()).boxed().shared();
                    *slot = Slot::Opening {
                        attempt,
                        future: future.clone(),
                    };
                    (attempt, future)
                }
            }
        };

        let result = future.await;

        let mut slot = self.inner.slot.lock();
        if matches!(&*slot, Slot::Opening { attempt: current, .. } if *current == attempt) {
            *slot = match &result {
                Ok(db) => Slot::Opened(db.clone()),
                Err(_) => Slot::Closed,
            };
            *self.inner.phase.lock() = match &result {
                Ok(_) => EnginePhase::Opened,
                Err(_) => EnginePhase::Closed,
            };
            return result;
        }
        let joined_settled = matches!(
            (&*slot, &result),
            (Slot::Opened(current), Ok(db)) if db.same_connection(current)
        );
        if joined_settled {
            return result;
        }

        // `close()` ran while this attempt was in flight.
        if matches!(&*slot, Slot::Closed) {
            *self.inner.phase.lock() = EnginePhase::Closed;
        }
        let db = result?;
        if !db.is_closed() {
            db.close();
            info!(
                "event=engine_open module=db status=discarded attempt={attempt} version={}",
                db.version()
            );
        }
        Err(StoreError::NotInitialized)
    }

    /// Opens a transaction over `collections`.
    ///
    /// # Errors
    /// - `NotInitialized` when no open has completed.
    /// - `UnknownCollection` for names missing from the registry.
    pub fn transaction(
        &self,
        collections: &[&str],
        mode: TxMode,
    ) -> StoreResult<TransactionHandle> {
        let db = self.current().ok_or(StoreError::NotInitialized)?;
        if collections.is_empty() {
            return Err(StoreError::InvalidOperation(
                "transaction requires at least one collection".to_string(),
            ));
        }
        let scope = collections
            .iter()
            .map(|name| schema::describe(name))
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(TransactionHandle { db, scope, mode })
    }

    /// Drops the connection; a later `open()` starts over.
    pub fn close(&self) {
        let previous = std::mem::replace(&mut *self.inner.slot.lock(), Slot::Closed);
        if let Slot::Opened(db) = previous {
            db.close();
            info!(
                "event=engine_close module=db status=ok version={}",
                db.version()
            );
        }
        *self.inner.phase.lock() = EnginePhase::Closed;
    }

    /// Strictly increasing epoch-millisecond clock for record stamps.
    pub fn now_ms(&self) -> i64 {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or_default();
        let previous = self
            .inner
            .last_stamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(wall.max(last + 1))
            })
            .unwrap_or(wall);
        wall.max(previous + 1)
    }
}

async fn open_with_repair(engine: StorageEngine) -> StoreResult<Database> {
    let started_at = Instant::now();
    let mode = engine.inner.config.location.mode();
    info!(
        "event=engine_open module=db status=start mode={mode} version={}",
        engine.working_version()
    );

    let result = async {
        let (db, missing) = open_once(&engine).await?;
        if missing.is_empty() {
            return Ok(db);
        }

        let bumped = db.version() + 1;
        warn!(
            "event=engine_repair module=db status=warn version={} next_version={bumped} missing={}",
            db.version(),
            missing.join(",")
        );
        db.close();
        engine
            .inner
            .working_version
            .fetch_max(bumped, Ordering::SeqCst);

        let (db, still_missing) = open_once(&engine).await?;
        if still_missing.is_empty() {
            return Ok(db);
        }
        db.close();
        Err(StoreError::MissingCollections(still_missing))
    }
    .await;

    match &result {
        Ok(db) => info!(
            "event=engine_open module=db status=ok mode={mode} version={} created={} duration_ms={}",
            db.version(),
            db.upgrade_report().created.len(),
            started_at.elapsed().as_millis()
        ),
        Err(err) if err.is_user_warning() => warn!(
            "event=engine_open module=db status=warn mode={mode} duration_ms={} error_code={} error={}",
            started_at.elapsed().as_millis(),
            err.code(),
            err
        ),
        Err(err) => error!(
            "event=engine_open module=db status=error mode={mode} duration_ms={} error_code={} error={}",
            started_at.elapsed().as_millis(),
            err.code(),
            err
        ),
    }
    result
}

/// One connect + upgrade pass. Returns the database and any still-missing collections.
async fn open_once(engine: &StorageEngine) -> StoreResult<(Database, Vec<String>)> {
    let config = engine.inner.config.clone();
    let phase = Arc::clone(&engine.inner.phase);
    let requested = engine.working_version();

    let task = tokio::task::spawn_blocking(move || {
        let mut conn = open_connection(&config.location, config.busy_timeout())?;
        let stored = stored_version(&conn)?;

        let report = if stored < requested {
            *phase.lock() = EnginePhase::Upgrading;
            let report = apply_upgrade(&mut conn, stored, requested)?;
            info!(
                "event=db_upgrade module=db status=ok from_version={} to_version={} created={} indexes_added={}",
                report.from_version,
                report.to_version,
                report.created.len(),
                report.indexes_added.len()
            );
            *phase.lock() = EnginePhase::Opening;
            report
        } else {
            if stored > requested {
                debug!(
                    "event=db_upgrade module=db status=skip stored_version={stored} requested_version={requested}"
                );
            }
            UpgradeReport {
                from_version: stored,
                to_version: stored,
                ..UpgradeReport::default()
            }
        };

        let missing = missing_collections(&conn)?;
        Ok::<_, StoreError>((conn, report, missing))
    });

    let (conn, report, missing) = task
        .await
        .map_err(|err| StoreError::TaskFailed(err.to_string()))??;

    engine
        .inner
        .working_version
        .fetch_max(report.to_version, Ordering::SeqCst);

    let db = Database {
        inner: Arc::new(DatabaseInner {
            conn: Mutex::new(Some(conn)),
            version: report.to_version,
            report,
            operation_timeout: engine.inner.config.operation_timeout(),
        }),
    };
    Ok((db, missing))
}
