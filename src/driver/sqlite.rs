//! rusqlite-backed driver, registered as `"sqlite"`.
//!
//! Each physical database gets its own small connection pool. rusqlite is
//! blocking, so every operation checks a connection out and runs on tokio's
//! blocking pool; the connection goes back to the pool when the closure ends.

use crate::driver::{Conn, Driver, NamedStatement, Statement, Tx};
use crate::types::{ExecResult, IsolationLevel, NamedArgs, Row, Rows, TxOptions, Value};
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OpenFlags, params_from_iter};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};
use uuid::Uuid;

const DEFAULT_MAX_IDLE: usize = 2;
/// Stands in for "no limit" while still leaving room for `add_permits`.
const UNLIMITED_PERMITS: usize = Semaphore::MAX_PERMITS >> 1;

/// Pragmas applied to every new connection.
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    pub journal_mode: String,
    pub synchronous: String,
    pub busy_timeout: Duration,
    pub foreign_keys: bool,
}

impl Default for SqliteOptions {
    fn default() -> Self {
        Self {
            journal_mode: "WAL".to_string(),
            synchronous: "NORMAL".to_string(),
            busy_timeout: Duration::from_secs(5),
            foreign_keys: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SqliteDriver {
    name: Arc<str>,
    options: Arc<SqliteOptions>,
}

impl SqliteDriver {
    pub fn new() -> Self {
        Self::with_options("sqlite", SqliteOptions::default())
    }

    /// A driver registered under `name` that opens connections with `options`.
    pub fn with_options(name: &str, options: SqliteOptions) -> Self {
        Self { name: Arc::from(name), options: Arc::new(options) }
    }

    pub fn options(&self) -> &SqliteOptions {
        &self.options
    }
}

impl Default for SqliteDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Driver for SqliteDriver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self, dsn: &str) -> Result<Arc<dyn Conn>> {
        let conn = SqliteConn::open(self.clone(), dsn).await?;
        Ok(Arc::new(conn))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub open: usize,
    pub idle: usize,
    pub max_open: usize,
    pub max_idle: usize,
}

struct PooledEntry {
    conn: Connection,
    created: Instant,
}

impl PooledEntry {
    fn expired(&self, lifetime: Option<Duration>) -> bool {
        lifetime.is_some_and(|lifetime| self.created.elapsed() >= lifetime)
    }
}

struct PoolState {
    idle: Vec<PooledEntry>,
    in_use: usize,
    max_open: usize,
    max_idle: usize,
    max_lifetime: Option<Duration>,
    /// Permits currently backing `max_open`.
    permits: usize,
    /// Permits to retire as they come back after `max_open` was lowered.
    debt: usize,
    closed: bool,
}

impl PoolState {
    fn trim_idle(&mut self) {
        let excess = self.idle.len().saturating_sub(self.max_idle);
        self.idle.drain(..excess);
    }
}

struct SqlitePool {
    path: String,
    options: Arc<SqliteOptions>,
    state: Mutex<PoolState>,
    /// One permit per connection that may be checked out at once.
    semaphore: Arc<Semaphore>,
    /// Holds a shared-cache memory database open while no connection is checked out.
    anchor: Mutex<Option<Connection>>,
}

impl SqlitePool {
    fn new(dsn: &str, options: Arc<SqliteOptions>) -> Self {
        // Every ":memory:" target gets its own database shared by all its pooled connections
        let path = if dsn == ":memory:" {
            format!("file:sqlfanout-{}?mode=memory&cache=shared", Uuid::new_v4().simple())
        } else {
            dsn.to_string()
        };

        SqlitePool {
            path,
            options,
            state: Mutex::new(PoolState {
                idle: Vec::new(),
                in_use: 0,
                max_open: 0,
                max_idle: DEFAULT_MAX_IDLE,
                max_lifetime: None,
                permits: UNLIMITED_PERMITS,
                debt: 0,
                closed: false,
            }),
            semaphore: Arc::new(Semaphore::new(UNLIMITED_PERMITS)),
            anchor: Mutex::new(None),
        }
    }

    fn is_shared_memory(&self) -> bool {
        self.path.starts_with("file:sqlfanout-")
    }

    fn open_connection(&self) -> rusqlite::Result<Connection> {
        let conn = Connection::open_with_flags(&self.path, OpenFlags::default())?;
        conn.busy_timeout(self.options.busy_timeout)?;
        conn.execute_batch(&format!(
            "PRAGMA journal_mode = {};
             PRAGMA synchronous = {};
             PRAGMA foreign_keys = {};",
            self.options.journal_mode,
            self.options.synchronous,
            if self.options.foreign_keys { "ON" } else { "OFF" },
        ))?;
        Ok(conn)
    }

    async fn acquire(self: &Arc<Self>) -> Result<PooledConnection> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Error::PoolClosed)?;

        let reused = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(Error::PoolClosed);
            }
            let lifetime = state.max_lifetime;
            let mut reused = None;
            while let Some(entry) = state.idle.pop() {
                if !entry.expired(lifetime) {
                    reused = Some(entry);
                    break;
                }
            }
            state.in_use += 1;
            reused
        };

        let mut pooled = PooledConnection { entry: reused, permit: Some(permit), pool: self.clone() };
        if pooled.entry.is_none() {
            let pool = self.clone();
            // On error `pooled` drops without an entry and gives its slot back
            let conn = tokio::task::spawn_blocking(move || pool.open_connection()).await??;
            pooled.entry = Some(PooledEntry { conn, created: Instant::now() });
        }
        Ok(pooled)
    }

    fn put_back(&self, entry: Option<PooledEntry>, permit: Option<OwnedSemaphorePermit>) {
        let mut state = self.state.lock();
        state.in_use -= 1;
        if let Some(entry) = entry {
            // A connection still inside a transaction is never reused
            let reusable = !state.closed
                && entry.conn.is_autocommit()
                && !entry.expired(state.max_lifetime)
                && state.idle.len() < state.max_idle;
            if reusable {
                state.idle.push(entry);
            }
        }

        if let Some(permit) = permit {
            if state.debt > 0 {
                state.debt -= 1;
                permit.forget();
            }
        }
    }

    fn set_max_idle(&self, n: usize) {
        let mut state = self.state.lock();
        state.max_idle = if state.max_open > 0 { n.min(state.max_open) } else { n };
        state.trim_idle();
    }

    fn set_max_open(&self, n: usize) {
        let mut state = self.state.lock();
        let target = if n == 0 { UNLIMITED_PERMITS } else { n };
        let current = state.permits;
        state.permits = target;
        state.max_open = n;

        if target > current {
            let mut extra = target - current;
            let repaid = extra.min(state.debt);
            state.debt -= repaid;
            extra -= repaid;
            if extra > 0 {
                self.semaphore.add_permits(extra);
            }
        } else if target < current {
            let shrink = current - target;
            let forgotten = self.semaphore.forget_permits(shrink);
            state.debt += shrink - forgotten;
        }

        if n > 0 && state.max_idle > n {
            state.max_idle = n;
            state.trim_idle();
        }
    }

    fn set_max_lifetime(&self, lifetime: Option<Duration>) {
        let mut state = self.state.lock();
        state.max_lifetime = lifetime.filter(|d| !d.is_zero());
        let lifetime = state.max_lifetime;
        state.idle.retain(|entry| !entry.expired(lifetime));
    }

    /// Returns false when the pool was already closed.
    fn close(&self) -> bool {
        let idle = {
            let mut state = self.state.lock();
            if state.closed {
                return false;
            }
            state.closed = true;
            std::mem::take(&mut state.idle)
        };
        drop(idle);
        self.semaphore.close();
        self.anchor.lock().take();
        true
    }

    fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            open: state.in_use + state.idle.len(),
            idle: state.idle.len(),
            max_open: state.max_open,
            max_idle: state.max_idle,
        }
    }
}

/// A connection checked out of a [`SqlitePool`]; returns itself on drop.
struct PooledConnection {
    entry: Option<PooledEntry>,
    permit: Option<OwnedSemaphorePermit>,
    pool: Arc<SqlitePool>,
}

impl std::ops::Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        &self.entry.as_ref().expect("pooled connection used after release").conn
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        self.pool.put_back(self.entry.take(), self.permit.take());
    }
}

/// One SQLite database file (or private memory database) and its pool.
#[derive(Clone)]
pub struct SqliteConn {
    driver: SqliteDriver,
    dsn: Arc<str>,
    pool: Arc<SqlitePool>,
}

impl SqliteConn {
    async fn open(driver: SqliteDriver, dsn: &str) -> Result<Self> {
        let pool = Arc::new(SqlitePool::new(dsn, driver.options.clone()));
        let conn = SqliteConn { driver, dsn: Arc::from(dsn), pool };

        if conn.pool.is_shared_memory() {
            let pool = conn.pool.clone();
            let anchor = tokio::task::spawn_blocking(move || pool.open_connection()).await??;
            *conn.pool.anchor.lock() = Some(anchor);
        }

        if let Err(e) = conn.ping().await {
            conn.pool.close();
            return Err(e);
        }

        info!("Opened SQLite database {}", conn.dsn);
        Ok(conn)
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Run `f` on a pooled connection on the blocking thread pool.
    async fn run<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let conn = self.pool.acquire().await?;
        let result = tokio::task::spawn_blocking(move || f(&*conn)).await?;
        Ok(result?)
    }
}

#[async_trait]
impl Conn for SqliteConn {
    fn driver(&self) -> Arc<dyn Driver> {
        Arc::new(self.driver.clone())
    }

    fn dsn(&self) -> &str {
        &self.dsn
    }

    async fn ping(&self) -> Result<()> {
        self.run(|conn| conn.query_row("SELECT 1", [], |_| Ok(()))).await
    }

    async fn close(&self) -> Result<()> {
        if self.pool.close() {
            info!("Closed SQLite database {}", self.dsn);
        } else {
            debug!("SQLite database {} already closed", self.dsn);
        }
        Ok(())
    }

    fn set_max_idle_conns(&self, n: usize) {
        self.pool.set_max_idle(n);
    }

    fn set_max_open_conns(&self, n: usize) {
        self.pool.set_max_open(n);
    }

    fn set_conn_max_lifetime(&self, lifetime: Option<Duration>) {
        self.pool.set_max_lifetime(lifetime);
    }

    async fn begin(&self, opts: TxOptions) -> Result<Box<dyn Tx>> {
        let begin_sql = match opts.isolation {
            Some(IsolationLevel::Serializable | IsolationLevel::RepeatableRead) => "BEGIN IMMEDIATE",
            _ => "BEGIN DEFERRED",
        };
        let read_only = opts.read_only;

        let conn = self.pool.acquire().await?;
        let conn = tokio::task::spawn_blocking(move || -> rusqlite::Result<PooledConnection> {
            if read_only {
                conn.execute_batch("PRAGMA query_only = ON")?;
            }
            if let Err(e) = conn.execute_batch(begin_sql) {
                if read_only {
                    let _ = conn.execute_batch("PRAGMA query_only = OFF");
                }
                return Err(e);
            }
            Ok(conn)
        })
        .await??;

        debug!("Began transaction on {} ({})", self.dsn, begin_sql);
        Ok(Box::new(SqliteTx { conn: Arc::new(Mutex::new(Some(conn))), read_only, finished: AtomicBool::new(false) }))
    }

    async fn exec(&self, sql: &str, args: &[Value]) -> Result<ExecResult> {
        let sql = sql.to_string();
        let args = args.to_vec();
        self.run(move |conn| exec_positional(conn, &sql, &args)).await
    }

    async fn query(&self, sql: &str, args: &[Value]) -> Result<Rows> {
        let sql = sql.to_string();
        let args = args.to_vec();
        self.run(move |conn| query_positional(conn, &sql, &args)).await
    }

    async fn query_row(&self, sql: &str, args: &[Value]) -> Result<Option<Row>> {
        let sql = sql.to_string();
        let args = args.to_vec();
        self.run(move |conn| first_row_positional(conn, &sql, &args)).await
    }

    async fn named_exec(&self, sql: &str, args: &NamedArgs) -> Result<ExecResult> {
        let sql = sql.to_string();
        let args = args.clone();
        self.run(move |conn| exec_named(conn, &sql, &args)).await
    }

    async fn named_query(&self, sql: &str, args: &NamedArgs) -> Result<Rows> {
        let sql = sql.to_string();
        let args = args.clone();
        self.run(move |conn| query_named(conn, &sql, &args)).await
    }

    async fn prepare(&self, sql: &str) -> Result<Box<dyn Statement>> {
        let sql: Arc<str> = Arc::from(sql);
        self.validate(sql.clone()).await?;
        Ok(Box::new(SqliteStmt { conn: self.clone(), sql, closed: AtomicBool::new(false) }))
    }

    async fn prepare_named(&self, sql: &str) -> Result<Box<dyn NamedStatement>> {
        let sql: Arc<str> = Arc::from(sql);
        self.validate(sql.clone()).await?;
        Ok(Box::new(SqliteNamedStmt { conn: self.clone(), sql, closed: AtomicBool::new(false) }))
    }
}

impl SqliteConn {
    /// Compile `sql` once so syntax errors surface at prepare time.
    async fn validate(&self, sql: Arc<str>) -> Result<()> {
        self.run(move |conn| conn.prepare_cached(&sql).map(|_| ())).await
    }
}

// Statements can't outlive the connection they borrow, so a prepared statement
// keeps its SQL and relies on each pooled connection's statement cache.
pub struct SqliteStmt {
    conn: SqliteConn,
    sql: Arc<str>,
    closed: AtomicBool,
}

impl SqliteStmt {
    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) { Err(Error::StatementClosed) } else { Ok(()) }
    }
}

#[async_trait]
impl Statement for SqliteStmt {
    async fn exec(&self, args: &[Value]) -> Result<ExecResult> {
        self.check_open()?;
        let sql = self.sql.clone();
        let args = args.to_vec();
        self.conn.run(move |conn| exec_positional(conn, &sql, &args)).await
    }

    async fn query(&self, args: &[Value]) -> Result<Rows> {
        self.check_open()?;
        let sql = self.sql.clone();
        let args = args.to_vec();
        self.conn.run(move |conn| query_positional(conn, &sql, &args)).await
    }

    async fn query_row(&self, args: &[Value]) -> Result<Option<Row>> {
        self.check_open()?;
        let sql = self.sql.clone();
        let args = args.to_vec();
        self.conn.run(move |conn| first_row_positional(conn, &sql, &args)).await
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!("Closed statement on {}", self.conn.dsn);
        }
        Ok(())
    }
}

pub struct SqliteNamedStmt {
    conn: SqliteConn,
    sql: Arc<str>,
    closed: AtomicBool,
}

impl SqliteNamedStmt {
    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) { Err(Error::StatementClosed) } else { Ok(()) }
    }
}

#[async_trait]
impl NamedStatement for SqliteNamedStmt {
    async fn exec(&self, args: &NamedArgs) -> Result<ExecResult> {
        self.check_open()?;
        let sql = self.sql.clone();
        let args = args.clone();
        self.conn.run(move |conn| exec_named(conn, &sql, &args)).await
    }

    async fn query(&self, args: &NamedArgs) -> Result<Rows> {
        self.check_open()?;
        let sql = self.sql.clone();
        let args = args.clone();
        self.conn.run(move |conn| query_named(conn, &sql, &args)).await
    }

    async fn query_row(&self, args: &NamedArgs) -> Result<Option<Row>> {
        self.check_open()?;
        let sql = self.sql.clone();
        let args = args.clone();
        self.conn.run(move |conn| first_row_named(conn, &sql, &args)).await
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!("Closed named statement on {}", self.conn.dsn);
        }
        Ok(())
    }
}

/// A transaction pinned to one pooled connection.
pub struct SqliteTx {
    conn: Arc<Mutex<Option<PooledConnection>>>,
    read_only: bool,
    finished: AtomicBool,
}

impl SqliteTx {
    async fn run<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let slot = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = slot.lock();
            match guard.as_ref() {
                Some(conn) => f(&**conn).map_err(Error::from),
                None => Err(Error::TxDone),
            }
        })
        .await?
    }

    async fn finish(&self, sql: &'static str) -> Result<()> {
        self.finished.store(true, Ordering::Release);
        let slot = self.conn.clone();
        let read_only = self.read_only;
        tokio::task::spawn_blocking(move || {
            let conn = slot.lock().take().ok_or(Error::TxDone)?;
            let result = conn.execute_batch(sql);
            if read_only {
                let _ = conn.execute_batch("PRAGMA query_only = OFF");
            }
            result.map_err(Error::from)
        })
        .await?
    }
}

#[async_trait]
impl Tx for SqliteTx {
    async fn exec(&self, sql: &str, args: &[Value]) -> Result<ExecResult> {
        let sql = sql.to_string();
        let args = args.to_vec();
        self.run(move |conn| exec_positional(conn, &sql, &args)).await
    }

    async fn query(&self, sql: &str, args: &[Value]) -> Result<Rows> {
        let sql = sql.to_string();
        let args = args.to_vec();
        self.run(move |conn| query_positional(conn, &sql, &args)).await
    }

    async fn query_row(&self, sql: &str, args: &[Value]) -> Result<Option<Row>> {
        let sql = sql.to_string();
        let args = args.to_vec();
        self.run(move |conn| first_row_positional(conn, &sql, &args)).await
    }

    async fn named_exec(&self, sql: &str, args: &NamedArgs) -> Result<ExecResult> {
        let sql = sql.to_string();
        let args = args.clone();
        self.run(move |conn| exec_named(conn, &sql, &args)).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.finish("COMMIT").await
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.finish("ROLLBACK").await
    }
}

impl Drop for SqliteTx {
    fn drop(&mut self) {
        if self.finished.load(Ordering::Acquire) {
            return;
        }
        let slot = self.conn.clone();
        let read_only = self.read_only;
        let rollback = move || {
            if let Some(conn) = slot.lock().take() {
                warn!("Transaction dropped without commit, rolling back");
                if let Err(e) = conn.execute_batch("ROLLBACK") {
                    warn!("Rollback of dropped transaction failed: {}", e);
                }
                if read_only {
                    let _ = conn.execute_batch("PRAGMA query_only = OFF");
                }
            }
        };
        // Keep blocking SQLite work off the async workers when we can
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(rollback);
            }
            Err(_) => rollback(),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Real(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

fn value_from_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(s) => Value::Text(String::from_utf8_lossy(s).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    }
}

fn exec_result(conn: &Connection, rows_affected: usize) -> ExecResult {
    ExecResult {
        rows_affected: rows_affected as u64,
        last_insert_id: Some(conn.last_insert_rowid()),
    }
}

fn read_rows(mut rows: rusqlite::Rows<'_>, columns: Arc<[String]>) -> rusqlite::Result<Rows> {
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(columns.len());
        for i in 0..columns.len() {
            values.push(value_from_ref(row.get_ref(i)?));
        }
        result.push(Row::new(columns.clone(), values));
    }
    Ok(Rows::new(columns, result))
}

/// Step only as far as the first row.
fn first_row(mut rows: rusqlite::Rows<'_>, columns: Arc<[String]>) -> rusqlite::Result<Option<Row>> {
    let Some(row) = rows.next()? else {
        return Ok(None);
    };
    let values = (0..columns.len())
        .map(|i| row.get_ref(i).map(value_from_ref))
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(Some(Row::new(columns, values)))
}

fn column_names(stmt: &rusqlite::Statement<'_>) -> Arc<[String]> {
    stmt.column_names().into_iter().map(String::from).collect()
}

fn exec_positional(conn: &Connection, sql: &str, args: &[Value]) -> rusqlite::Result<ExecResult> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows_affected = stmt.execute(params_from_iter(args.iter()))?;
    Ok(exec_result(conn, rows_affected))
}

fn query_positional(conn: &Connection, sql: &str, args: &[Value]) -> rusqlite::Result<Rows> {
    let mut stmt = conn.prepare_cached(sql)?;
    let columns = column_names(&stmt);
    let rows = stmt.query(params_from_iter(args.iter()))?;
    read_rows(rows, columns)
}

fn first_row_positional(conn: &Connection, sql: &str, args: &[Value]) -> rusqlite::Result<Option<Row>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let columns = column_names(&stmt);
    let rows = stmt.query(params_from_iter(args.iter()))?;
    first_row(rows, columns)
}

/// Bind every placeholder of `stmt` by name. Unused arguments are ignored.
fn bind_named(stmt: &mut rusqlite::Statement<'_>, args: &NamedArgs) -> rusqlite::Result<()> {
    let names: Vec<Option<String>> = (1..=stmt.parameter_count())
        .map(|idx| stmt.parameter_name(idx).map(str::to_string))
        .collect();

    for (i, name) in names.into_iter().enumerate() {
        let idx = i + 1;
        let name = name.ok_or_else(|| rusqlite::Error::InvalidParameterName(format!("?{idx}")))?;
        let value = args
            .get(&name)
            .ok_or_else(|| rusqlite::Error::InvalidParameterName(name.clone()))?;
        stmt.raw_bind_parameter(idx, value)?;
    }
    Ok(())
}

fn exec_named(conn: &Connection, sql: &str, args: &NamedArgs) -> rusqlite::Result<ExecResult> {
    let mut stmt = conn.prepare_cached(sql)?;
    bind_named(&mut stmt, args)?;
    let rows_affected = stmt.raw_execute()?;
    Ok(exec_result(conn, rows_affected))
}

fn query_named(conn: &Connection, sql: &str, args: &NamedArgs) -> rusqlite::Result<Rows> {
    let mut stmt = conn.prepare_cached(sql)?;
    let columns = column_names(&stmt);
    bind_named(&mut stmt, args)?;
    read_rows(stmt.raw_query(), columns)
}

fn first_row_named(conn: &Connection, sql: &str, args: &NamedArgs) -> rusqlite::Result<Option<Row>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let columns = column_names(&stmt);
    bind_named(&mut stmt, args)?;
    first_row(stmt.raw_query(), columns)
}
