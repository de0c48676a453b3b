use crate::driver::{self, Conn, Driver, NamedStatement, Statement, Tx};
use crate::fanout::{fan_out, fan_out_collect};
use crate::named_stmt::NamedStmt;
use crate::selector::Selector;
use crate::stmt::Stmt;
use crate::types::{ExecResult, NamedArgs, QueryRow, Rows, TxOptions, Value};
use crate::{Error, Result, must};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, trace, warn};

/// Separates data source names in a topology descriptor. No escaping.
pub const TOPOLOGY_SEPARATOR: char = ';';

/// A logical database: one primary for writes, any number of secondaries for
/// reads.
///
/// Cloning is cheap and clones share the physical databases and the read
/// counter.
#[derive(Clone)]
pub struct Db {
    conns: Arc<[Arc<dyn Conn>]>,
    selector: Arc<Selector>,
}

impl Db {
    /// Open every database in `source` with the driver registered as `driver`.
    pub async fn open(driver: &str, source: &str) -> Result<Db> {
        let driver = driver::lookup(driver)?;
        Self::open_with_driver(driver, source).await
    }

    pub async fn open_with_driver(driver: Arc<dyn Driver>, source: &str) -> Result<Db> {
        let dsns: Vec<String> = source.split(TOPOLOGY_SEPARATOR).map(str::to_string).collect();
        let name = driver.name().to_string();

        let connect = |i: usize| {
            let driver = driver.clone();
            let dsn = dsns[i].clone();
            async move { driver.connect(&dsn).await }
        };
        match fan_out_collect(dsns.len(), connect).await {
            Ok(conns) => {
                info!("Opened {} database with {} secondaries", name, conns.len().saturating_sub(1));
                Self::from_conns(conns)
            }
            Err(partial) => {
                let opened: Vec<Arc<dyn Conn>> = partial.succeeded.into_iter().map(|(_, c)| c).collect();
                warn!(
                    "Opening {} of {} databases failed, closing the rest: {}",
                    dsns.len() - opened.len(),
                    dsns.len(),
                    partial.error
                );
                if let Err(e) = close_conns(&opened).await {
                    warn!("Failed to close databases after open error: {}", e);
                }
                Err(partial.error)
            }
        }
    }

    /// Build a logical database from already connected physical databases.
    /// The first one is the primary.
    pub fn from_conns(conns: Vec<Arc<dyn Conn>>) -> Result<Db> {
        if conns.is_empty() {
            return Err(Error::NoTargets);
        }
        Ok(Db { conns: conns.into(), selector: Arc::new(Selector::new()) })
    }

    /// Close every physical database concurrently.
    pub async fn close(&self) -> Result<()> {
        close_conns(&self.conns).await?;
        info!("Closed {} databases", self.conns.len());
        Ok(())
    }

    /// Check that every physical database is reachable.
    pub async fn ping(&self) -> Result<()> {
        fan_out(self.conns.len(), |i| {
            let conn = self.conns[i].clone();
            async move { conn.ping().await }
        })
        .await
    }

    /// Maximum idle connections per physical database. 0 keeps none.
    pub fn set_max_idle_conns(&self, n: usize) {
        for conn in self.conns.iter() {
            conn.set_max_idle_conns(n);
        }
    }

    /// Maximum open connections per physical database. 0 means unlimited.
    pub fn set_max_open_conns(&self, n: usize) {
        for conn in self.conns.iter() {
            conn.set_max_open_conns(n);
        }
    }

    /// How long a connection may be reused. `None` reuses forever.
    pub fn set_conn_max_lifetime(&self, lifetime: Option<Duration>) {
        for conn in self.conns.iter() {
            conn.set_conn_max_lifetime(lifetime);
        }
    }

    /// The primary's driver.
    pub fn driver(&self) -> Arc<dyn Driver> {
        self.primary().driver()
    }

    pub fn primary(&self) -> &Arc<dyn Conn> {
        &self.conns[0]
    }

    /// The database that serves the next read. Each call advances the
    /// round-robin.
    pub fn secondary(&self) -> &Arc<dyn Conn> {
        let idx = self.selector.next(self.conns.len());
        trace!("Routing read to database {}", idx);
        &self.conns[idx]
    }

    /// Every physical database, primary first.
    pub fn conns(&self) -> &[Arc<dyn Conn>] {
        &self.conns
    }

    /// Number of physical databases, primary included.
    pub fn len(&self) -> usize {
        self.conns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }

    pub async fn begin(&self) -> Result<Box<dyn Tx>> {
        self.primary().begin(TxOptions::default()).await
    }

    pub async fn begin_with(&self, opts: TxOptions) -> Result<Box<dyn Tx>> {
        self.primary().begin(opts).await
    }

    /// Execute a statement on the primary.
    pub async fn exec(&self, sql: &str, args: &[Value]) -> Result<ExecResult> {
        self.primary().exec(sql, args).await
    }

    /// Execute a statement on the primary, panicking if it fails.
    pub async fn must_exec(&self, sql: &str, args: &[Value]) -> ExecResult {
        must(self.exec(sql, args).await)
    }

    pub async fn named_exec(&self, sql: &str, args: &NamedArgs) -> Result<ExecResult> {
        self.primary().named_exec(sql, args).await
    }

    /// [`named_exec`](Self::named_exec) with parameters taken from the fields
    /// of any serializable struct or map.
    pub async fn named_exec_from<A: Serialize + ?Sized>(&self, sql: &str, arg: &A) -> Result<ExecResult> {
        self.named_exec(sql, &NamedArgs::from_serialize(arg)?).await
    }

    /// Run a query on a secondary.
    pub async fn query(&self, sql: &str, args: &[Value]) -> Result<Rows> {
        self.secondary().query(sql, args).await
    }

    /// Run a query expected to return at most one row on a secondary.
    /// Errors are deferred until the row is scanned.
    pub async fn query_row(&self, sql: &str, args: &[Value]) -> QueryRow {
        QueryRow::new(self.secondary().query_row(sql, args).await)
    }

    /// Run a query on a secondary and scan every row into `T`.
    pub async fn select<T: DeserializeOwned>(&self, sql: &str, args: &[Value]) -> Result<Vec<T>> {
        self.query(sql, args).await?.decode_all()
    }

    /// Run a query on a secondary and scan the first row into `T`.
    /// Returns [`Error::NoRows`] when nothing matched.
    pub async fn get<T: DeserializeOwned>(&self, sql: &str, args: &[Value]) -> Result<T> {
        self.query_row(sql, args).await.scan()
    }

    pub async fn named_query(&self, sql: &str, args: &NamedArgs) -> Result<Rows> {
        self.secondary().named_query(sql, args).await
    }

    pub async fn named_query_from<A: Serialize + ?Sized>(&self, sql: &str, arg: &A) -> Result<Rows> {
        self.named_query(sql, &NamedArgs::from_serialize(arg)?).await
    }

    /// Prepare `sql` on every physical database.
    ///
    /// If any of them fails, the statements prepared on the others are closed
    /// and the error is returned.
    pub async fn prepare(&self, sql: &str) -> Result<Stmt> {
        let prepare = |i: usize| {
            let conn = self.conns[i].clone();
            let sql = sql.to_string();
            async move { conn.prepare(&sql).await.map(Arc::<dyn Statement>::from) }
        };
        match fan_out_collect(self.conns.len(), prepare).await {
            Ok(stmts) => Ok(Stmt::new(self.selector.clone(), stmts)),
            Err(partial) => {
                let prepared: Vec<_> = partial.succeeded.into_iter().map(|(_, s)| s).collect();
                if let Err(e) = crate::stmt::close_all(&prepared).await {
                    warn!("Failed to close statements after prepare error: {}", e);
                }
                Err(partial.error)
            }
        }
    }

    /// Prepare `sql` with named parameters on every physical database.
    pub async fn prepare_named(&self, sql: &str) -> Result<NamedStmt> {
        let prepare = |i: usize| {
            let conn = self.conns[i].clone();
            let sql = sql.to_string();
            async move { conn.prepare_named(&sql).await.map(Arc::<dyn NamedStatement>::from) }
        };
        match fan_out_collect(self.conns.len(), prepare).await {
            Ok(stmts) => Ok(NamedStmt::new(self.selector.clone(), stmts)),
            Err(partial) => {
                let prepared: Vec<_> = partial.succeeded.into_iter().map(|(_, s)| s).collect();
                if let Err(e) = crate::named_stmt::close_all(&prepared).await {
                    warn!("Failed to close named statements after prepare error: {}", e);
                }
                Err(partial.error)
            }
        }
    }

    /// Read routing decisions made so far by this handle and its statements.
    pub fn reads_routed(&self) -> u64 {
        self.selector.count()
    }
}

async fn close_conns(conns: &[Arc<dyn Conn>]) -> Result<()> {
    fan_out(conns.len(), |i| {
        let conn = conns[i].clone();
        async move { conn.close().await }
    })
    .await
}

impl fmt::Debug for Db {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Db")
            .field("primary", &self.primary().dsn())
            .field("secondaries", &self.conns[1..].iter().map(|c| c.dsn()).collect::<Vec<_>>())
            .finish()
    }
}
