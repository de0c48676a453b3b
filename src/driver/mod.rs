//! The interface a physical database client has to provide, and the registry
//! that maps driver names to implementations.

pub mod sqlite;

use crate::types::{ExecResult, NamedArgs, Rows, Row, TxOptions, Value};
use crate::{Error, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

pub use sqlite::{SqliteDriver, SqliteOptions};

/// Connects to physical databases given a data source name.
#[async_trait]
pub trait Driver: Send + Sync {
    fn name(&self) -> &str;

    /// Open a database and verify it is reachable.
    async fn connect(&self, dsn: &str) -> Result<Arc<dyn Conn>>;
}

/// One physical database, typically backed by its own connection pool.
#[async_trait]
pub trait Conn: Send + Sync {
    fn driver(&self) -> Arc<dyn Driver>;

    /// The data source name this database was opened with.
    fn dsn(&self) -> &str;

    async fn ping(&self) -> Result<()>;
    async fn close(&self) -> Result<()>;

    /// Maximum idle connections kept around. 0 keeps none.
    fn set_max_idle_conns(&self, n: usize);
    /// Maximum open connections. 0 means unlimited.
    fn set_max_open_conns(&self, n: usize);
    /// How long a connection may be reused. `None` reuses forever.
    fn set_conn_max_lifetime(&self, lifetime: Option<Duration>);

    async fn begin(&self, opts: TxOptions) -> Result<Box<dyn Tx>>;

    async fn exec(&self, sql: &str, args: &[Value]) -> Result<ExecResult>;
    async fn query(&self, sql: &str, args: &[Value]) -> Result<Rows>;

    /// First row of the result, if any.
    async fn query_row(&self, sql: &str, args: &[Value]) -> Result<Option<Row>> {
        Ok(self.query(sql, args).await?.into_first())
    }

    async fn named_exec(&self, sql: &str, args: &NamedArgs) -> Result<ExecResult>;
    async fn named_query(&self, sql: &str, args: &NamedArgs) -> Result<Rows>;

    async fn prepare(&self, sql: &str) -> Result<Box<dyn Statement>>;
    async fn prepare_named(&self, sql: &str) -> Result<Box<dyn NamedStatement>>;
}

/// A statement prepared against one physical database, positional parameters.
#[async_trait]
pub trait Statement: Send + Sync {
    async fn exec(&self, args: &[Value]) -> Result<ExecResult>;
    async fn query(&self, args: &[Value]) -> Result<Rows>;

    async fn query_row(&self, args: &[Value]) -> Result<Option<Row>> {
        Ok(self.query(args).await?.into_first())
    }

    async fn close(&self) -> Result<()>;
}

/// A statement prepared against one physical database, named parameters.
#[async_trait]
pub trait NamedStatement: Send + Sync {
    async fn exec(&self, args: &NamedArgs) -> Result<ExecResult>;
    async fn query(&self, args: &NamedArgs) -> Result<Rows>;

    async fn query_row(&self, args: &NamedArgs) -> Result<Option<Row>> {
        Ok(self.query(args).await?.into_first())
    }

    async fn close(&self) -> Result<()>;
}

/// A transaction bound to one connection. Dropping it unfinished rolls back.
#[async_trait]
pub trait Tx: Send + Sync {
    async fn exec(&self, sql: &str, args: &[Value]) -> Result<ExecResult>;
    async fn query(&self, sql: &str, args: &[Value]) -> Result<Rows>;

    async fn query_row(&self, sql: &str, args: &[Value]) -> Result<Option<Row>> {
        Ok(self.query(sql, args).await?.into_first())
    }

    async fn named_exec(&self, sql: &str, args: &NamedArgs) -> Result<ExecResult>;

    async fn commit(self: Box<Self>) -> Result<()>;
    async fn rollback(self: Box<Self>) -> Result<()>;
}

static REGISTRY: Lazy<RwLock<BTreeMap<String, Arc<dyn Driver>>>> = Lazy::new(|| {
    let mut drivers: BTreeMap<String, Arc<dyn Driver>> = BTreeMap::new();
    let sqlite = Arc::new(SqliteDriver::new());
    drivers.insert(sqlite.name().to_string(), sqlite);
    RwLock::new(drivers)
});

/// Make a driver available by name, replacing any driver of the same name.
pub fn register(driver: Arc<dyn Driver>) {
    let name = driver.name().to_string();
    if REGISTRY.write().insert(name.clone(), driver).is_some() {
        tracing::debug!("Replaced driver {}", name);
    }
}

pub fn lookup(name: &str) -> Result<Arc<dyn Driver>> {
    REGISTRY
        .read()
        .get(name)
        .cloned()
        .ok_or_else(|| Error::UnknownDriver(name.to_string()))
}

/// Names of all registered drivers, sorted.
pub fn drivers() -> Vec<String> {
    REGISTRY.read().keys().cloned().collect()
}
