//! A logical database spread over one primary and any number of read replicas.
//!
//! Writes and transactions go to the primary (the first entry of the topology
//! descriptor), reads rotate over the replicas. Open, close, ping and prepare
//! are applied to every physical database concurrently.
//!
//! ```no_run
//! # async fn demo() -> sqlfanout::Result<()> {
//! let db = sqlfanout::open("sqlite", "primary.db;replica1.db;replica2.db").await?;
//! db.exec("CREATE TABLE IF NOT EXISTS users (id INTEGER PRIMARY KEY, name TEXT)", &[]).await?;
//! let rows = db.query("SELECT id, name FROM users", &[]).await?;
//! println!("{} users", rows.len());
//! db.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod driver;
pub mod fanout;
pub mod named_stmt;
pub mod selector;
pub mod stmt;
pub mod types;

pub use db::{Db, TOPOLOGY_SEPARATOR};
pub use driver::{Conn, Driver, NamedStatement, Statement, Tx};
pub use named_stmt::NamedStmt;
pub use stmt::Stmt;
pub use types::{ExecResult, IsolationLevel, NamedArgs, QueryRow, Row, Rows, TxOptions, Value};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("unknown driver {0:?} (is it registered?)")]
    UnknownDriver(String),

    #[error("topology has no databases")]
    NoTargets,

    #[error("no rows in result set")]
    NoRows,

    #[error("statement is closed")]
    StatementClosed,

    #[error("connection pool is closed")]
    PoolClosed,

    #[error("transaction has already been committed or rolled back")]
    TxDone,

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("driver error: {0}")]
    Driver(String),

    #[error("{} databases failed, last error: {}", .0.len(), .0.last().map(|e| e.to_string()).unwrap_or_default())]
    Aggregate(Vec<Error>),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Every individual failure carried by this error, flattening aggregates.
    pub fn failures(&self) -> Vec<&Error> {
        match self {
            Error::Aggregate(errors) => errors.iter().flat_map(|e| e.failures()).collect(),
            other => vec![other],
        }
    }

    /// True when the error came from a query that matched nothing.
    pub fn is_no_rows(&self) -> bool {
        matches!(self, Error::NoRows | Error::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }
}

/// Open a logical database using a registered driver.
///
/// `source` is a `;`-separated list of data source names: the first is the
/// primary, the rest are replicas. Every database is connected concurrently.
pub async fn open(driver: &str, source: &str) -> Result<Db> {
    Db::open(driver, source).await
}

/// Unwrap a result, panicking with the error on failure.
///
/// Backs the `must_exec` family, for call sites (schema setup at startup and
/// the like) where a failed statement leaves nothing sensible to do.
#[track_caller]
pub fn must<T>(result: Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => panic!("sqlfanout: {e}"),
    }
}
