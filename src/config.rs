use crate::db::Db;
use crate::driver::SqliteOptions;
use clap::Parser;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "sqlfanout")]
#[command(about = "sqlfanout - one primary for writes, many replicas for reads", long_about = None)]
pub struct Config {
    // Topology
    #[arg(long, default_value = "sqlite", env = "SQLFANOUT_DRIVER", help = "Registered driver name")]
    pub driver: String,

    #[arg(short, long, env = "SQLFANOUT_SOURCE", help = "Data sources separated by ';', primary first")]
    pub source: String,

    #[arg(long, default_value = "info", env = "SQLFANOUT_LOG_LEVEL")]
    pub log_level: String,

    // Pool configuration, applied to every database
    #[arg(long, default_value = "2", env = "SQLFANOUT_MAX_IDLE_CONNS", help = "Maximum idle connections per database (0 keeps none)")]
    pub max_idle_conns: usize,

    #[arg(long, default_value = "0", env = "SQLFANOUT_MAX_OPEN_CONNS", help = "Maximum open connections per database (0 is unlimited)")]
    pub max_open_conns: usize,

    #[arg(long, default_value = "0", env = "SQLFANOUT_CONN_MAX_LIFETIME", help = "Connection reuse limit in seconds (0 reuses forever)")]
    pub conn_max_lifetime: u64,

    // SQLite PRAGMA settings
    #[arg(long, default_value = "WAL", env = "SQLFANOUT_JOURNAL_MODE", help = "SQLite journal mode (WAL, DELETE, TRUNCATE, etc.)")]
    pub pragma_journal_mode: String,

    #[arg(long, default_value = "NORMAL", env = "SQLFANOUT_SYNCHRONOUS", help = "SQLite synchronous mode (NORMAL, FULL, OFF)")]
    pub pragma_synchronous: String,

    #[arg(long, default_value = "5000", env = "SQLFANOUT_BUSY_TIMEOUT_MS", help = "SQLite busy timeout in milliseconds")]
    pub busy_timeout_ms: u64,

    // Actions
    #[arg(long = "exec", help = "Statement to execute on the primary (repeatable)")]
    pub exec: Vec<String>,

    #[arg(long = "query", help = "Query to run on a replica, rows printed as JSON lines (repeatable)")]
    pub query: Vec<String>,
}

impl Config {
    /// Get a configuration instance with all values resolved from CLI args and environment variables
    pub fn load() -> Self {
        Config::parse()
    }

    /// Connection lifetime as Duration, `None` when unlimited
    pub fn conn_max_lifetime_duration(&self) -> Option<Duration> {
        match self.conn_max_lifetime {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn sqlite_options(&self) -> SqliteOptions {
        SqliteOptions {
            journal_mode: self.pragma_journal_mode.clone(),
            synchronous: self.pragma_synchronous.clone(),
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
            ..SqliteOptions::default()
        }
    }

    /// Push the pool limits down to every database of `db`.
    pub fn apply_pool_settings(&self, db: &Db) {
        db.set_max_open_conns(self.max_open_conns);
        db.set_max_idle_conns(self.max_idle_conns);
        db.set_conn_max_lifetime(self.conn_max_lifetime_duration());
    }
}
