use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};

use sqlfanout::config::Config;
use sqlfanout::driver::{self, SqliteDriver};
use sqlfanout::Db;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(config.log_level.clone())
        .init();

    // Display version
    info!("sqlfanout v{}", env!("CARGO_PKG_VERSION"));

    // The built-in sqlite driver picks up the configured pragmas
    driver::register(Arc::new(SqliteDriver::with_options("sqlite", config.sqlite_options())));

    let db = Db::open(&config.driver, &config.source)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to open {}: {}", config.source, e))?;
    config.apply_pool_settings(&db);

    let result = run(&db, &config).await;

    if let Err(e) = db.close().await {
        error!("Failed to close databases: {}", e);
    }
    result
}

async fn run(db: &Db, config: &Config) -> Result<()> {
    db.ping().await?;
    info!("All {} databases reachable", db.len());

    for sql in &config.exec {
        let result = db.exec(sql, &[]).await?;
        info!(
            "Executed on primary: {} rows affected, last insert id {:?}",
            result.rows_affected, result.last_insert_id
        );
    }

    for sql in &config.query {
        let rows = db.query(sql, &[]).await?;
        for row in rows.iter() {
            println!("{}", row.to_json());
        }
        info!("Query returned {} rows", rows.len());
    }

    Ok(())
}
