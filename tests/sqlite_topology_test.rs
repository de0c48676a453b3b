use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use sqlfanout::{Db, Error, NamedArgs, Value};
use std::collections::HashMap;
use tempfile::TempDir;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Item {
    id: i64,
    name: String,
    price: f64,
}

/// Open `n` file databases, each with an `origin` table naming itself and an
/// empty `items` table.
async fn file_topology(n: usize) -> (TempDir, Db) {
    let dir = TempDir::new().unwrap();
    let source = (0..n)
        .map(|i| dir.path().join(format!("db{i}.sqlite")).display().to_string())
        .collect::<Vec<_>>()
        .join(";");

    let db = sqlfanout::open("sqlite", &source).await.unwrap();
    for (i, conn) in db.conns().iter().enumerate() {
        conn.exec("CREATE TABLE origin (name TEXT NOT NULL)", &[]).await.unwrap();
        conn.exec("INSERT INTO origin VALUES (?1)", &[Value::from(format!("db{i}"))]).await.unwrap();
        conn.exec("CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT NOT NULL, price REAL NOT NULL)", &[])
            .await
            .unwrap();
    }
    (dir, db)
}

async fn count_items(db: &Db, idx: usize) -> i64 {
    let rows = db.conns()[idx].query("SELECT COUNT(*) FROM items", &[]).await.unwrap();
    rows.first().and_then(|r| r.get(0)).and_then(|v| v.as_i64()).unwrap()
}

#[tokio::test]
async fn test_reads_alternate_between_replica_files() {
    let (_dir, db) = file_topology(3).await;

    let mut served = Vec::new();
    for _ in 0..4 {
        let name: String = db.get("SELECT name FROM origin", &[]).await.unwrap();
        served.push(name);
    }
    assert_eq!(served, vec!["db1", "db2", "db1", "db2"]);
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_writes_land_on_primary_file() {
    let (_dir, db) = file_topology(3).await;

    let res = db
        .exec("INSERT INTO items (name, price) VALUES (?1, ?2)", &[Value::from("pen"), Value::from(1.5)])
        .await
        .unwrap();
    assert_eq!(res.rows_affected, 1);
    assert_eq!(res.last_insert_id, Some(1));

    let item = Item { id: 2, name: "ink".to_string(), price: 4.25 };
    let args = NamedArgs::from_serialize(&item).unwrap();
    db.named_exec("INSERT INTO items (id, name, price) VALUES (:id, :name, :price)", &args)
        .await
        .unwrap();

    assert_eq!(count_items(&db, 0).await, 2);
    assert_eq!(count_items(&db, 1).await, 0);
    assert_eq!(count_items(&db, 2).await, 0);
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_select_and_get_scan_into_structs() {
    // a lone database is both primary and replica
    let (_dir, db) = file_topology(1).await;
    db.must_exec("INSERT INTO items (name, price) VALUES ('pen', 1.5), ('ink', 4.25)", &[]).await;

    let items: Vec<Item> = db.select("SELECT id, name, price FROM items ORDER BY id", &[]).await.unwrap();
    assert_eq!(
        items,
        vec![
            Item { id: 1, name: "pen".to_string(), price: 1.5 },
            Item { id: 2, name: "ink".to_string(), price: 4.25 },
        ]
    );

    let ink: Item = db.get("SELECT id, name, price FROM items WHERE name = ?1", &[Value::from("ink")]).await.unwrap();
    assert_eq!(ink.id, 2);

    let (count, total): (i64, f64) = db.get("SELECT COUNT(*), SUM(price) FROM items", &[]).await.unwrap();
    assert_eq!((count, total), (2, 5.75));

    let missing = db.get::<Item>("SELECT id, name, price FROM items WHERE id = 99", &[]).await;
    assert!(matches!(missing, Err(Error::NoRows)));

    let rows = db
        .named_query("SELECT name FROM items WHERE price > :min", &NamedArgs::new().with(":min", 2.0))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_prepared_statements_across_files() {
    let (_dir, db) = file_topology(3).await;

    let insert = db.prepare("INSERT INTO items (name, price) VALUES (?1, ?2)").await.unwrap();
    assert_eq!(insert.len(), 3);
    insert.exec(&[Value::from("pen"), Value::from(1.5)]).await.unwrap();
    insert.exec(&[Value::from("ink"), Value::from(4.25)]).await.unwrap();
    assert_eq!(count_items(&db, 0).await, 2);
    assert_eq!(count_items(&db, 1).await, 0);

    let origin = db.prepare("SELECT name FROM origin").await.unwrap();
    let first: String = origin.get(&[]).await.unwrap();
    let second: Vec<String> = origin.select(&[]).await.unwrap();
    assert_eq!(first, "db1");
    assert_eq!(second, vec!["db2".to_string()]);

    let named = db.prepare_named("SELECT name FROM origin WHERE name <> :skip").await.unwrap();
    let name: String = named.get(&NamedArgs::new().with("skip", "nothing")).await.unwrap();
    assert_eq!(name, "db1");

    insert.close().await.unwrap();
    origin.close().await.unwrap();
    named.close().await.unwrap();
    assert!(matches!(insert.exec(&[Value::from("x"), Value::from(0.0)]).await, Err(Error::StatementClosed)));
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_prepare_fails_when_one_replica_lacks_the_table() {
    let (_dir, db) = file_topology(3).await;
    db.conns()[2].exec("DROP TABLE items", &[]).await.unwrap();

    let err = db.prepare("SELECT id FROM items").await.err().unwrap();
    assert!(matches!(err, Error::Sqlite(_)), "got {err:?}");
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_transaction_on_primary() {
    let (_dir, db) = file_topology(2).await;

    let tx = db.begin().await.unwrap();
    tx.exec("INSERT INTO items (name, price) VALUES ('pen', 1.5)", &[]).await.unwrap();
    tx.named_exec("INSERT INTO items (name, price) VALUES (:name, :price)", &NamedArgs::new().with("name", "ink").with("price", 4.25))
        .await
        .unwrap();
    tx.commit().await.unwrap();
    assert_eq!(count_items(&db, 0).await, 2);

    let tx = db.begin().await.unwrap();
    tx.exec("DELETE FROM items", &[]).await.unwrap();
    tx.rollback().await.unwrap();
    assert_eq!(count_items(&db, 0).await, 2);
    assert_eq!(count_items(&db, 1).await, 0);
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_memory_targets_are_separate_databases() {
    let db = sqlfanout::open("sqlite", ":memory:;:memory:").await.unwrap();
    db.exec("CREATE TABLE only_on_primary (x INTEGER)", &[]).await.unwrap();

    let err = db.query("SELECT x FROM only_on_primary", &[]).await.unwrap_err();
    assert!(matches!(err, Error::Sqlite(_)));

    let rows = db.conns()[0].query("SELECT x FROM only_on_primary", &[]).await.unwrap();
    assert!(rows.is_empty());
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_open_fails_when_any_target_fails() {
    let dir = TempDir::new().unwrap();
    let good = dir.path().join("good.sqlite");
    let bad = dir.path().join("missing").join("bad.sqlite");
    let source = format!("{};{}", good.display(), bad.display());

    let err = sqlfanout::open("sqlite", &source).await.unwrap_err();
    assert!(matches!(err, Error::Sqlite(_)), "got {err:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reads_are_balanced() {
    let (_dir, db) = file_topology(4).await;
    db.set_max_open_conns(4);

    let mut handles = Vec::new();
    for _ in 0..60 {
        let db = db.clone();
        handles.push(tokio::spawn(async move {
            db.get::<String>("SELECT name FROM origin", &[]).await.unwrap()
        }));
    }

    let mut served: HashMap<String, usize> = HashMap::new();
    for handle in handles {
        *served.entry(handle.await.unwrap()).or_default() += 1;
    }
    assert_eq!(served.get("db0"), None);
    assert_eq!(served.get("db1"), Some(&20));
    assert_eq!(served.get("db2"), Some(&20));
    assert_eq!(served.get("db3"), Some(&20));
    assert_eq!(db.reads_routed(), 60);
    db.close().await.unwrap();
}
