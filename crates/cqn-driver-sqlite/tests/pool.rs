use cqn_core::stmt::Value;
use cqn_driver_sqlite::{Pool, PoolOptions, Sqlite, SqliteConfig};
use pretty_assertions::assert_eq;
use std::time::Duration;

#[tokio::test]
async fn session_is_cleared_on_release() {
    let pool = Pool::new(Sqlite::in_memory(), &PoolOptions::default()).unwrap();

    let connection = pool.get().await.unwrap();
    connection.set([("$user.id", "alice")]).unwrap();
    assert_eq!(connection.get("$user.id").unwrap().as_deref(), Some("alice"));
    drop(connection);

    let connection = pool.get().await.unwrap();
    assert_eq!(connection.get("$user.id").unwrap(), None);

    let row = connection
        .prepare("SELECT session_context('$user.id') AS user")
        .unwrap()
        .get(&[])
        .unwrap()
        .unwrap();
    assert_eq!(row["user"], Value::Null);
}

#[tokio::test]
async fn in_memory_pool_keeps_its_data() {
    let pool = Pool::new(Sqlite::in_memory(), &PoolOptions { max: 4 }).unwrap();

    pool.get()
        .await
        .unwrap()
        .exec("CREATE TABLE Books (ID INTEGER PRIMARY KEY); INSERT INTO Books VALUES (1)")
        .unwrap();

    let row = pool
        .get()
        .await
        .unwrap()
        .prepare("SELECT count(*) AS n FROM Books")
        .unwrap()
        .get(&[])
        .unwrap()
        .unwrap();
    assert_eq!(row["n"], Value::I64(1));
}

#[tokio::test]
async fn default_pool_serializes_access() {
    let pool = Pool::new(Sqlite::in_memory(), &PoolOptions::default()).unwrap();

    let held = pool.get().await.unwrap();
    let waiting = tokio::time::timeout(Duration::from_millis(50), pool.get()).await;
    assert!(waiting.is_err());

    drop(held);
    let acquired = tokio::time::timeout(Duration::from_millis(500), pool.get()).await;
    assert!(acquired.is_ok());
}

#[tokio::test]
async fn tenants_get_their_own_database_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = SqliteConfig {
        database: Some("db.sqlite".into()),
        root: Some(dir.path().to_path_buf()),
        ..SqliteConfig::default()
    };

    let t1 = Pool::for_tenant(&config, Some("t1")).unwrap();
    let t2 = Pool::for_tenant(&config, Some("t2")).unwrap();
    assert_eq!(t1.target(), &Sqlite::open(dir.path().join("db-t1.sqlite")));

    t1.get()
        .await
        .unwrap()
        .exec("CREATE TABLE Books (ID INTEGER PRIMARY KEY)")
        .unwrap();

    assert!(dir.path().join("db-t1.sqlite").exists());

    let err = t2
        .get()
        .await
        .unwrap()
        .prepare("SELECT ID FROM Books")
        .unwrap_err();
    assert!(err.to_string().contains("no such table: Books"));
}

#[tokio::test]
async fn file_databases_use_wal() {
    let dir = tempfile::tempdir().unwrap();
    let pool = Pool::new(
        Sqlite::open(dir.path().join("app.db")),
        &PoolOptions::default(),
    )
    .unwrap();

    let connection = pool.get().await.unwrap();
    let row = connection
        .prepare("PRAGMA journal_mode")
        .unwrap()
        .get(&[])
        .unwrap()
        .unwrap();
    assert_eq!(row["journal_mode"], Value::from("wal"));
    assert!(connection.is_open());
}
