//! Integration tests for database initialization

use fedreg_common::db::init::{create_schema, init_database};
use sqlx::sqlite::SqlitePoolOptions;
use std::path::PathBuf;

fn temp_db_path(tag: &str) -> PathBuf {
    PathBuf::from(format!("/tmp/fedreg-test-{}-{}.db", tag, std::process::id()))
}

fn cleanup(path: &PathBuf) {
    let _ = std::fs::remove_file(path);
    let _ = std::fs::remove_file(path.with_extension("db-wal"));
    let _ = std::fs::remove_file(path.with_extension("db-shm"));
}

#[tokio::test]
async fn test_database_creation_when_missing() {
    let db_path = temp_db_path("create");
    cleanup(&db_path);

    let result = init_database(&db_path).await;
    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");

    drop(result);
    cleanup(&db_path);
}

#[tokio::test]
async fn test_database_opens_existing() {
    let db_path = temp_db_path("existing");
    cleanup(&db_path);

    let pool1 = init_database(&db_path).await;
    assert!(pool1.is_ok());

    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());

    drop(pool1);
    drop(pool2);
    cleanup(&db_path);
}

#[tokio::test]
async fn test_database_creates_parent_directory() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("root").join("fedreg.db");

    let pool = init_database(&db_path).await.unwrap();
    assert!(db_path.exists());
    pool.close().await;
}

#[tokio::test]
async fn test_all_tables_created() {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    create_schema(&pool).await.unwrap();

    for table in ["users", "login_log", "federated_data", "model", "diagnosis_record"] {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1, "table {} missing", table);
    }
}

#[tokio::test]
async fn test_schema_creation_is_idempotent() {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    create_schema(&pool).await.unwrap();
    sqlx::query(
        "INSERT INTO model (model_name, algorithm, created_time, updated_time) \
         VALUES ('m', 'cnn', '2024-01-01 00:00:00', '2024-01-01 00:00:00')",
    )
    .execute(&pool)
    .await
    .unwrap();
    create_schema(&pool).await.unwrap();

    let (version, status): (String, String) =
        sqlx::query_as("SELECT model_version, model_status FROM model")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(version, "1.0.0");
    assert_eq!(status, "training");
}

#[tokio::test]
async fn test_users_role_constraint() {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    create_schema(&pool).await.unwrap();

    let result = sqlx::query(
        "INSERT INTO users (username, email, full_name, role, password_hash, password_salt, \
         created_time, updated_time) VALUES ('x', 'x@y', 'X', 'superuser', 'h', 's', \
         '2024-01-01 00:00:00', '2024-01-01 00:00:00')",
    )
    .execute(&pool)
    .await;
    assert!(result.is_err());
}
