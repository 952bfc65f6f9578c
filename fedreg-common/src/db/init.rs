//! Database initialization
//!
//! Creates the database file on first run and brings the schema up with
//! idempotent `CREATE TABLE IF NOT EXISTS` statements.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create every table and index (safe to call repeatedly)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_users_table(pool).await?;
    create_login_log_table(pool).await?;
    create_federated_data_table(pool).await?;
    create_model_table(pool).await?;
    create_diagnosis_record_table(pool).await?;
    Ok(())
}

async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            user_id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            full_name TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'doctor' CHECK (role IN ('admin', 'doctor', 'researcher')),
            department TEXT,
            phone TEXT,
            avatar_url TEXT,
            password_hash TEXT NOT NULL,
            password_salt TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            last_login TEXT,
            created_time TEXT NOT NULL,
            updated_time TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_login_log_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS login_log (
            log_id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER REFERENCES users(user_id) ON DELETE SET NULL,
            username TEXT NOT NULL,
            login_ip TEXT,
            user_agent TEXT,
            status TEXT NOT NULL CHECK (status IN ('success', 'failed')),
            failure_reason TEXT,
            login_time TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_login_log_user ON login_log(user_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_federated_data_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS federated_data (
            data_id INTEGER PRIMARY KEY AUTOINCREMENT,
            image_url TEXT NOT NULL,
            case_description TEXT NOT NULL,
            data_type TEXT NOT NULL DEFAULT 'chest_xray',
            file_size INTEGER,
            upload_time TEXT NOT NULL,
            data_status TEXT NOT NULL DEFAULT 'pending',
            is_deleted INTEGER NOT NULL DEFAULT 0,
            updated_time TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_federated_data_upload_time ON federated_data(upload_time)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_model_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS model (
            model_id INTEGER PRIMARY KEY AUTOINCREMENT,
            model_name TEXT NOT NULL,
            model_version TEXT NOT NULL DEFAULT '1.0.0',
            learning_rate REAL,
            epochs INTEGER,
            aggregation_strategy TEXT,
            batch_size INTEGER,
            optimizer TEXT,
            algorithm TEXT NOT NULL,
            model_status TEXT NOT NULL DEFAULT 'training',
            model_path TEXT,
            description TEXT,
            created_time TEXT NOT NULL,
            updated_time TEXT NOT NULL,
            is_deleted INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_model_name_version ON model(model_name, model_version)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_diagnosis_record_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS diagnosis_record (
            diagnosis_id TEXT PRIMARY KEY,
            patient_name TEXT,
            patient_gender TEXT,
            patient_age TEXT,
            medical_record_id TEXT,
            clinical_info TEXT NOT NULL,
            diagnosis_report TEXT NOT NULL,
            model_name TEXT NOT NULL,
            pdf_url TEXT,
            pdf_storage TEXT NOT NULL DEFAULT 'none',
            status TEXT NOT NULL DEFAULT 'completed',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_diagnosis_record_created ON diagnosis_record(created_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
