//! Repositories over the shared SQLite pool
//!
//! Schema creation lives in `fedreg_common::db`; these modules only read and
//! write rows.

pub mod federated_data;
pub mod login_log;
pub mod models;
pub mod users;

#[cfg(test)]
pub(crate) mod test_support {
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;

    /// Fresh in-memory database with the full schema
    pub async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        fedreg_common::db::create_schema(&pool).await.unwrap();
        pool
    }
}
