//! Diagnosis record stores
//!
//! The orchestrator only sees the [`DiagnosisStore`] trait. The in-memory
//! store is the default; the SQLite store keeps records across restarts.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{FromRow, SqlitePool};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

use super::types::{DiagnosisRecord, PatientInfo};
use crate::services::storage::StorageKind;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Duplicate diagnosis id: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Keyed record storage
#[async_trait]
pub trait DiagnosisStore: Send + Sync {
    /// Insert a new record; an existing id is rejected
    async fn insert(&self, record: DiagnosisRecord) -> Result<(), StoreError>;

    async fn get_by_id(&self, diagnosis_id: &str) -> Result<Option<DiagnosisRecord>, StoreError>;

    /// All records, in no particular order
    async fn list(&self) -> Result<Vec<DiagnosisRecord>, StoreError>;
}

// ============================================================================
// In-memory
// ============================================================================

/// Process-local store; records live until the process exits
#[derive(Default)]
pub struct InMemoryDiagnosisStore {
    records: RwLock<HashMap<String, DiagnosisRecord>>,
}

impl InMemoryDiagnosisStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DiagnosisStore for InMemoryDiagnosisStore {
    async fn insert(&self, record: DiagnosisRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.diagnosis_id) {
            return Err(StoreError::Duplicate(record.diagnosis_id));
        }
        records.insert(record.diagnosis_id.clone(), record);
        Ok(())
    }

    async fn get_by_id(&self, diagnosis_id: &str) -> Result<Option<DiagnosisRecord>, StoreError> {
        Ok(self.records.read().await.get(diagnosis_id).cloned())
    }

    async fn list(&self) -> Result<Vec<DiagnosisRecord>, StoreError> {
        Ok(self.records.read().await.values().cloned().collect())
    }
}

// ============================================================================
// SQLite
// ============================================================================

/// Store backed by the `diagnosis_record` table
pub struct SqliteDiagnosisStore {
    db: SqlitePool,
}

impl SqliteDiagnosisStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[derive(FromRow)]
struct DiagnosisRow {
    diagnosis_id: String,
    patient_name: Option<String>,
    patient_gender: Option<String>,
    patient_age: Option<String>,
    medical_record_id: Option<String>,
    clinical_info: String,
    diagnosis_report: String,
    model_name: String,
    pdf_url: Option<String>,
    pdf_storage: String,
    status: String,
    created_at: NaiveDateTime,
}

impl From<DiagnosisRow> for DiagnosisRecord {
    fn from(row: DiagnosisRow) -> Self {
        Self {
            diagnosis_id: row.diagnosis_id,
            patient_info: PatientInfo {
                name: row.patient_name,
                gender: row.patient_gender,
                age: row.patient_age,
                medical_record_id: row.medical_record_id,
            },
            clinical_info: row.clinical_info,
            diagnosis_report: row.diagnosis_report,
            model_name: row.model_name,
            pdf_url: row.pdf_url,
            pdf_storage: StorageKind::parse(&row.pdf_storage),
            timestamp: row.created_at,
            status: row.status,
        }
    }
}

const SELECT_COLUMNS: &str = "SELECT diagnosis_id, patient_name, patient_gender, patient_age, \
     medical_record_id, clinical_info, diagnosis_report, model_name, pdf_url, pdf_storage, \
     status, created_at FROM diagnosis_record";

#[async_trait]
impl DiagnosisStore for SqliteDiagnosisStore {
    async fn insert(&self, record: DiagnosisRecord) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO diagnosis_record (
                diagnosis_id, patient_name, patient_gender, patient_age, medical_record_id,
                clinical_info, diagnosis_report, model_name, pdf_url, pdf_storage, status,
                created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.diagnosis_id)
        .bind(&record.patient_info.name)
        .bind(&record.patient_info.gender)
        .bind(&record.patient_info.age)
        .bind(&record.patient_info.medical_record_id)
        .bind(&record.clinical_info)
        .bind(&record.diagnosis_report)
        .bind(&record.model_name)
        .bind(&record.pdf_url)
        .bind(record.pdf_storage.as_str())
        .bind(&record.status)
        .bind(record.timestamp)
        .execute(&self.db)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::Duplicate(record.diagnosis_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_by_id(&self, diagnosis_id: &str) -> Result<Option<DiagnosisRecord>, StoreError> {
        let row: Option<DiagnosisRow> =
            sqlx::query_as(&format!("{} WHERE diagnosis_id = ?", SELECT_COLUMNS))
                .bind(diagnosis_id)
                .fetch_optional(&self.db)
                .await?;
        Ok(row.map(Into::into))
    }

    async fn list(&self) -> Result<Vec<DiagnosisRecord>, StoreError> {
        let rows: Vec<DiagnosisRow> = sqlx::query_as(SELECT_COLUMNS).fetch_all(&self.db).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::Arc;

    fn record(id: &str, name: Option<&str>) -> DiagnosisRecord {
        DiagnosisRecord {
            diagnosis_id: id.to_string(),
            patient_info: PatientInfo {
                name: name.map(str::to_string),
                ..PatientInfo::default()
            },
            clinical_info: "cough".to_string(),
            diagnosis_report: "normal".to_string(),
            model_name: "qwen-max".to_string(),
            pdf_url: Some(format!("/docs/diagnosis_report_{}.pdf", id)),
            pdf_storage: StorageKind::Local,
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_micro_opt(3, 4, 5, 678_901)
                .unwrap(),
            status: "completed".to_string(),
        }
    }

    async fn sqlite_store() -> SqliteDiagnosisStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        fedreg_common::db::create_schema(&pool).await.unwrap();
        SqliteDiagnosisStore::new(pool)
    }

    async fn exercise(store: &dyn DiagnosisStore) {
        store.insert(record("diag_000000000001", Some("Ann"))).await.unwrap();
        store.insert(record("diag_000000000002", None)).await.unwrap();

        let dup = store.insert(record("diag_000000000001", Some("Other"))).await;
        assert!(matches!(dup, Err(StoreError::Duplicate(_))));

        let fetched = store.get_by_id("diag_000000000001").await.unwrap().unwrap();
        assert_eq!(fetched, record("diag_000000000001", Some("Ann")));
        assert!(store.get_by_id("diag_ffffffffffff").await.unwrap().is_none());

        assert_eq!(store.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        exercise(&InMemoryDiagnosisStore::new()).await;
    }

    #[tokio::test]
    async fn test_sqlite_store() {
        exercise(&sqlite_store().await).await;
    }

    #[tokio::test]
    async fn test_concurrent_inserts_are_all_visible() {
        let store = Arc::new(InMemoryDiagnosisStore::new());
        let mut handles = Vec::new();
        for i in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.insert(record(&format!("diag_{:012x}", i), None)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(store.list().await.unwrap().len(), 50);
    }
}
