//! Federated data records
//!
//! Every read filters `is_deleted = 0`; deletion only flips the flag.

use chrono::NaiveDateTime;
use fedreg_common::db::FederatedData;
use fedreg_common::{time, Error, Result};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::pagination::Pagination;

const DATA_COLUMNS: &str = "data_id, image_url, case_description, data_type, file_size, \
     upload_time, data_status, is_deleted, updated_time";

#[derive(Debug, Clone)]
pub struct NewFederatedData {
    pub image_url: String,
    pub case_description: String,
    pub data_type: String,
    pub file_size: Option<i64>,
}

/// Partial update; `None` leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct FederatedDataUpdate {
    pub case_description: Option<String>,
    pub image_url: Option<String>,
    pub data_type: Option<String>,
}

impl FederatedDataUpdate {
    pub fn is_empty(&self) -> bool {
        self.case_description.is_none() && self.image_url.is_none() && self.data_type.is_none()
    }
}

/// Row selection for listing
#[derive(Debug, Clone)]
pub enum DataFilter {
    All,
    /// Substring of the case description
    Keyword(String),
    /// Inclusive `upload_time` bounds
    UploadedBetween(NaiveDateTime, NaiveDateTime),
}

pub async fn create(db: &SqlitePool, data: &NewFederatedData) -> Result<FederatedData> {
    let now = time::now();
    let data_id = sqlx::query(
        r#"
        INSERT INTO federated_data (
            image_url, case_description, data_type, file_size,
            upload_time, data_status, is_deleted, updated_time
        ) VALUES (?, ?, ?, ?, ?, 'pending', 0, ?)
        "#,
    )
    .bind(&data.image_url)
    .bind(&data.case_description)
    .bind(&data.data_type)
    .bind(data.file_size)
    .bind(now)
    .bind(now)
    .execute(db)
    .await?
    .last_insert_rowid();

    get(db, data_id)
        .await?
        .ok_or_else(|| Error::Internal(format!("Federated data {} vanished after insert", data_id)))
}

pub async fn get(db: &SqlitePool, data_id: i64) -> Result<Option<FederatedData>> {
    let row = sqlx::query_as::<_, FederatedData>(&format!(
        "SELECT {} FROM federated_data WHERE data_id = ? AND is_deleted = 0",
        DATA_COLUMNS
    ))
    .bind(data_id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &DataFilter) {
    qb.push(" WHERE is_deleted = 0");
    match filter {
        DataFilter::All => {}
        DataFilter::Keyword(keyword) => {
            qb.push(" AND case_description LIKE ")
                .push_bind(format!("%{}%", keyword));
        }
        DataFilter::UploadedBetween(start, end) => {
            qb.push(" AND upload_time BETWEEN ")
                .push_bind(*start)
                .push(" AND ")
                .push_bind(*end);
        }
    }
}

/// Newest uploads first; returns the page and the filtered total
pub async fn list(
    db: &SqlitePool,
    filter: &DataFilter,
    window: Pagination,
) -> Result<(Vec<FederatedData>, i64)> {
    let mut count_qb: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT COUNT(*) FROM federated_data");
    push_filter(&mut count_qb, filter);
    let total: i64 = count_qb.build_query_scalar().fetch_one(db).await?;

    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {} FROM federated_data", DATA_COLUMNS));
    push_filter(&mut qb, filter);
    qb.push(" ORDER BY upload_time DESC, data_id DESC LIMIT ")
        .push_bind(window.page_size)
        .push(" OFFSET ")
        .push_bind(window.offset);
    let rows = qb.build_query_as::<FederatedData>().fetch_all(db).await?;

    Ok((rows, total))
}

/// Apply `update` to a live row; `None` if the row is missing or deleted
pub async fn update(
    db: &SqlitePool,
    data_id: i64,
    update: &FederatedDataUpdate,
) -> Result<Option<FederatedData>> {
    if get(db, data_id).await?.is_none() {
        return Ok(None);
    }

    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new("UPDATE federated_data SET updated_time = ");
    qb.push_bind(time::now());
    if let Some(v) = &update.case_description {
        qb.push(", case_description = ").push_bind(v.clone());
    }
    if let Some(v) = &update.image_url {
        qb.push(", image_url = ").push_bind(v.clone());
    }
    if let Some(v) = &update.data_type {
        qb.push(", data_type = ").push_bind(v.clone());
    }
    qb.push(" WHERE data_id = ")
        .push_bind(data_id)
        .push(" AND is_deleted = 0");
    qb.build().execute(db).await?;

    get(db, data_id).await
}

/// Returns false if the row is missing or already deleted
pub async fn soft_delete(db: &SqlitePool, data_id: i64) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE federated_data SET is_deleted = 1, updated_time = ? \
         WHERE data_id = ? AND is_deleted = 0",
    )
    .bind(time::now())
    .bind(data_id)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::memory_pool;

    fn sample(description: &str) -> NewFederatedData {
        NewFederatedData {
            image_url: "/uploads/images/chest_xray_abc.png".to_string(),
            case_description: description.to_string(),
            data_type: "chest_xray".to_string(),
            file_size: Some(2048),
        }
    }

    fn window() -> Pagination {
        Pagination {
            page: 1,
            page_size: 10,
            offset: 0,
        }
    }

    #[tokio::test]
    async fn test_create_defaults_to_pending() {
        let pool = memory_pool().await;
        let row = create(&pool, &sample("left lobe shadow")).await.unwrap();
        assert_eq!(row.data_status, "pending");
        assert!(!row.is_deleted);
        assert_eq!(row.file_size, Some(2048));
    }

    #[tokio::test]
    async fn test_keyword_search() {
        let pool = memory_pool().await;
        create(&pool, &sample("left lobe shadow")).await.unwrap();
        create(&pool, &sample("clear lungs")).await.unwrap();

        let (rows, total) = list(&pool, &DataFilter::Keyword("lobe".to_string()), window())
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].case_description, "left lobe shadow");
    }

    #[tokio::test]
    async fn test_soft_deleted_rows_are_invisible() {
        let pool = memory_pool().await;
        let row = create(&pool, &sample("cavity")).await.unwrap();

        assert!(soft_delete(&pool, row.data_id).await.unwrap());
        assert!(!soft_delete(&pool, row.data_id).await.unwrap());
        assert!(get(&pool, row.data_id).await.unwrap().is_none());

        let (rows, total) = list(&pool, &DataFilter::All, window()).await.unwrap();
        assert_eq!(total, 0);
        assert!(rows.is_empty());

        let update = FederatedDataUpdate {
            case_description: Some("edited".to_string()),
            ..Default::default()
        };
        assert!(super::update(&pool, row.data_id, &update).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upload_time_range() {
        let pool = memory_pool().await;
        create(&pool, &sample("today")).await.unwrap();

        let today = time::now().date();
        let start = today.and_hms_opt(0, 0, 0).unwrap();
        let end = (today + chrono::Duration::days(1)).and_hms_opt(0, 0, 0).unwrap();
        let (_, total) = list(&pool, &DataFilter::UploadedBetween(start, end), window())
            .await
            .unwrap();
        assert_eq!(total, 1);

        let (_, total) = list(&pool, &DataFilter::UploadedBetween(end, end), window())
            .await
            .unwrap();
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_update_changes_given_fields() {
        let pool = memory_pool().await;
        let row = create(&pool, &sample("initial")).await.unwrap();

        let update = FederatedDataUpdate {
            data_type: Some("mri".to_string()),
            ..Default::default()
        };
        let updated = super::update(&pool, row.data_id, &update).await.unwrap().unwrap();
        assert_eq!(updated.data_type, "mri");
        assert_eq!(updated.case_description, "initial");
    }
}
