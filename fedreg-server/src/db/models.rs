//! Model registry records

use fedreg_common::db::{ModelRecord, DEFAULT_MODEL_STATUS, DEFAULT_MODEL_VERSION};
use fedreg_common::{time, Error, Result};
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::pagination::Pagination;

const MODEL_COLUMNS: &str = "model_id, model_name, model_version, learning_rate, epochs, \
     aggregation_strategy, batch_size, optimizer, algorithm, model_status, model_path, \
     description, created_time, updated_time, is_deleted";

/// Writable model fields, shared by create and update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelFields {
    pub model_name: Option<String>,
    pub model_version: Option<String>,
    pub learning_rate: Option<f64>,
    pub epochs: Option<i64>,
    pub aggregation_strategy: Option<String>,
    pub batch_size: Option<i64>,
    pub optimizer: Option<String>,
    pub algorithm: Option<String>,
    pub model_status: Option<String>,
    pub model_path: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    ModelName,
    #[default]
    CreatedTime,
}

impl SortField {
    /// Unknown names fall back to creation time
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("model_name") => SortField::ModelName,
            _ => SortField::CreatedTime,
        }
    }

    fn column(self) -> &'static str {
        match self {
            SortField::ModelName => "model_name",
            SortField::CreatedTime => "created_time",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelQuery {
    /// Substring of the model name
    pub name: Option<String>,
    pub status: Option<String>,
    pub sort_by: SortField,
    pub ascending: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ModelWriteError {
    #[error("Model {name} version {version} already exists")]
    Duplicate { name: String, version: String },

    #[error(transparent)]
    Db(#[from] Error),
}

impl From<sqlx::Error> for ModelWriteError {
    fn from(e: sqlx::Error) -> Self {
        ModelWriteError::Db(Error::Database(e))
    }
}

async fn version_exists(
    db: &SqlitePool,
    name: &str,
    version: &str,
    except_model_id: Option<i64>,
) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM model WHERE model_name = ? AND model_version = ? \
         AND is_deleted = 0 AND model_id != ?",
    )
    .bind(name)
    .bind(version)
    .bind(except_model_id.unwrap_or(-1))
    .fetch_one(db)
    .await?;
    Ok(count > 0)
}

/// Insert a model; name and algorithm must already be validated as present
pub async fn create(
    db: &SqlitePool,
    fields: &ModelFields,
) -> std::result::Result<ModelRecord, ModelWriteError> {
    let name = fields.model_name.clone().unwrap_or_default();
    let version = fields
        .model_version
        .clone()
        .unwrap_or_else(|| DEFAULT_MODEL_VERSION.to_string());

    if version_exists(db, &name, &version, None).await? {
        return Err(ModelWriteError::Duplicate { name, version });
    }

    let now = time::now();
    let model_id = sqlx::query(
        r#"
        INSERT INTO model (
            model_name, model_version, learning_rate, epochs, aggregation_strategy,
            batch_size, optimizer, algorithm, model_status, model_path, description,
            created_time, updated_time, is_deleted
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0)
        "#,
    )
    .bind(&name)
    .bind(&version)
    .bind(fields.learning_rate)
    .bind(fields.epochs)
    .bind(&fields.aggregation_strategy)
    .bind(fields.batch_size)
    .bind(&fields.optimizer)
    .bind(fields.algorithm.clone().unwrap_or_default())
    .bind(
        fields
            .model_status
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL_STATUS.to_string()),
    )
    .bind(&fields.model_path)
    .bind(&fields.description)
    .bind(now)
    .bind(now)
    .execute(db)
    .await?
    .last_insert_rowid();

    get(db, model_id).await?.ok_or_else(|| {
        ModelWriteError::Db(Error::Internal(format!("Model {} vanished after insert", model_id)))
    })
}

pub async fn get(db: &SqlitePool, model_id: i64) -> Result<Option<ModelRecord>> {
    let model = sqlx::query_as::<_, ModelRecord>(&format!(
        "SELECT {} FROM model WHERE model_id = ? AND is_deleted = 0",
        MODEL_COLUMNS
    ))
    .bind(model_id)
    .fetch_optional(db)
    .await?;
    Ok(model)
}

fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, query: &ModelQuery) {
    qb.push(" WHERE is_deleted = 0");
    if let Some(name) = &query.name {
        qb.push(" AND model_name LIKE ").push_bind(format!("%{}%", name));
    }
    if let Some(status) = &query.status {
        qb.push(" AND model_status = ").push_bind(status.clone());
    }
}

pub async fn list(
    db: &SqlitePool,
    query: &ModelQuery,
    window: Pagination,
) -> Result<(Vec<ModelRecord>, i64)> {
    let mut count_qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM model");
    push_filter(&mut count_qb, query);
    let total: i64 = count_qb.build_query_scalar().fetch_one(db).await?;

    let direction = if query.ascending { "ASC" } else { "DESC" };
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {} FROM model", MODEL_COLUMNS));
    push_filter(&mut qb, query);
    qb.push(format!(
        " ORDER BY {col} {dir}, model_id {dir} LIMIT ",
        col = query.sort_by.column(),
        dir = direction
    ))
    .push_bind(window.page_size)
    .push(" OFFSET ")
    .push_bind(window.offset);
    let models = qb.build_query_as::<ModelRecord>().fetch_all(db).await?;

    Ok((models, total))
}

/// Apply `fields` to a live model; `Ok(None)` if missing or deleted
pub async fn update(
    db: &SqlitePool,
    model_id: i64,
    fields: &ModelFields,
) -> std::result::Result<Option<ModelRecord>, ModelWriteError> {
    let Some(current) = get(db, model_id).await? else {
        return Ok(None);
    };

    let name = fields.model_name.clone().unwrap_or(current.model_name);
    let version = fields.model_version.clone().unwrap_or(current.model_version);
    if version_exists(db, &name, &version, Some(model_id)).await? {
        return Err(ModelWriteError::Duplicate { name, version });
    }

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE model SET updated_time = ");
    qb.push_bind(time::now());
    qb.push(", model_name = ").push_bind(name);
    qb.push(", model_version = ").push_bind(version);
    if let Some(v) = fields.learning_rate {
        qb.push(", learning_rate = ").push_bind(v);
    }
    if let Some(v) = fields.epochs {
        qb.push(", epochs = ").push_bind(v);
    }
    if let Some(v) = &fields.aggregation_strategy {
        qb.push(", aggregation_strategy = ").push_bind(v.clone());
    }
    if let Some(v) = fields.batch_size {
        qb.push(", batch_size = ").push_bind(v);
    }
    if let Some(v) = &fields.optimizer {
        qb.push(", optimizer = ").push_bind(v.clone());
    }
    if let Some(v) = &fields.algorithm {
        qb.push(", algorithm = ").push_bind(v.clone());
    }
    if let Some(v) = &fields.model_status {
        qb.push(", model_status = ").push_bind(v.clone());
    }
    if let Some(v) = &fields.model_path {
        qb.push(", model_path = ").push_bind(v.clone());
    }
    if let Some(v) = &fields.description {
        qb.push(", description = ").push_bind(v.clone());
    }
    qb.push(" WHERE model_id = ").push_bind(model_id);
    qb.build().execute(db).await?;

    Ok(get(db, model_id).await?)
}

/// Returns false if the model is missing or already deleted
pub async fn soft_delete(db: &SqlitePool, model_id: i64) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE model SET is_deleted = 1, updated_time = ? WHERE model_id = ? AND is_deleted = 0",
    )
    .bind(time::now())
    .bind(model_id)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}
