//! Federated data endpoints under `/api/v1`
//!
//! List responses use the simple row form; create and update return the
//! full row. Field names are camelCase.

use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use fedreg_common::api::{ApiEnvelope, PageInfo, PagedList};
use fedreg_common::db::{normalize_data_type, FederatedData};
use fedreg_common::{ids, time};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use super::extract::{ApiJson, ApiQuery};
use super::form::{MultipartForm, UploadedFile};
use crate::db::federated_data::{self, DataFilter, FederatedDataUpdate, NewFederatedData};
use crate::error::{ApiError, ApiResult};
use crate::pagination::{calculate_pagination, Pagination};
use crate::services::media::{allowed_extension, image_mime_type};
use crate::services::PersistOutcome;
use crate::AppState;

/// Image types accepted for federated uploads
pub const ALLOWED_UPLOAD_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp"];

/// Data type of standalone image uploads without one
const DEFAULT_UPLOAD_DATA_TYPE: &str = "other";

/// List entry
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSummary {
    pub data_id: i64,
    pub case_description: String,
    pub upload_time: String,
    pub data_status: String,
    pub image_url: String,
}

impl From<FederatedData> for DataSummary {
    fn from(row: FederatedData) -> Self {
        Self {
            data_id: row.data_id,
            case_description: row.case_description,
            upload_time: time::format_display(&row.upload_time),
            data_status: row.data_status,
            image_url: row.image_url,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub keyword: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRangeQuery {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    pub case_description: Option<String>,
    pub image_url: Option<String>,
    pub data_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUploadResponse {
    pub image_url: String,
}

fn window(state: &AppState, page: Option<i64>, page_size: Option<i64>) -> Pagination {
    calculate_pagination(
        page,
        page_size,
        state.config.pagination.default_page_size,
        state.config.pagination.max_page_size,
    )
}

async fn list_page(
    state: &AppState,
    filter: DataFilter,
    window: Pagination,
) -> ApiResult<Json<ApiEnvelope<PagedList<DataSummary>>>> {
    let (rows, total) = federated_data::list(&state.db, &filter, window).await?;
    Ok(Json(ApiEnvelope::success(PagedList {
        list: rows.into_iter().map(DataSummary::from).collect(),
        pagination: PageInfo::new(window.page, window.page_size, total),
    })))
}

/// Validate an uploaded image and store it under `images/<dataType>_<hex>.<ext>`
async fn store_image(
    state: &AppState,
    file: Option<UploadedFile>,
    data_type: &str,
) -> ApiResult<(String, usize)> {
    let file = file.ok_or_else(|| ApiError::BadRequest("No file uploaded".to_string()))?;
    if file.filename.is_empty() {
        return Err(ApiError::BadRequest("No file selected".to_string()));
    }
    let extension = allowed_extension(&file.filename, ALLOWED_UPLOAD_EXTENSIONS).ok_or_else(|| {
        ApiError::BadRequest(format!(
            "Unsupported file type; allowed: {}",
            ALLOWED_UPLOAD_EXTENSIONS.join(", ")
        ))
    })?;

    let object = ids::object_name(data_type, &extension);
    let key = format!("images/{}", object);
    let size = file.bytes.len();

    match state
        .images
        .persist(&key, &key, file.bytes, image_mime_type(&extension))
        .await
    {
        PersistOutcome::NotStored => {
            error!(key = %key, "Image upload failed on every storage tier");
            Err(ApiError::Internal("File upload failed".to_string()))
        }
        outcome => {
            let url = outcome.url().unwrap_or_default().to_string();
            Ok((url, size))
        }
    }
}

/// POST /api/v1/federated-data
pub async fn create_data(
    State(state): State<AppState>,
    mut form: MultipartForm,
) -> ApiResult<Json<ApiEnvelope<FederatedData>>> {
    let file = form.take_file("file");
    if file.is_none() {
        return Err(ApiError::BadRequest("No file uploaded".to_string()));
    }
    let case_description = form.trimmed("caseDescription").ok_or_else(|| {
        ApiError::BadRequest("Missing required field: caseDescription".to_string())
    })?;
    let data_type = normalize_data_type(form.text("dataType"));

    let (image_url, stored_size) = store_image(&state, file, data_type).await?;
    let file_size = form
        .trimmed("fileSize")
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(stored_size as i64);

    let row = federated_data::create(
        &state.db,
        &NewFederatedData {
            image_url,
            case_description,
            data_type: data_type.to_string(),
            file_size: Some(file_size),
        },
    )
    .await?;

    info!(data_id = row.data_id, data_type = %row.data_type, "Federated data created");
    Ok(Json(ApiEnvelope::with_message("Data created successfully", row)))
}

/// GET /api/v1/federated-data
pub async fn list_data(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<Json<ApiEnvelope<PagedList<DataSummary>>>> {
    let window = window(&state, query.page, query.page_size);
    list_page(&state, DataFilter::All, window).await
}

/// GET /api/v1/federated-data/search
pub async fn search_data(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> ApiResult<Json<ApiEnvelope<PagedList<DataSummary>>>> {
    let keyword = query
        .keyword
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Search keyword must not be empty".to_string()))?;
    let window = window(&state, query.page, query.page_size);
    list_page(&state, DataFilter::Keyword(keyword), window).await
}

/// GET /api/v1/federated-data/by-time
///
/// Bounds are `YYYY-MM-DD` dates taken at midnight; both are inclusive.
pub async fn data_by_time(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TimeRangeQuery>,
) -> ApiResult<Json<ApiEnvelope<PagedList<DataSummary>>>> {
    let (Some(start), Some(end)) = (
        query.start_time.filter(|s| !s.is_empty()),
        query.end_time.filter(|s| !s.is_empty()),
    ) else {
        return Err(ApiError::BadRequest(
            "Start time and end time are required".to_string(),
        ));
    };

    let filter = DataFilter::UploadedBetween(
        time::parse_day_start(&start)?,
        time::parse_day_start(&end)?,
    );

    let window = window(&state, query.page, query.page_size);
    list_page(&state, filter, window).await
}

/// PUT /api/v1/federated-data/:id
pub async fn update_data(
    State(state): State<AppState>,
    Path(data_id): Path<i64>,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<Json<ApiEnvelope<FederatedData>>> {
    if body.as_object().map_or(true, |o| o.is_empty()) {
        return Err(ApiError::BadRequest("Invalid request parameters".to_string()));
    }
    let req: UpdateRequest = serde_json::from_value(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid request parameters: {}", e)))?;

    let update = FederatedDataUpdate {
        case_description: req.case_description,
        image_url: req.image_url,
        data_type: req
            .data_type
            .map(|t| normalize_data_type(Some(&t)).to_string()),
    };
    if update.is_empty() {
        return Err(ApiError::BadRequest("Invalid request parameters".to_string()));
    }

    let row = federated_data::update(&state.db, data_id, &update)
        .await?
        .ok_or_else(|| ApiError::NotFound("Data not found".to_string()))?;

    info!(data_id, "Federated data updated");
    Ok(Json(ApiEnvelope::with_message("Data updated successfully", row)))
}

/// DELETE /api/v1/federated-data/:id
pub async fn delete_data(
    State(state): State<AppState>,
    Path(data_id): Path<i64>,
) -> ApiResult<Json<ApiEnvelope<()>>> {
    if !federated_data::soft_delete(&state.db, data_id).await? {
        return Err(ApiError::NotFound("Data not found".to_string()));
    }

    info!(data_id, "Federated data deleted");
    Ok(Json(ApiEnvelope {
        code: 200,
        message: "Data deleted successfully".to_string(),
        data: None,
    }))
}

/// POST /api/v1/upload/image
pub async fn upload_image(
    State(state): State<AppState>,
    mut form: MultipartForm,
) -> ApiResult<Json<ApiEnvelope<ImageUploadResponse>>> {
    let file = form.take_file("file");
    let data_type = form
        .trimmed("dataType")
        .unwrap_or_else(|| DEFAULT_UPLOAD_DATA_TYPE.to_string());
    let data_type = normalize_data_type(Some(&data_type));

    let (image_url, _) = store_image(&state, file, data_type).await?;
    Ok(Json(ApiEnvelope::with_message(
        "File uploaded successfully",
        ImageUploadResponse { image_url },
    )))
}

pub fn federated_data_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/federated-data", get(list_data).post(create_data))
        .route("/api/v1/federated-data/search", get(search_data))
        .route("/api/v1/federated-data/by-time", get(data_by_time))
        .route(
            "/api/v1/federated-data/:id",
            put(update_data).delete(delete_data),
        )
        .route("/api/v1/upload/image", post(upload_image))
}
