//! Model registry endpoints under `/api/models`
//!
//! Reads need any account; mutations need an admin.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use fedreg_common::api::{ApiEnvelope, PageInfo, PagedList};
use fedreg_common::db::{ModelRecord, AGGREGATION_STRATEGIES, MODEL_STATUSES, OPTIMIZERS};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::extract::{AdminUser, ApiJson, ApiQuery, AuthUser};
use crate::db::models::{self, ModelFields, ModelQuery, ModelWriteError, SortField};
use crate::error::{ApiError, ApiResult};
use crate::pagination::calculate_pagination;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<i64>,
    pub model_name: Option<String>,
    pub model_status: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ModelResponse {
    pub model: ModelRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ModelOptions {
    pub model_status: &'static [&'static str],
    pub aggregation_strategy: &'static [&'static str],
    pub optimizer: &'static [&'static str],
}

impl From<ModelWriteError> for ApiError {
    fn from(err: ModelWriteError) -> Self {
        match err {
            ModelWriteError::Duplicate { .. } => ApiError::BadRequest(err.to_string()),
            ModelWriteError::Db(e) => ApiError::Common(e),
        }
    }
}

/// Parse a non-empty JSON object into model fields
fn parse_fields(body: Value) -> ApiResult<ModelFields> {
    if body.as_object().map_or(true, |o| o.is_empty()) {
        return Err(ApiError::BadRequest("Invalid request parameters".to_string()));
    }
    let fields: ModelFields = serde_json::from_value(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid request parameters: {}", e)))?;

    if let Some(status) = &fields.model_status {
        if !MODEL_STATUSES.contains(&status.as_str()) {
            return Err(ApiError::BadRequest(format!(
                "Invalid model_status; allowed: {}",
                MODEL_STATUSES.join(", ")
            )));
        }
    }
    Ok(fields)
}

fn not_found() -> ApiError {
    ApiError::NotFound("Model not found".to_string())
}

/// POST /api/models
pub async fn create_model(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<Json<ApiEnvelope<ModelResponse>>> {
    let fields = parse_fields(body)?;
    for (name, value) in [("model_name", &fields.model_name), ("algorithm", &fields.algorithm)] {
        if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
            return Err(ApiError::BadRequest(format!("Missing required field: {}", name)));
        }
    }

    let model = models::create(&state.db, &fields).await?;

    info!(
        model_id = model.model_id,
        model_name = %model.model_name,
        version = %model.model_version,
        by = %admin.username,
        "Model registered"
    );
    Ok(Json(ApiEnvelope::success(ModelResponse {
        model,
        message: Some("Model created successfully".to_string()),
    })))
}

/// GET /api/models
pub async fn list_models(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Json<ApiEnvelope<PagedList<ModelRecord>>>> {
    let window = calculate_pagination(
        query.page,
        query.page_size,
        state.config.pagination.default_page_size,
        state.config.pagination.max_page_size,
    );
    let filter = ModelQuery {
        name: query
            .model_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty()),
        status: query.model_status.filter(|s| !s.is_empty()),
        sort_by: SortField::parse(query.sort_by.as_deref()),
        ascending: query
            .sort_order
            .is_some_and(|o| o.eq_ignore_ascii_case("asc")),
    };

    let (list, total) = models::list(&state.db, &filter, window).await?;
    Ok(Json(ApiEnvelope::success(PagedList {
        list,
        pagination: PageInfo::new(window.page, window.page_size, total).with_navigation(),
    })))
}

/// GET /api/models/:id
pub async fn get_model(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(model_id): Path<i64>,
) -> ApiResult<Json<ApiEnvelope<ModelResponse>>> {
    let model = models::get(&state.db, model_id).await?.ok_or_else(not_found)?;
    Ok(Json(ApiEnvelope::success(ModelResponse { model, message: None })))
}

/// PUT /api/models/:id
pub async fn update_model(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(model_id): Path<i64>,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<Json<ApiEnvelope<ModelResponse>>> {
    let fields = parse_fields(body)?;
    let model = models::update(&state.db, model_id, &fields)
        .await?
        .ok_or_else(not_found)?;

    info!(model_id, by = %admin.username, "Model updated");
    Ok(Json(ApiEnvelope::success(ModelResponse {
        model,
        message: Some("Model updated successfully".to_string()),
    })))
}

/// DELETE /api/models/:id
pub async fn delete_model(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(model_id): Path<i64>,
) -> ApiResult<Json<ApiEnvelope<()>>> {
    if !models::soft_delete(&state.db, model_id).await? {
        return Err(not_found());
    }

    info!(model_id, by = %admin.username, "Model deleted");
    Ok(Json(ApiEnvelope {
        code: 200,
        message: "Model deleted successfully".to_string(),
        data: None,
    }))
}

/// GET /api/models/options
pub async fn model_options(_user: AuthUser) -> Json<ApiEnvelope<ModelOptions>> {
    Json(ApiEnvelope::success(ModelOptions {
        model_status: MODEL_STATUSES,
        aggregation_strategy: AGGREGATION_STRATEGIES,
        optimizer: OPTIMIZERS,
    }))
}

pub fn model_routes() -> Router<AppState> {
    Router::new()
        .route("/api/models", get(list_models).post(create_model))
        .route("/api/models/options", get(model_options))
        .route(
            "/api/models/:id",
            get(get_model).put(update_model).delete(delete_model),
        )
}
