//! Diagnosis endpoints under `/api/diagnosis`

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use fedreg_common::api::ApiEnvelope;

use super::extract::ApiQuery;
use super::form::MultipartForm;
use crate::error::{ApiError, ApiResult};
use crate::services::diagnosis::{
    DiagnosisHistory, DiagnosisRecord, DiagnosisSubmission, HistoryQuery, PatientInfo,
    SubmissionReceipt,
};
use crate::AppState;

/// POST /api/diagnosis/submit
///
/// Multipart fields: `image` (file), `clinical_info`, optional `model_name`
/// and the `patient_*` / `medical_record_id` text fields.
pub async fn submit(
    State(state): State<AppState>,
    mut form: MultipartForm,
) -> ApiResult<Json<ApiEnvelope<SubmissionReceipt>>> {
    let image = form
        .take_file("image")
        .ok_or_else(|| ApiError::BadRequest("No image file uploaded".to_string()))?;
    if image.filename.is_empty() {
        return Err(ApiError::BadRequest("No image file selected".to_string()));
    }
    let clinical_info = form
        .trimmed("clinical_info")
        .ok_or_else(|| ApiError::BadRequest("Clinical information must not be empty".to_string()))?;

    let text = |name: &str| form.text(name).map(str::to_string);
    let patient_info = PatientInfo::from_form(
        text("patient_name"),
        text("patient_gender"),
        text("patient_age"),
        text("medical_record_id"),
    );

    let receipt = state
        .diagnosis
        .submit(DiagnosisSubmission {
            image_bytes: image.bytes,
            image_filename: image.filename,
            clinical_info,
            patient_info,
            model_name: form.trimmed("model_name"),
        })
        .await?;

    Ok(Json(ApiEnvelope::with_message("Diagnosis completed", receipt)))
}

/// GET /api/diagnosis/download/:id
pub async fn download(
    State(state): State<AppState>,
    Path(diagnosis_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let pdf = state.diagnosis.pdf(&diagnosis_id).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"diagnosis_report_{}.pdf\"", diagnosis_id),
            ),
        ],
        pdf,
    ))
}

/// GET /api/diagnosis/history
pub async fn history(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> ApiResult<Json<ApiEnvelope<DiagnosisHistory>>> {
    let history = state.diagnosis.history(query).await?;
    Ok(Json(ApiEnvelope::success(history)))
}

/// GET /api/diagnosis/detail/:id
pub async fn detail(
    State(state): State<AppState>,
    Path(diagnosis_id): Path<String>,
) -> ApiResult<Json<ApiEnvelope<DiagnosisRecord>>> {
    let record = state.diagnosis.detail(&diagnosis_id).await?;
    Ok(Json(ApiEnvelope::success(record)))
}

pub fn diagnosis_routes() -> Router<AppState> {
    Router::new()
        .route("/api/diagnosis/submit", post(submit))
        .route("/api/diagnosis/download/:id", get(download))
        .route("/api/diagnosis/history", get(history))
        .route("/api/diagnosis/detail/:id", get(detail))
}
