//! Diagnosis orchestrator
//!
//! One submission runs these steps in order, each awaiting the previous:
//! validate, call inference, render the PDF, persist it, insert the record.
//! A failure before the insert leaves no record behind. Persistence
//! degradation is not a failure; the record carries the outcome tag.
//!
//! Downloads re-render the PDF from the stored fields every time.

pub mod prompt;
pub mod store;
pub mod types;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use fedreg_common::config::PaginationConfig;
use fedreg_common::{ids, time};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::pagination::{calculate_pagination, paginate, total_pages};
use crate::services::inference::{Completion, InferenceClient, InferenceRequest};
use crate::services::media::{allowed_extension, image_mime_type};
use crate::services::report::{ReportInput, ReportRenderer};
use crate::services::storage::TieredStorage;

pub use store::{DiagnosisStore, InMemoryDiagnosisStore, SqliteDiagnosisStore, StoreError};
pub use types::{
    DiagnosisHistory, DiagnosisRecord, DiagnosisSubmission, DiagnosisSummary, HistoryPagination,
    HistoryQuery, PatientInfo, SubmissionReceipt,
};

/// Image types accepted for diagnosis
pub const ALLOWED_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Report text used when the model's response has no content
pub const MALFORMED_OUTPUT_PLACEHOLDER: &str =
    "The model returned an unexpected response format; no diagnosis report could be generated.";

#[derive(Debug, Error)]
pub enum DiagnosisError {
    /// Request rejected before any work was done
    #[error("{0}")]
    Validation(String),

    #[error("Diagnosis record not found: {0}")]
    NotFound(String),

    /// Inference call failed
    #[error("Inference service unavailable: {0}")]
    Upstream(String),

    /// Full layout and fallback document both failed
    #[error("Report rendering failed: {0}")]
    Render(String),

    #[error("Diagnosis store error: {0}")]
    Store(#[from] StoreError),
}

/// Sequences inference, rendering and persistence for diagnosis requests
pub struct DiagnosisService {
    inference: Arc<dyn InferenceClient>,
    renderer: ReportRenderer,
    storage: TieredStorage,
    store: Arc<dyn DiagnosisStore>,
    default_model: String,
    pagination: PaginationConfig,
}

impl DiagnosisService {
    pub fn new(
        inference: Arc<dyn InferenceClient>,
        renderer: ReportRenderer,
        storage: TieredStorage,
        store: Arc<dyn DiagnosisStore>,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            inference,
            renderer,
            storage,
            store,
            default_model: default_model.into(),
            pagination: PaginationConfig::default(),
        }
    }

    pub fn with_pagination(mut self, pagination: PaginationConfig) -> Self {
        self.pagination = pagination;
        self
    }

    /// Run the full pipeline for one image
    pub async fn submit(
        &self,
        submission: DiagnosisSubmission,
    ) -> Result<SubmissionReceipt, DiagnosisError> {
        let extension = allowed_extension(&submission.image_filename, ALLOWED_IMAGE_EXTENSIONS)
            .ok_or_else(|| {
                DiagnosisError::Validation(format!(
                    "Unsupported image type; allowed: {}",
                    ALLOWED_IMAGE_EXTENSIONS.join(", ")
                ))
            })?;
        if submission.image_bytes.is_empty() {
            return Err(DiagnosisError::Validation("Image file is empty".to_string()));
        }
        let clinical_info = submission.clinical_info.trim().to_string();
        if clinical_info.is_empty() {
            return Err(DiagnosisError::Validation(
                "Clinical information must not be empty".to_string(),
            ));
        }

        let diagnosis_id = ids::diagnosis_id();
        let model = submission
            .model_name
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.default_model.clone());

        info!(
            diagnosis_id = %diagnosis_id,
            model = %model,
            image_bytes = submission.image_bytes.len(),
            "Starting diagnosis"
        );

        let request = InferenceRequest {
            image_base64: STANDARD.encode(&submission.image_bytes),
            mime_type: image_mime_type(&extension).to_string(),
            prompt: prompt::build_prompt(&clinical_info),
            model: model.clone(),
        };

        let diagnosis_report = match self.inference.infer(&request).await {
            Ok(Completion::Content(text)) => text,
            Ok(Completion::Malformed) => {
                warn!(diagnosis_id = %diagnosis_id, "Inference response had no content");
                MALFORMED_OUTPUT_PLACEHOLDER.to_string()
            }
            Err(e) => {
                error!(diagnosis_id = %diagnosis_id, error = %e, "Inference call failed");
                return Err(DiagnosisError::Upstream(e.to_string()));
            }
        };

        let timestamp = time::now();
        let pdf = self
            .render(ReportInput {
                clinical_info: clinical_info.clone(),
                diagnosis_report: diagnosis_report.clone(),
                patient_info: submission.patient_info.clone(),
                report_date: timestamp.date(),
            })
            .await?;

        let outcome = self
            .storage
            .persist(
                &format!("diagnosis/{}.pdf", diagnosis_id),
                &format!("diagnosis_report_{}.pdf", diagnosis_id),
                pdf,
                "application/pdf",
            )
            .await;

        let record = DiagnosisRecord {
            diagnosis_id: diagnosis_id.clone(),
            patient_info: submission.patient_info,
            clinical_info,
            diagnosis_report,
            model_name: model,
            pdf_url: outcome.url().map(str::to_string),
            pdf_storage: outcome.kind(),
            timestamp,
            status: types::STATUS_COMPLETED.to_string(),
        };
        self.store.insert(record.clone()).await?;

        info!(
            diagnosis_id = %diagnosis_id,
            pdf_storage = outcome.kind().as_str(),
            "Diagnosis completed"
        );

        Ok(SubmissionReceipt {
            diagnosis_id: record.diagnosis_id,
            diagnosis_report: record.diagnosis_report,
            timestamp: record.timestamp,
            pdf_url: record.pdf_url,
            pdf_storage: record.pdf_storage,
        })
    }

    /// Re-render the PDF of a stored record, dated the day of the call
    pub async fn pdf(&self, diagnosis_id: &str) -> Result<Vec<u8>, DiagnosisError> {
        let record = self.find(diagnosis_id).await?;
        self.render(rerender_input(record)).await
    }

    /// Newest-first page of summaries, optionally filtered by exact patient name
    pub async fn history(&self, query: HistoryQuery) -> Result<DiagnosisHistory, DiagnosisError> {
        let window = calculate_pagination(
            query.page,
            query.per_page,
            self.pagination.default_page_size,
            self.pagination.max_page_size,
        );
        let name_filter = query
            .patient_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());

        let mut records: Vec<DiagnosisRecord> = self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|r| match name_filter {
                Some(name) => r.patient_info.name.as_deref() == Some(name),
                None => true,
            })
            .collect();
        records.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| a.diagnosis_id.cmp(&b.diagnosis_id))
        });

        let total = records.len() as i64;
        let diagnosis_list = paginate(records, window)
            .iter()
            .map(DiagnosisSummary::from)
            .collect();

        Ok(DiagnosisHistory {
            diagnosis_list,
            pagination: HistoryPagination {
                page: window.page,
                per_page: window.page_size,
                total,
                pages: total_pages(total, window.page_size),
            },
        })
    }

    /// Full record; a missing PDF URL points at the download endpoint
    pub async fn detail(&self, diagnosis_id: &str) -> Result<DiagnosisRecord, DiagnosisError> {
        let mut record = self.find(diagnosis_id).await?;
        if record.pdf_url.is_none() {
            record.pdf_url = Some(format!("/api/diagnosis/download/{}", record.diagnosis_id));
        }
        Ok(record)
    }

    async fn find(&self, diagnosis_id: &str) -> Result<DiagnosisRecord, DiagnosisError> {
        self.store
            .get_by_id(diagnosis_id)
            .await?
            .ok_or_else(|| DiagnosisError::NotFound(diagnosis_id.to_string()))
    }

    async fn render(&self, input: ReportInput) -> Result<Vec<u8>, DiagnosisError> {
        let renderer = self.renderer.clone();
        tokio::task::spawn_blocking(move || renderer.render(&input))
            .await
            .map_err(|e| DiagnosisError::Render(format!("render task failed: {}", e)))?
            .map_err(|e| DiagnosisError::Render(e.to_string()))
    }
}

/// Report input for a download; the report date is today, not the submission date
fn rerender_input(record: DiagnosisRecord) -> ReportInput {
    ReportInput {
        clinical_info: record.clinical_info,
        diagnosis_report: record.diagnosis_report,
        patient_info: record.patient_info,
        report_date: time::now().date(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::StorageKind;
    use chrono::NaiveDate;

    #[test]
    fn test_rerender_is_dated_today() {
        let submitted = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        let record = DiagnosisRecord {
            diagnosis_id: "diag_0123456789ab".to_string(),
            patient_info: PatientInfo::default(),
            clinical_info: "cough".to_string(),
            diagnosis_report: "clear".to_string(),
            model_name: "vl".to_string(),
            pdf_url: None,
            pdf_storage: StorageKind::None,
            timestamp: submitted,
            status: types::STATUS_COMPLETED.to_string(),
        };

        let input = rerender_input(record);
        assert_eq!(input.report_date, time::now().date());
        assert_ne!(input.report_date, submitted.date());
        assert_eq!(input.clinical_info, "cough");
    }
}
