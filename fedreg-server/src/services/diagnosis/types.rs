//! Diagnosis records and the views derived from them

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::services::storage::StorageKind;

/// Status of every stored record
pub const STATUS_COMPLETED: &str = "completed";

/// History entries show at most this many characters of clinical text
pub const CLINICAL_INFO_PREVIEW_CHARS: usize = 100;

/// Optional patient identification printed on the report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientInfo {
    pub name: Option<String>,
    pub gender: Option<String>,
    pub age: Option<String>,
    pub medical_record_id: Option<String>,
}

impl PatientInfo {
    /// Build from raw form values; blank values become `None`
    pub fn from_form(
        name: Option<String>,
        gender: Option<String>,
        age: Option<String>,
        medical_record_id: Option<String>,
    ) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        Self {
            name: clean(name),
            gender: clean(gender),
            age: clean(age),
            medical_record_id: clean(medical_record_id),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.gender.is_none()
            && self.age.is_none()
            && self.medical_record_id.is_none()
    }
}

/// One completed diagnosis; written once, never mutated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisRecord {
    pub diagnosis_id: String,
    pub patient_info: PatientInfo,
    pub clinical_info: String,
    pub diagnosis_report: String,
    pub model_name: String,
    pub pdf_url: Option<String>,
    pub pdf_storage: StorageKind,
    pub timestamp: NaiveDateTime,
    pub status: String,
}

/// Input of a diagnosis request
#[derive(Debug, Clone)]
pub struct DiagnosisSubmission {
    pub image_bytes: Vec<u8>,
    pub image_filename: String,
    pub clinical_info: String,
    pub patient_info: PatientInfo,
    /// Overrides the configured model when present
    pub model_name: Option<String>,
}

/// Returned by a successful submission
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionReceipt {
    pub diagnosis_id: String,
    pub diagnosis_report: String,
    pub timestamp: NaiveDateTime,
    pub pdf_url: Option<String>,
    pub pdf_storage: StorageKind,
}

/// History list entry
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosisSummary {
    pub diagnosis_id: String,
    pub patient_name: Option<String>,
    pub clinical_info: String,
    pub timestamp: NaiveDateTime,
    pub status: String,
}

impl From<&DiagnosisRecord> for DiagnosisSummary {
    fn from(record: &DiagnosisRecord) -> Self {
        Self {
            diagnosis_id: record.diagnosis_id.clone(),
            patient_name: record.patient_info.name.clone(),
            clinical_info: preview(&record.clinical_info),
            timestamp: record.timestamp,
            status: record.status.clone(),
        }
    }
}

/// History query parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub patient_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryPagination {
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub pages: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosisHistory {
    pub diagnosis_list: Vec<DiagnosisSummary>,
    pub pagination: HistoryPagination,
}

/// Truncate clinical text to the preview length, appending `...` when cut
pub fn preview(text: &str) -> String {
    if text.chars().count() <= CLINICAL_INFO_PREVIEW_CHARS {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(CLINICAL_INFO_PREVIEW_CHARS).collect();
    cut.push_str("...");
    cut
}
