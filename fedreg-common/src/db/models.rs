//! Database row models
//!
//! Timestamps are local wall-clock `NaiveDateTime` values and serialize as
//! `YYYY-MM-DD HH:MM:SS`.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::time::display_format;

/// Account roles
pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_DOCTOR: &str = "doctor";
pub const ROLE_RESEARCHER: &str = "researcher";
pub const ROLES: &[&str] = &[ROLE_ADMIN, ROLE_DOCTOR, ROLE_RESEARCHER];

/// Kinds of federated data
pub const DATA_TYPES: &[&str] = &[
    "chest_xray",
    "image",
    "text",
    "structured",
    "chest_ct",
    "mri",
    "other",
];
pub const DEFAULT_DATA_TYPE: &str = "chest_xray";

/// Review states of federated data
pub const DATA_STATUSES: &[&str] = &["pending", "approved", "rejected"];

/// Training states of a registered model
pub const MODEL_STATUSES: &[&str] = &["training", "completed", "failed", "stopped"];
pub const AGGREGATION_STRATEGIES: &[&str] = &["FedAvg", "FedMA", "FedProx", "FedNova", "SCAFFOLD"];
pub const OPTIMIZERS: &[&str] = &["SGD", "Adam", "AdamW", "RMSprop", "Adagrad"];
pub const DEFAULT_MODEL_VERSION: &str = "1.0.0";
pub const DEFAULT_MODEL_STATUS: &str = "training";

/// Normalize a requested data type, mapping unknown values to the default
pub fn normalize_data_type(value: Option<&str>) -> &'static str {
    let requested = value.map(str::trim).unwrap_or_default();
    DATA_TYPES
        .iter()
        .find(|t| t.eq_ignore_ascii_case(requested))
        .copied()
        .unwrap_or(DEFAULT_DATA_TYPE)
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub department: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    #[serde(skip_serializing, default)]
    pub password_salt: String,
    pub is_active: bool,
    #[serde(serialize_with = "display_format::option::serialize")]
    pub last_login: Option<NaiveDateTime>,
    #[serde(serialize_with = "display_format::serialize")]
    pub created_time: NaiveDateTime,
    #[serde(serialize_with = "display_format::serialize")]
    pub updated_time: NaiveDateTime,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LoginLog {
    pub log_id: i64,
    pub user_id: Option<i64>,
    pub username: String,
    pub login_ip: Option<String>,
    pub user_agent: Option<String>,
    pub status: String,
    pub failure_reason: Option<String>,
    #[serde(serialize_with = "display_format::serialize")]
    pub login_time: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FederatedData {
    pub data_id: i64,
    pub image_url: String,
    pub case_description: String,
    pub data_type: String,
    pub file_size: Option<i64>,
    #[serde(serialize_with = "display_format::serialize")]
    pub upload_time: NaiveDateTime,
    pub data_status: String,
    #[serde(skip_serializing, default)]
    pub is_deleted: bool,
    #[serde(serialize_with = "display_format::serialize")]
    pub updated_time: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ModelRecord {
    pub model_id: i64,
    pub model_name: String,
    pub model_version: String,
    pub learning_rate: Option<f64>,
    pub epochs: Option<i64>,
    pub aggregation_strategy: Option<String>,
    pub batch_size: Option<i64>,
    pub optimizer: Option<String>,
    pub algorithm: String,
    pub model_status: String,
    pub model_path: Option<String>,
    pub description: Option<String>,
    #[serde(serialize_with = "display_format::serialize")]
    pub created_time: NaiveDateTime,
    #[serde(serialize_with = "display_format::serialize")]
    pub updated_time: NaiveDateTime,
    #[serde(skip_serializing, default)]
    pub is_deleted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_data_type() {
        assert_eq!(normalize_data_type(Some("mri")), "mri");
        assert_eq!(normalize_data_type(Some("CHEST_CT")), "chest_ct");
        assert_eq!(normalize_data_type(Some("ultrasound")), "chest_xray");
        assert_eq!(normalize_data_type(None), "chest_xray");
    }
}
