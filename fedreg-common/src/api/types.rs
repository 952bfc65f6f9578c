//! Shared API response types

use serde::{Deserialize, Serialize};

/// Message carried by every successful response
pub const SUCCESS_MESSAGE: &str = "success";

// ========================================
// Response Envelope
// ========================================

/// Envelope wrapping every JSON response
///
/// `code` mirrors the HTTP status; `data` is null on errors.
///
/// # Examples
///
/// ```
/// use fedreg_common::api::types::ApiEnvelope;
///
/// let ok = ApiEnvelope::success(vec![1, 2, 3]);
/// assert_eq!(ok.code, 200);
/// assert_eq!(ok.message, "success");
///
/// let err = ApiEnvelope::<()>::error(404, "Diagnosis record not found");
/// assert!(err.data.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub code: u16,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    pub fn success(data: T) -> Self {
        Self::with_message(SUCCESS_MESSAGE, data)
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            code: 200,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

// ========================================
// Pagination
// ========================================

/// Pagination block of registry list endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub current_page: i64,
    pub page_size: i64,
    pub total_count: i64,
    pub total_pages: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_prev: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_next: Option<bool>,
}

impl PageInfo {
    pub fn new(current_page: i64, page_size: i64, total_count: i64) -> Self {
        let total_pages = if page_size > 0 {
            (total_count + page_size - 1) / page_size
        } else {
            0
        };
        Self {
            current_page,
            page_size,
            total_count,
            total_pages,
            has_prev: None,
            has_next: None,
        }
    }

    /// Add `hasPrev` / `hasNext` flags
    pub fn with_navigation(mut self) -> Self {
        self.has_prev = Some(self.current_page > 1);
        self.has_next = Some(self.current_page < self.total_pages);
        self
    }
}

/// `{list, pagination}` payload of registry list endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedList<T> {
    pub list: Vec<T>,
    pub pagination: PageInfo,
}
