use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::pagination::Pagination;

/// JSON envelope shared by every API endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            pagination: None,
        }
    }

    pub fn success_with_pagination(data: T, pagination: Pagination) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            pagination: Some(pagination),
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.to_string()),
            pagination: None,
        }
    }
}
