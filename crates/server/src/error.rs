use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::DbErr;
use services::services::extractor::ExtractorError;
use services::services::task::TaskServiceError;
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error, ts_rs::TS)]
#[ts(type = "string")]
pub enum ApiError {
    #[error(transparent)]
    TaskService(#[from] TaskServiceError),
    #[error(transparent)]
    Extractor(#[from] ExtractorError),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_type) = match &self {
            ApiError::TaskService(err) => match err {
                TaskServiceError::ValidationError(_) => {
                    (StatusCode::BAD_REQUEST, "ValidationError")
                }
                TaskServiceError::DuplicateTask => (StatusCode::BAD_REQUEST, "DuplicateTask"),
                TaskServiceError::InvalidPagination(_) => {
                    (StatusCode::BAD_REQUEST, "InvalidPagination")
                }
                TaskServiceError::DueDate(_) => (StatusCode::BAD_REQUEST, "DueDateError"),
                TaskServiceError::Database(DbErr::RecordNotFound(_)) => {
                    (StatusCode::NOT_FOUND, "TaskServiceError")
                }
                TaskServiceError::Database(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "TaskServiceError")
                }
            },
            ApiError::Extractor(err) => match err {
                ExtractorError::InvalidTranscript(_) => {
                    (StatusCode::BAD_REQUEST, "InvalidTranscript")
                }
                ExtractorError::ServiceUnreachable(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "ServiceUnreachable")
                }
            },
            ApiError::Database(db_err) => match db_err {
                DbErr::RecordNotFound(_) => (StatusCode::NOT_FOUND, "DatabaseError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "DatabaseError"),
            },
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
        };

        let error_message = match &self {
            ApiError::NotFound(msg) | ApiError::Internal(msg) | ApiError::BadRequest(msg) => {
                msg.clone()
            }
            _ => self.to_string(),
        };

        if status_code.is_server_error() {
            tracing::error!(
                status = %status_code,
                error_type,
                error = %self,
                "API request failed"
            );
        }
        let response = ApiResponse::<()>::error(&error_message);
        (status_code, Json(response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use services::services::due_date::DueDateError;

    use super::*;

    #[test]
    fn api_error_maps_to_expected_http_statuses() {
        assert_eq!(
            ApiError::BadRequest("bad".to_string())
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::NotFound("missing".to_string())
                .into_response()
                .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Internal("boom".to_string())
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn domain_errors_map_to_expected_http_statuses() {
        assert_eq!(
            ApiError::from(TaskServiceError::ValidationError("title is required".to_string()))
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(TaskServiceError::DuplicateTask)
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(TaskServiceError::InvalidPagination(
                "page must be at least 1".to_string()
            ))
            .into_response()
            .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(TaskServiceError::DueDate(DueDateError::InPast(
                "01-01-2000".to_string()
            )))
            .into_response()
            .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(DbErr::RecordNotFound("Task not found".to_string()))
                .into_response()
                .status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn extractor_errors_split_between_400_and_503() {
        assert_eq!(
            ApiError::from(ExtractorError::InvalidTranscript(
                "transcript must not be empty".to_string()
            ))
            .into_response()
            .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(ExtractorError::ServiceUnreachable(
                "connection refused".to_string()
            ))
            .into_response()
            .status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
