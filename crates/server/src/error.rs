use axum::{
    http::StatusCode,
    response::{IntoResponse, Json as ResponseJson, Response},
};
use services::services::{
    access::AccessError, applications::ApplicationError, attachments::AttachmentError,
    calendar::CalendarError, commission_rates::RateError, dashboard::DashboardError,
    profiles::ProfileError, session::SessionError, storage::StorageError,
};
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Application(#[from] ApplicationError),
    #[error(transparent)]
    Attachment(#[from] AttachmentError),
    #[error(transparent)]
    Rate(#[from] RateError),
    #[error(transparent)]
    Calendar(#[from] CalendarError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Dashboard(#[from] DashboardError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("authentication required")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Database(_) | ApiError::Access(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Application(err) => match err {
                ApplicationError::NotFound(_) => StatusCode::NOT_FOUND,
                ApplicationError::Validation(_) => StatusCode::BAD_REQUEST,
                ApplicationError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Attachment(err) => match err {
                AttachmentError::NotFound(_) | AttachmentError::NoFile(_) => StatusCode::NOT_FOUND,
                AttachmentError::Storage(StorageError::InvalidKey(_)) => StatusCode::BAD_REQUEST,
                AttachmentError::Application(ApplicationError::Validation(_)) => {
                    StatusCode::BAD_REQUEST
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Rate(err) => match err {
                RateError::CarrierNotFound(_) | RateError::RateNotFound(_) => StatusCode::NOT_FOUND,
                RateError::DuplicateCarrier(_) => StatusCode::CONFLICT,
                RateError::Validation(_) => StatusCode::BAD_REQUEST,
                RateError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Calendar(err) => match err {
                CalendarError::NotFound(_) => StatusCode::NOT_FOUND,
                CalendarError::Validation(_) => StatusCode::BAD_REQUEST,
                CalendarError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Profile(err) => match err {
                ProfileError::NotFound(_) => StatusCode::NOT_FOUND,
                ProfileError::Forbidden | ProfileError::AdminNotAllowed(_) => StatusCode::FORBIDDEN,
                ProfileError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Dashboard(_) | ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Session(_) | ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
            self.to_string()
        };

        (status, ResponseJson(ApiResponse::<()>::error(&message))).into_response()
    }
}
