use crate::store::StoreError;
use actix_web::{
    http::{header::ContentType, StatusCode},
    HttpResponse, ResponseError,
};
use serde::Serialize;
use uuid::Uuid;

/// Per-fix ingestion failure. Never crosses into other fixes.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("no truck registered for {0}")]
    UnknownSource(String),
    #[error(transparent)]
    Persistence(#[from] StoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("truck {0} not found")]
    TruckNotFound(Uuid),
    #[error("truck {0} is already discharged")]
    AlreadyDischarged(Uuid),
    #[error(transparent)]
    Persistence(#[from] StoreError),
}

/// Errors surfaced by the HTTP transports.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Action(#[from] ActionError),
    #[error("telegram user {0} is not authorized")]
    Unauthorized(i64),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    error_message: String,
    error_code: &'static str,
}

impl AppError {
    fn code(&self) -> &'static str {
        match self {
            AppError::Ingest(IngestError::InvalidPayload(_)) => "INVALID_PAYLOAD",
            AppError::Ingest(IngestError::UnknownSource(_)) => "UNKNOWN_SOURCE",
            AppError::Ingest(IngestError::Persistence(_))
            | AppError::Action(ActionError::Persistence(_)) => "PERSISTENCE_FAILURE",
            AppError::Action(ActionError::TruckNotFound(_)) => "TRUCK_NOT_FOUND",
            AppError::Action(ActionError::AlreadyDischarged(_)) => "ALREADY_DISCHARGED",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::InvalidRequest(_) => "INVALID_REQUEST",
        }
    }

    fn message(&self) -> String {
        match self {
            // Storage details stay in the logs.
            AppError::Ingest(IngestError::Persistence(_))
            | AppError::Action(ActionError::Persistence(_)) => {
                "Storage temporarily unavailable, retry later".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .json(ErrorBody {
                error_message: self.message(),
                error_code: self.code(),
            })
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Ingest(IngestError::InvalidPayload(_)) => StatusCode::BAD_REQUEST,
            AppError::Ingest(IngestError::UnknownSource(_)) => StatusCode::NOT_FOUND,
            AppError::Ingest(IngestError::Persistence(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Action(ActionError::TruckNotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Action(ActionError::AlreadyDischarged(_)) => StatusCode::CONFLICT,
            AppError::Action(ActionError::Persistence(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Unauthorized(_) => StatusCode::FORBIDDEN,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}
