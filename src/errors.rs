use std::fmt;

use actix_multipart::MultipartError;
use actix_web::{
    error::{PayloadError, ResponseError},
    http::{header::{self, ContentType}, StatusCode},
    HttpResponse
};
use derive_more::Display;
use serde::Serialize;
use validator::ValidationErrors;

use crate::constants::{
    MSG_ALL_FIELDS_REQUIRED, MSG_CONTENT_NOT_PERMITTED, MSG_DELIVERY_FAILED, MSG_TOO_MANY_REQUESTS
};

/// Every way a submission can end in an error response.
///
/// The `Display` output is meant for server logs and may carry internal
/// detail; the HTTP body only ever contains the fixed public messages.
#[derive(Debug)]
pub enum AppError {
    ValidationError(Vec<FieldError>),
    MissingFields,
    ContentNotPermitted,
    RateLimited { retry_after_secs: u64 },
    DeliveryFailed(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::ValidationError(errors) => {
                let fields = errors.iter()
                    .map(|e| e.field.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "validation error on: {}", fields)
            }
            AppError::MissingFields => write!(f, "Missing required fields"),
            AppError::ContentNotPermitted => write!(f, "Content not permitted"),
            AppError::RateLimited { retry_after_secs } => {
                write!(f, "Rate limited, retry after {}s", retry_after_secs)
            }
            AppError::DeliveryFailed(msg) => write!(f, "Delivery failed: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal server error: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let body = match self {
            AppError::ValidationError(errors) => {
                serde_json::json!({
                    "error": "Validation failed",
                    "details": errors
                })
            }
            AppError::MissingFields => serde_json::json!({"error": MSG_ALL_FIELDS_REQUIRED}),
            AppError::ContentNotPermitted => serde_json::json!({"error": MSG_CONTENT_NOT_PERMITTED}),
            AppError::RateLimited { .. } => serde_json::json!({"error": MSG_TOO_MANY_REQUESTS}),
            AppError::DeliveryFailed(_) | AppError::Internal(_) => {
                serde_json::json!({"error": MSG_DELIVERY_FAILED})
            }
        };

        let mut response = HttpResponse::build(self.status_code());
        response.insert_header(ContentType::json());
        if let AppError::RateLimited { retry_after_secs } = self {
            response.insert_header((header::RETRY_AFTER, retry_after_secs.to_string()));
        }
        response.json(body)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::MissingFields => StatusCode::BAD_REQUEST,
            AppError::ContentNotPermitted => StatusCode::BAD_REQUEST,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::DeliveryFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl AppError {
    pub fn to_http_response(&self) -> HttpResponse {
        self.error_response()
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut field_errors: Vec<FieldError> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(|e| FieldError {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "Invalid value".to_string()),
                })
            })
            .collect();
        field_errors.sort_by(|a, b| a.field.cmp(&b.field));

        AppError::ValidationError(field_errors)
    }
}

impl From<MailerError> for AppError {
    fn from(err: MailerError) -> Self {
        AppError::DeliveryFailed(err.to_string())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::Internal(format!("Multipart error: {}", err))
    }
}

impl From<PayloadError> for AppError {
    fn from(err: PayloadError) -> Self {
        AppError::Internal(format!("Payload error: {}", err))
    }
}

/// Failures reported by an email provider.
#[derive(Debug, Display, Clone, PartialEq)]
pub enum MailerError {
    #[display("Invalid mailbox address: {_0}")]
    Address(String),

    #[display("Failed to build message: {_0}")]
    Build(String),

    #[display("Transport error: {_0}")]
    Transport(String),

    #[display("Provider rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[display("Provider timed out after {_0}s")]
    Timeout(u64),
}

impl std::error::Error for MailerError {}

impl From<reqwest::Error> for MailerError {
    fn from(err: reqwest::Error) -> Self {
        MailerError::Transport(err.to_string())
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}
