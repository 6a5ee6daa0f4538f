use std::io::Error as IoError;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;
use tracing::error;
use vigil::{RegistryError, ValidationError};

use crate::config;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0:#}")]
    Io(#[from] IoError),
    #[error("Configuration error: {0}")]
    Config(#[from] config::Error),
    #[error(transparent)]
    Vigil(#[from] vigil::Error),
    #[error("Startup failed: {0:#}")]
    Startup(#[from] anyhow::Error),
    #[error("{0}")]
    BadRequest(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ValidationError> for AppError {
    fn from(error: ValidationError) -> Self {
        AppError::Vigil(error.into())
    }
}

impl From<RegistryError> for AppError {
    fn from(error: RegistryError) -> Self {
        AppError::Vigil(error.into())
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Vigil(vigil::Error::Validation(_)) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Vigil(vigil::Error::Registry(RegistryError::NotFound(_))) => StatusCode::NOT_FOUND,
            AppError::Vigil(vigil::Error::Registry(RegistryError::DuplicateId(_))) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        let body = match self {
            AppError::Vigil(vigil::Error::Validation(e)) => json!({
                "status": "error",
                "message": e.message,
                "error": e.to_string(),
                "field": e.field,
            }),
            _ if status.is_server_error() => {
                error!("request failed: {}", self);
                json!({"status": "error", "message": "Internal server error"})
            }
            _ => json!({"status": "error", "message": self.to_string()}),
        };

        HttpResponse::build(status).json(body)
    }
}
