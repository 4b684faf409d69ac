use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use log::error;
use thiserror::Error;

use crate::blockchain::crypto::CryptoError;
use crate::blockchain::{BlockchainError, ParameterError, TransactionError};

/// Errors returned by request handlers, rendered as `{"error": "<message>"}`
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.to_string()
        }))
    }
}

impl From<TransactionError> for ApiError {
    fn from(err: TransactionError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<ParameterError> for ApiError {
    fn from(err: ParameterError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<CryptoError> for ApiError {
    fn from(err: CryptoError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<BlockchainError> for ApiError {
    fn from(err: BlockchainError) -> Self {
        match err {
            BlockchainError::StorageError(_) => {
                error!("Ledger storage failure: {}", err);
                ApiError::Internal(err.to_string())
            }
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl ApiError {
    pub(crate) fn poisoned() -> Self {
        error!("Ledger lock poisoned");
        ApiError::Internal("Ledger lock poisoned".to_string())
    }
}
