use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

use crate::auth::CredentialError;
use crate::repo::RepoError;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("invalid request")] BadRequest,
    #[error("invalid id format")] InvalidId,
    #[error("invalid email or password")] InvalidCredentials,
    #[error("forbidden")] Forbidden,
    #[error("not found")] NotFound,
    #[error("conflict")] Conflict,
    #[error("email already registered")] EmailTaken,
    #[error("duplicate report or unknown account")] ReportNotAdded,
    #[error("photo too large")] PhotoTooLarge,
    #[error("unsupported photo format")] UnsupportedPhoto,
    #[error("too many requests")] TooManyRequests,
    #[error("internal error")] Internal,
}

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => ApiError::NotFound,
            RepoError::Conflict => ApiError::Conflict,
            RepoError::BadId => ApiError::InvalidId,
            RepoError::Internal(msg) => {
                log::error!("repo error: {msg}");
                ApiError::Internal
            }
        }
    }
}

impl From<CredentialError> for ApiError {
    fn from(e: CredentialError) -> Self {
        log::error!("credential error: {e}");
        ApiError::Internal
    }
}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        use actix_web::http::StatusCode;
        let status = match self {
            ApiError::BadRequest | ApiError::InvalidId => StatusCode::BAD_REQUEST,
            ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict | ApiError::EmailTaken | ApiError::ReportNotAdded => {
                StatusCode::CONFLICT
            }
            ApiError::PhotoTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UnsupportedPhoto => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        HttpResponse::build(status).json(ApiErrorBody { error: self.to_string() })
    }
}
