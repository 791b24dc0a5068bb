use rocket::http::Status;
use rocket::response::Responder;
use rocket::serde::json::Json;
use shared::{ErrorResponse, ValidationError};
use thiserror::Error;
use crate::table::TableError;

/// Failures of the poll store operations.
///
/// `AlreadyVoted` is the one callers are expected to branch on; store
/// failures carry the step that failed and are otherwise opaque.
#[derive(Error, Debug)]
pub enum PollError {
    #[error("already voted")]
    AlreadyVoted,
    #[error("poll not found")]
    NotFound,
    #[error("unknown option: {0}")]
    UnknownOption(String),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("{context}: {source}")]
    StoreRead { context: &'static str, source: TableError },
    #[error("{context}: {source}")]
    StoreWrite { context: &'static str, source: TableError },
    #[error("unmarshaling item: {0}")]
    Decode(String),
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Poll not found")]
    NotFound,
    #[error("Invalid poll ID")]
    InvalidId,
    #[error("{0}")]
    InvalidRequest(String),
    #[error("You have already voted in this poll")]
    AlreadyVoted,
    #[error("Only the poll owner can do that")]
    Forbidden,
    #[error("{0}")]
    RateLimited(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> Status {
        match self {
            ApiError::NotFound => Status::NotFound,
            ApiError::InvalidId => Status::BadRequest,
            ApiError::InvalidRequest(_) => Status::BadRequest,
            ApiError::AlreadyVoted => Status::Forbidden,
            ApiError::Forbidden => Status::Forbidden,
            ApiError::RateLimited(_) => Status::TooManyRequests,
            ApiError::Internal(_) => Status::InternalServerError,
        }
    }
}

impl From<PollError> for ApiError {
    fn from(err: PollError) -> Self {
        match err {
            PollError::AlreadyVoted => ApiError::AlreadyVoted,
            PollError::NotFound => ApiError::NotFound,
            PollError::UnknownOption(option) => ApiError::InvalidRequest(format!("Unknown option: {}", option)),
            PollError::Invalid(e) => ApiError::InvalidRequest(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for ApiError {
    fn respond_to(self, req: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        let message = match &self {
            ApiError::Internal(detail) => {
                tracing::error!("Request failed: {}", detail);
                "An internal server error occurred.".to_string()
            }
            other => other.to_string(),
        };

        rocket::Response::build_from(Json(ErrorResponse::new(status.code, message)).respond_to(req)?)
            .status(status)
            .ok()
    }
}
