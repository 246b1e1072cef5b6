use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The block index could not be fetched or decoded to zero entries.
    #[error("index unavailable: {0}")]
    IndexUnavailable(String),

    /// Neither a uniform offset correction nor a rescan found valid members.
    #[error("index irreconcilable: {0}")]
    IndexIrreconcilable(String),

    #[error("block {block} unrecoverable: {reason}")]
    BlockUnrecoverable { block: usize, reason: String },

    #[error("page {page} yielded no data")]
    EmptyPage { page: u64 },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub r#type: &'static str,
    pub message: String,
}

impl Error {
    /// True for errors that leave a pager unusable until it is disposed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::IndexUnavailable(_) | Error::IndexIrreconcilable(_))
    }

    fn error_type(&self) -> &'static str {
        match self {
            Error::IndexUnavailable(_) => "IndexUnavailable",
            Error::IndexIrreconcilable(_) => "IndexIrreconcilable",
            Error::BlockUnrecoverable { .. } => "BlockUnrecoverable",
            Error::EmptyPage { .. } => "EmptyPage",
            Error::NotFound(_) => "NotFound",
            Error::InvalidInput(_) => "InvalidInput",
            Error::InvalidRange(_) => "InvalidRange",
            Error::Io(_) | Error::Internal(_) => "InternalError",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::IndexUnavailable(_) | Error::IndexIrreconcilable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Error::EmptyPage { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidInput(_) | Error::InvalidRange(_) => StatusCode::BAD_REQUEST,
            Error::BlockUnrecoverable { .. } | Error::Io(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorBody {
                r#type: self.error_type(),
                message: self.to_string(),
            },
        };
        (self.status_code(), axum::Json(body)).into_response()
    }
}
