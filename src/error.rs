use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A channel view or a decode ran past the bytes it was given.
    #[error("out of bounds: {0}")]
    Bounds(String),

    /// A stored code is outside the codec alphabet.
    #[error("decode error: {0}")]
    Decode(String),

    /// A low-level iterator accessor was called twice, or out of order, for one element.
    #[error("cursor misuse: {0}")]
    CursorMisuse(String),

    #[error("iterator exhausted")]
    Exhausted,

    #[error("missing channel: {0}")]
    MissingChannel(&'static str),

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct SampleIndexError {
    #[serde(rename = "sampleIndex")]
    pub sample_index: SampleIndexErrorBody,
}

#[derive(Debug, Serialize)]
pub struct SampleIndexErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl Error {
    pub(crate) fn bounds(channel: &str, needed: usize, available: usize) -> Self {
        Error::Bounds(format!(
            "{} channel needs {} but only {} available",
            channel, needed, available
        ))
    }

    fn error_type(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "NotFound",
            Error::InvalidInput(_) => "InvalidInput",
            Error::InvalidRange(_) => "InvalidRange",
            Error::Bounds(_) | Error::Decode(_) => "CorruptIndex",
            Error::InvalidSchema(_) => "InvalidSchema",
            Error::CursorMisuse(_)
            | Error::Exhausted
            | Error::MissingChannel(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::Internal(_) => "InternalError",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::InvalidRange(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let body = SampleIndexError {
            sample_index: SampleIndexErrorBody {
                error: self.error_type(),
                message: self.to_string(),
            },
        };
        (self.status_code(), axum::Json(body)).into_response()
    }
}
