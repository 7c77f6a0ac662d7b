//! Errors surfaced to sync clients.
//!
//! Every variant renders as a plain-text body carrying its message. Only
//! `Unexpected` hides its detail: the cause is logged and the client sees
//! `unknown error`.

use axum::{
    extract::rejection::BytesRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("missing {0} input")]
    MissingInput(&'static str),

    #[error("bookmarks creation disabled")]
    CreationDisabled,

    #[error("sync conflict detected")]
    Conflict,

    #[error("sync data limit exceeded")]
    PayloadTooLarge,

    #[error("bookmarks not found")]
    NotFound,

    #[error("not found")]
    RouteNotFound,

    #[error("unknown error")]
    Unexpected(#[from] anyhow::Error),
}

impl SyncError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SyncError::NotFound | SyncError::RouteNotFound => StatusCode::NOT_FOUND,
            SyncError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            SyncError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(error: serde_json::Error) -> Self {
        SyncError::Unexpected(anyhow::Error::new(error).context("invalid JSON"))
    }
}

impl From<BytesRejection> for SyncError {
    fn from(rejection: BytesRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return SyncError::PayloadTooLarge;
        }
        SyncError::Unexpected(anyhow::anyhow!("failed to read request body: {}", rejection.body_text()))
    }
}

impl IntoResponse for SyncError {
    fn into_response(self) -> Response {
        if let SyncError::Unexpected(e) = &self {
            tracing::error!(error = %crate::unpack_error(&**e), "request failed unexpectedly");
        }
        (self.status_code(), self.to_string()).into_response()
    }
}
