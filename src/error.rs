//! Error types for the caching engine
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for the caching engine.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key absent from both the cache and the persistent store
    #[error("Not found: {0}")]
    NotFound(String),

    /// Mutation attempted while the store is write-protected
    #[error("Write rejected: {0}")]
    WriteRejected(String),

    /// Invalid request data or an illegal mode transition
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The persistent store refused an insert
    #[error("Store insert failed: {0}")]
    StoreInsert(String),

    /// A spool partition ended in the middle of a record
    #[error("Corrupt spool partition: {0}")]
    CorruptSpool(String),

    /// A store file could not be decoded
    #[error("Corrupt store: {0}")]
    CorruptStore(String),

    /// Underlying file-system failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::WriteRejected(_) => StatusCode::CONFLICT,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::StoreInsert(_)
            | CacheError::CorruptSpool(_)
            | CacheError::CorruptStore(_)
            | CacheError::Io(_)
            | CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the caching engine.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let resp = CacheError::NotFound("(5,10)".into()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = CacheError::WriteRejected("(5,10)".into()).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = CacheError::InvalidRequest("empty value".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err: CacheError = io.into();
        assert!(matches!(err, CacheError::Io(_)));
        assert!(err.to_string().contains("disk gone"));
    }
}
