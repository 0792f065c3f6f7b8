use serde_json::json;
use thiserror::Error;

/// Failure raised by the submission service.
///
/// `NotFound` and `BadRequest` carry a message meant for the caller;
/// everything else (storage, serialization) is folded into `Internal`.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        ServiceError::NotFound(msg.into())
    }

    pub fn bad_request<S: Into<String>>(msg: S) -> Self {
        ServiceError::BadRequest(msg.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => "not_found",
            ServiceError::BadRequest(_) => "bad_request",
            ServiceError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            ServiceError::NotFound(_) => 404,
            ServiceError::BadRequest(_) => 400,
            ServiceError::Internal(_) => 500,
        }
    }

    /// Error envelope for the IPC layer.
    pub fn response(&self, id: &str) -> serde_json::Value {
        crate::ipc::err(
            Some(id),
            self.code(),
            self.to_string(),
            Some(json!({ "status": self.status() })),
        )
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(err: rusqlite::Error) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        ServiceError::Internal(format!("{err:#}"))
    }
}
