use rocket::http::Status;
use rocket::serde::json::Json;
use thiserror::Error;

/// Typed failures raised by the group actor and mapped to HTTP by the router.
#[derive(Debug, Clone, Error)]
pub enum GroupError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Auth(String),
    #[error("{0}")]
    Access(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Internal(String),
}

/// The error shape every route returns: a status plus `{"error": message}`.
pub type ApiError = (Status, Json<serde_json::Value>);

impl GroupError {
    pub fn validation(msg: impl Into<String>) -> Self {
        GroupError::Validation(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        GroupError::Auth(msg.into())
    }

    pub fn access(msg: impl Into<String>) -> Self {
        GroupError::Access(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        GroupError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        GroupError::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        GroupError::Internal(msg.into())
    }

    pub fn status(&self) -> Status {
        match self {
            GroupError::Validation(_) => Status::BadRequest,
            GroupError::Auth(_) => Status::Unauthorized,
            GroupError::Access(_) => Status::Forbidden,
            GroupError::NotFound(_) => Status::NotFound,
            GroupError::Conflict(_) => Status::Conflict,
            GroupError::Internal(_) => Status::InternalServerError,
        }
    }

    pub fn into_response(self) -> ApiError {
        (
            self.status(),
            Json(serde_json::json!({"error": self.to_string()})),
        )
    }
}
