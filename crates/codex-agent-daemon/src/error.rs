//! The `{error: message}` JSON error body and status-code mapping from
//! §7: 400 for bad input, 401/403 for auth, 404 for unknown
//! route/entity, 500 for anything unexpected.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use codex_agent_auth::AuthError;
use codex_agent_dispatch::DispatchError;
use codex_agent_repo::RepoError;
use codex_agent_supervisor::SupervisorError;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized,
    Forbidden(String),
    NotFound,
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "missing or invalid bearer token".to_string()),
            ApiError::Forbidden(permission) => (
                StatusCode::FORBIDDEN,
                format!("token lacks required permission: {permission}"),
            ),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "not found".to_string()),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Malformed | AuthError::NotFound | AuthError::Revoked | AuthError::Expired => {
                ApiError::Unauthorized
            }
            AuthError::Forbidden(permission) => ApiError::Forbidden(permission),
            AuthError::Repo(err) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Validation(message) => ApiError::BadRequest(message),
            RepoError::NotFound => ApiError::NotFound,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::GroupPaused(id) => ApiError::BadRequest(format!("group {id} is paused")),
        }
    }
}

impl From<SupervisorError> for ApiError {
    fn from(err: SupervisorError) -> Self {
        match err {
            SupervisorError::NotFound(_) => ApiError::NotFound,
            other => ApiError::Internal(other.to_string()),
        }
    }
}
