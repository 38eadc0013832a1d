use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use mercato_auth::AuthzError;
use mercato_core::DomainError;
use mercato_infra::{StoreError, WorkflowError};

/// Error side of every handler.
#[derive(Debug)]
pub enum ApiError {
    Workflow(WorkflowError),
    Forbidden(AuthzError),
    BadRequest(String),
}

impl From<WorkflowError> for ApiError {
    fn from(e: WorkflowError) -> Self {
        ApiError::Workflow(e)
    }
}

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        ApiError::Workflow(WorkflowError::Domain(e))
    }
}

impl From<AuthzError> for ApiError {
    fn from(e: AuthzError) -> Self {
        ApiError::Forbidden(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

pub type ApiResult = Result<Response, ApiError>;

fn domain_status(e: &DomainError) -> StatusCode {
    match e {
        DomainError::Validation(_)
        | DomainError::InvalidId(_)
        | DomainError::InsufficientStock { .. } => StatusCode::BAD_REQUEST,
        DomainError::Unauthorized => StatusCode::FORBIDDEN,
        DomainError::NotFound(_) => StatusCode::NOT_FOUND,
        DomainError::Conflict(_) | DomainError::InvariantViolation(_) => StatusCode::CONFLICT,
    }
}

fn store_status(e: &StoreError) -> StatusCode {
    match e {
        StoreError::Conflict(_) => StatusCode::CONFLICT,
        StoreError::TenantIsolation(_) => StatusCode::FORBIDDEN,
        StoreError::Serialization(_) | StoreError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Workflow(WorkflowError::Domain(e)) => json_error(domain_status(&e), e.to_string()),
            ApiError::Workflow(WorkflowError::Store(e)) => {
                let status = store_status(&e);
                if status.is_server_error() {
                    tracing::error!(error = %e, "store failure");
                    json_error(status, "internal storage error")
                } else {
                    json_error(status, e.to_string())
                }
            }
            ApiError::Forbidden(e) => json_error(StatusCode::FORBIDDEN, e.to_string()),
            ApiError::BadRequest(msg) => json_error(StatusCode::BAD_REQUEST, msg),
        }
    }
}

pub fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "success": false,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let status = |e: ApiError| e.into_response().status();
        assert_eq!(status(DomainError::validation("x").into()), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(DomainError::insufficient_stock("p", "w", 2, 1).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status(DomainError::not_found("x").into()), StatusCode::NOT_FOUND);
        assert_eq!(status(DomainError::conflict("x").into()), StatusCode::CONFLICT);
        assert_eq!(status(DomainError::invariant("x").into()), StatusCode::CONFLICT);
        assert_eq!(
            status(WorkflowError::Store(StoreError::Conflict("stale".into())).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(WorkflowError::Store(StoreError::Backend("down".into())).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status(AuthzError::Forbidden("x".into()).into()),
            StatusCode::FORBIDDEN
        );
    }
}
