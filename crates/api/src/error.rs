//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{AccountError, DomainError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Domain logic error.
    Domain(DomainError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        if status.is_server_error() {
            tracing::error!(error = %message, %status, "request failed");
        }

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    let status = match &err {
        DomainError::Account(account_err) => match account_err {
            AccountError::AlreadyCreated => StatusCode::CONFLICT,
            AccountError::UnsupportedCommand { .. } | AccountError::IdentityMismatch { .. } => {
                StatusCode::BAD_REQUEST
            }
            AccountError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AccountError::Deleted(_) => StatusCode::GONE,
            AccountError::UnsupportedEvent { .. } | AccountError::Hashing(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        },
        DomainError::AggregateNotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ if err.is_conflict() => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<projections::ProjectionError> for ApiError {
    fn from(err: projections::ProjectionError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::AggregateId;
    use event_store::{EventStoreError, Version};
    use std::time::Duration;

    fn status_of(err: DomainError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_account_errors_map_to_client_statuses() {
        assert_eq!(
            status_of(AccountError::AlreadyCreated.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(AccountError::InvalidCredentials.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(AccountError::Deleted(AggregateId::new()).into()),
            StatusCode::GONE
        );
        assert_eq!(
            status_of(
                AccountError::UnsupportedCommand {
                    state: domain::LifecycleState::Disabled,
                    command: "LoginAccount",
                }
                .into()
            ),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_store_errors_map_to_statuses() {
        let conflict = EventStoreError::ConcurrencyConflict {
            aggregate_id: AggregateId::new(),
            expected: Version::new(1),
            actual: Version::new(2),
        };
        assert_eq!(status_of(conflict.into()), StatusCode::CONFLICT);
        assert_eq!(
            status_of(DomainError::Timeout(Duration::from_millis(5))),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(DomainError::AggregateNotFound {
                aggregate_type: "Account",
                aggregate_id: "x".into(),
            }),
            StatusCode::NOT_FOUND
        );
    }
}
