use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use readagain_core::LedgerError;
use serde_json::json;
use tracing::error;

/// Error body returned to API clients as `{"error": message}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Authentication required")
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound(message) => Self::new(StatusCode::NOT_FOUND, message),
            LedgerError::BadRequest(message) => Self::new(StatusCode::BAD_REQUEST, message),
            LedgerError::Storage(err) => {
                error!("ledger storage failure: {err:#}");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            format!("Invalid request: {}", rejection.body_text()),
        )
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            format!("Invalid query: {}", rejection.body_text()),
        )
    }
}

impl From<PathRejection> for ApiError {
    fn from(_: PathRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "Invalid ID")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_failures_hide_details() {
        let err = ApiError::from(LedgerError::Storage(anyhow::anyhow!(
            "relation \"payouts\" does not exist"
        )));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Internal server error");
    }

    #[test]
    fn ledger_client_errors_keep_their_message() {
        let err = ApiError::from(LedgerError::bad_request("Minimum payout amount is $10"));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Minimum payout amount is $10");

        let err = ApiError::from(LedgerError::not_found("Payout not found"));
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
