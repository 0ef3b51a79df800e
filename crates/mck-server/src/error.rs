use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use mck_sdk::SdkError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    Sdk(#[from] SdkError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Sdk(SdkError::ValidationFailed(_) | SdkError::MalformedTransaction(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::Sdk(SdkError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<mck_types::TypeError> for ServerError {
    fn from(error: mck_types::TypeError) -> Self {
        Self::BadRequest(error.to_string())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
        }
        (status, axum::Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_never_server_faults() {
        let cases = [
            (SdkError::ValidationFailed("input missing".into()), 422),
            (SdkError::MalformedTransaction("eof".into()), 422),
            (SdkError::NotFound("tx".into()), 404),
            (SdkError::Internal("boom".into()), 500),
        ];
        for (error, status) in cases {
            assert_eq!(ServerError::from(error).status().as_u16(), status);
        }
        assert_eq!(ServerError::BadRequest("hex".into()).status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn type_errors_are_bad_requests() {
        let err = ServerError::from(mck_types::TypeError::InvalidOutpoint("x".into()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
