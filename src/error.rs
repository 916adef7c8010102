use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Everything that can go wrong between an HTTP request and the chain.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid contract address: {0}")]
    InvalidAddress(String),

    #[error("Unable to fetch ABI from explorer: {0}")]
    AbiUnavailable(String),

    #[error("Explorer returned a malformed ABI: {0}")]
    MalformedAbi(String),

    #[error("Contract not loaded. Please load the contract first.")]
    ContractNotLoaded,

    #[error("{0}")]
    FunctionNotFound(String),

    #[error("Invalid ABI entry for function '{function}': {reason}")]
    InvalidAbiEntry { function: String, reason: String },

    #[error("{0}")]
    ArgumentMismatch(String),

    #[error("Function '{0}' changes contract state. State-changing functions must be signed and sent client-side with your own wallet.")]
    StateChangingCall(String),

    #[error("Private keys are not accepted by this server. Sign transactions client-side with your own wallet.")]
    PrivateKeyRejected,

    #[error("{0}")]
    ExecutionError(String),

    #[error("Upstream request failed: {0}")]
    UpstreamError(String),
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::MalformedAbi(_)
            | RelayError::ExecutionError(_)
            | RelayError::UpstreamError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<JsonRejection> for RelayError {
    fn from(rejection: JsonRejection) -> Self {
        RelayError::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected: {}", self);
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(RelayError::ContractNotLoaded.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            RelayError::InvalidRequest("missing field".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RelayError::MalformedAbi("not json".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            RelayError::AbiUnavailable("NOTOK".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RelayError::StateChangingCall("transfer".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RelayError::ExecutionError("execution reverted".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            RelayError::UpstreamError("timeout".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_state_changing_message_points_client_side() {
        let message = RelayError::StateChangingCall("transfer".into()).to_string();
        assert!(message.contains("transfer"));
        assert!(message.contains("client-side"));
    }
}
