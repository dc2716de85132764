use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use courtly_core::EngineError;
use serde_json::json;

/// Transport wrapper for engine failures. The engine owns the message and
/// machine-readable code; this layer only picks the HTTP status, so the
/// two never disagree.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub EngineError);

fn status_for(err: &EngineError) -> StatusCode {
    match err {
        EngineError::Validation(_) | EngineError::InvalidTime | EngineError::NoPaymentDue => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        EngineError::SlotConflict(_) | EngineError::InvalidState(_) | EngineError::EmailExists => {
            StatusCode::CONFLICT
        }
        EngineError::HoldExpired | EngineError::OtpExpired => StatusCode::GONE,
        EngineError::OtpNotFound | EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::OtpMaxAttempts | EngineError::OtpRateLimit => StatusCode::TOO_MANY_REQUESTS,
        EngineError::OtpInvalid
        | EngineError::Unauthorized
        | EngineError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        EngineError::CancellationWindowClosed
        | EngineError::Forbidden
        | EngineError::DemoDisabled => StatusCode::FORBIDDEN,
        EngineError::PaymentRequired | EngineError::InsufficientWallet => {
            StatusCode::PAYMENT_REQUIRED
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let body = Json(json!({
            "error": {
                "code": self.0.kind(),
                "message": self.0.to_string(),
            }
        }));
        (status, body).into_response()
    }
}
