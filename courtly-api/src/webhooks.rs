use axum::{extract::State, routing::post, Json, Router};
use courtly_shared::models::events::DeliveryStatus;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct NotificationWebhook {
    pub notification_id: Uuid,
    pub status: Option<DeliveryStatus>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentWebhook {
    pub booking_id: Uuid,
    pub status: String,
    pub provider_ref: Option<String>,
}

#[derive(Debug, Serialize)]
struct Ack {
    ok: bool,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/notifications/webhook", post(notification_webhook))
        .route("/api/payments/webhook", post(payment_webhook))
}

/// Delivery receipt from the (mocked) messaging provider.
async fn notification_webhook(
    State(state): State<AppState>,
    Json(req): Json<NotificationWebhook>,
) -> Result<Json<Ack>, ApiError> {
    state
        .engine
        .write()
        .await
        .apply_notification_delivery(req.notification_id, req.status)?;
    Ok(Json(Ack { ok: true }))
}

/// Settlement callback from the (mocked) payment provider. Anything other
/// than "paid" is treated as a failure report.
async fn payment_webhook(
    State(state): State<AppState>,
    Json(req): Json<PaymentWebhook>,
) -> Result<Json<Ack>, ApiError> {
    state.engine.write().await.apply_payment_update(
        req.booking_id,
        req.status == "paid",
        req.provider_ref,
    )?;
    Ok(Json(Ack { ok: true }))
}
