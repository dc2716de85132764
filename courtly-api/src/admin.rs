use axum::{
    extract::{Path, State},
    middleware,
    routing::{get, post},
    Json, Router,
};
use courtly_core::engine::BookingView;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::auth::{require_admin, require_user};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct OverrideCancelRequest {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
struct BookingsEnvelope {
    bookings: Vec<BookingView>,
}

#[derive(Debug, Serialize)]
struct OverrideCancelResponse {
    ok: bool,
    booking: BookingView,
}

pub fn routes(state: AppState) -> Router<AppState> {
    // require_user runs first and injects the caller; require_admin then
    // gates on the role.
    Router::new()
        .route("/api/admin/bookings", get(all_bookings))
        .route(
            "/api/admin/bookings/{id}/override-cancel",
            post(override_cancel),
        )
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn_with_state(state, require_user))
}

async fn all_bookings(State(state): State<AppState>) -> Json<BookingsEnvelope> {
    let bookings = state.engine.read().await.admin_bookings();
    Json(BookingsEnvelope { bookings })
}

/// Flips the per-booking flag that lets cancellation skip the 24 hour
/// window check.
async fn override_cancel(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    body: Option<Json<OverrideCancelRequest>>,
) -> Result<Json<OverrideCancelResponse>, ApiError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let booking = state
        .engine
        .write()
        .await
        .set_cancellation_override(booking_id, req.enabled)?;
    Ok(Json(OverrideCancelResponse { ok: true, booking }))
}
