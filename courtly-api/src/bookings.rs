use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use courtly_core::engine::{
    BookingView, CancelBookingRequest, CancelBookingResponse, CancelInitiateRequest,
    CreateBookingRequest, CreateBookingResponse, GuestInitiateRequest, LookupInitiateRequest,
    LookupVerifyRequest, OtpIssued, PayBookingResponse, VerifyRequest,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::auth::{require_user, AuthUser};
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct BookingEnvelope {
    booking: BookingView,
}

#[derive(Debug, Serialize)]
struct BookingsEnvelope {
    bookings: Vec<BookingView>,
}

pub fn routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/api/bookings", post(create_booking))
        .route("/api/bookings/me", get(my_bookings))
        .route("/api/bookings/{id}/cancel", post(cancel_booking))
        .route("/api/bookings/{id}/pay", post(pay_booking))
        .layer(middleware::from_fn_with_state(state, require_user));

    Router::new()
        .route("/api/bookings/initiate", post(guest_initiate))
        .route("/api/bookings/verify", post(guest_verify))
        .route("/api/bookings/cancel/initiate", post(guest_cancel_initiate))
        .route("/api/bookings/cancel/verify", post(guest_cancel_verify))
        .route("/api/bookings/lookup/initiate", post(lookup_initiate))
        .route("/api/bookings/lookup/verify", post(lookup_verify))
        .merge(protected)
}

// -- guest flows -------------------------------------------------------------

/// Creates a five-minute hold (or re-sends the code for an existing one)
/// and issues a verification code.
async fn guest_initiate(
    State(state): State<AppState>,
    Json(req): Json<GuestInitiateRequest>,
) -> Result<(StatusCode, Json<OtpIssued>), ApiError> {
    let issued = state.engine.write().await.guest_initiate(req)?;
    Ok((StatusCode::CREATED, Json(issued)))
}

async fn guest_verify(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<BookingEnvelope>, ApiError> {
    let booking = state.engine.write().await.guest_verify(req)?;
    Ok(Json(BookingEnvelope { booking }))
}

async fn guest_cancel_initiate(
    State(state): State<AppState>,
    Json(req): Json<CancelInitiateRequest>,
) -> Result<Json<OtpIssued>, ApiError> {
    let issued = state.engine.write().await.guest_cancel_initiate(req)?;
    Ok(Json(issued))
}

async fn guest_cancel_verify(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<BookingEnvelope>, ApiError> {
    let booking = state.engine.write().await.guest_cancel_verify(req)?;
    Ok(Json(BookingEnvelope { booking }))
}

async fn lookup_initiate(
    State(state): State<AppState>,
    Json(req): Json<LookupInitiateRequest>,
) -> Result<Json<OtpIssued>, ApiError> {
    let issued = state.engine.write().await.lookup_initiate(req)?;
    Ok(Json(issued))
}

async fn lookup_verify(
    State(state): State<AppState>,
    Json(req): Json<LookupVerifyRequest>,
) -> Result<Json<BookingsEnvelope>, ApiError> {
    let bookings = state.engine.write().await.lookup_verify(req)?;
    Ok(Json(BookingsEnvelope { bookings }))
}

// -- member flows ------------------------------------------------------------

/// POST /api/bookings
/// An `idempotency-key` header takes precedence over the body field; a
/// replayed key returns the original booking with a 200.
async fn create_booking(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    headers: HeaderMap,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<CreateBookingResponse>), ApiError> {
    let idempotency_key = headers
        .get("idempotency-key")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| req.idempotency_key.clone());

    let created = state
        .engine
        .write()
        .await
        .create_booking(user.id, idempotency_key, req)?;
    let status = if created.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(created.response)))
}

async fn my_bookings(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> Json<BookingsEnvelope> {
    let bookings = state.engine.read().await.my_bookings(user.id);
    Json(BookingsEnvelope { bookings })
}

async fn cancel_booking(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(booking_id): Path<Uuid>,
    body: Option<Json<CancelBookingRequest>>,
) -> Result<Json<CancelBookingResponse>, ApiError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let response = state
        .engine
        .write()
        .await
        .cancel_booking(user.id, booking_id, req.refund_option)?;
    Ok(Json(response))
}

async fn pay_booking(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<PayBookingResponse>, ApiError> {
    let response = state.engine.write().await.pay_booking(user.id, booking_id)?;
    Ok(Json(response))
}
