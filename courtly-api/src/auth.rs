use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use courtly_core::engine::{AuthResponse, SignInRequest, SignUpRequest};
use courtly_core::PublicUser;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::middleware::auth::{require_user, AuthUser};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
struct ForgotPasswordResponse {
    ok: bool,
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct MeResponse {
    user: PublicUser,
}

pub fn routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/api/auth/me", get(me))
        .layer(middleware::from_fn_with_state(state, require_user));

    Router::new()
        .route("/api/auth/sign-in", post(sign_in))
        .route("/api/auth/sign-up", post(sign_up))
        .route("/api/auth/forgot-password", post(forgot_password))
        .merge(protected)
}

async fn sign_in(
    State(state): State<AppState>,
    Json(req): Json<SignInRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let response = state.engine.read().await.sign_in(req)?;
    Ok(Json(response))
}

async fn sign_up(
    State(state): State<AppState>,
    Json(req): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let response = state.engine.write().await.sign_up(req)?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<ForgotPasswordResponse>, ApiError> {
    state
        .engine
        .read()
        .await
        .forgot_password(req.email.as_deref().unwrap_or_default())?;
    Ok(Json(ForgotPasswordResponse {
        ok: true,
        message: "If the account exists, reset instructions were sent (mocked).",
    }))
}

async fn me(Extension(AuthUser(user)): Extension<AuthUser>) -> Json<MeResponse> {
    Json(MeResponse { user })
}
