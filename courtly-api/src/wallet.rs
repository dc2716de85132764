use axum::{extract::State, middleware, routing::get, Extension, Json, Router};
use courtly_core::engine::WalletView;
use courtly_core::EngineError;

use crate::error::ApiError;
use crate::middleware::auth::{require_user, AuthUser};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/wallet/me", get(my_wallet))
        .layer(middleware::from_fn_with_state(state, require_user))
}

async fn my_wallet(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> Result<Json<WalletView>, ApiError> {
    let view = state
        .engine
        .read()
        .await
        .wallet_view(user.id)
        .ok_or(EngineError::Unauthorized)?;
    Ok(Json(view))
}
