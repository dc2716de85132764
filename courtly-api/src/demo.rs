use axum::{extract::State, routing::post, Json, Router};
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct ResetResponse {
    ok: bool,
    users: usize,
    bookings: usize,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/demo/reset", post(reset))
}

/// Drops all state and reseeds the walkthrough scenario. Guarded by the
/// demo flag; disabled deployments get a 403.
async fn reset(State(state): State<AppState>) -> Result<Json<ResetResponse>, ApiError> {
    let (users, bookings) = state.engine.write().await.demo_reset()?;
    Ok(Json(ResetResponse {
        ok: true,
        users,
        bookings,
    }))
}
