use axum::{extract::State, middleware, routing::get, Extension, Json, Router};
use courtly_core::notify::NotificationMessage;
use serde::Serialize;

use crate::middleware::auth::{require_user, AuthUser};
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct NotificationsEnvelope {
    notifications: Vec<NotificationMessage>,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/notifications/me", get(my_notifications))
        .layer(middleware::from_fn_with_state(state, require_user))
}

async fn my_notifications(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> Json<NotificationsEnvelope> {
    let notifications = state.engine.read().await.notifications_for(user.id);
    Json(NotificationsEnvelope { notifications })
}
