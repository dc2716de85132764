use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use courtly_core::{EngineError, PublicUser, UserRole};

use crate::error::ApiError;
use crate::state::AppState;

/// The signed-in caller, injected into request extensions by
/// [`require_user`].
#[derive(Debug, Clone)]
pub struct AuthUser(pub PublicUser);

pub async fn require_user(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .unwrap_or_default();

    let user = state
        .engine
        .read()
        .await
        .authenticate(token)
        .ok_or(EngineError::Unauthorized)?;

    req.extensions_mut().insert(AuthUser(user));
    Ok(next.run(req).await)
}

/// Layered inside [`require_user`]; relies on the extension it injects.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    let is_admin = req
        .extensions()
        .get::<AuthUser>()
        .is_some_and(|AuthUser(user)| user.role == UserRole::Admin);
    if !is_admin {
        return Err(EngineError::Forbidden.into());
    }
    Ok(next.run(req).await)
}
