use axum::{
    extract::State,
    http::{header, HeaderName, Method},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod admin;
pub mod auth;
pub mod availability;
pub mod bookings;
pub mod demo;
pub mod error;
pub mod middleware;
pub mod notifications;
pub mod state;
pub mod wallet;
pub mod webhooks;
pub mod worker;

pub use state::AppState;

#[derive(Debug, Serialize)]
struct HealthResponse {
    ok: bool,
    service: &'static str,
    postgres: bool,
}

pub fn app(state: AppState) -> Router {
    // CORS Middleware
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::USER_AGENT,
            HeaderName::from_static("idempotency-key"),
        ]);

    Router::new()
        .route("/health", get(health))
        .merge(auth::routes(state.clone()))
        .merge(availability::routes())
        .merge(bookings::routes(state.clone()))
        .merge(wallet::routes(state.clone()))
        .merge(notifications::routes(state.clone()))
        .merge(admin::routes(state.clone()))
        .merge(webhooks::routes())
        .merge(demo::routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        service: "courtly-api",
        postgres: state.postgres,
    })
}
