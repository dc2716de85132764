use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use courtly_catalog::Court;
use courtly_core::availability::{DaySummary, Slot};
use courtly_core::EngineError;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub month: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DayQuery {
    pub date: Option<String>,
    pub court_id: Option<i32>,
}

#[derive(Debug, Serialize)]
struct CourtsEnvelope {
    courts: Vec<Court>,
}

#[derive(Debug, Serialize)]
struct DaysEnvelope {
    days: Vec<DaySummary>,
}

#[derive(Debug, Serialize)]
struct SlotsEnvelope {
    slots: Vec<Slot>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/courts", get(courts))
        .route("/api/availability/summary", get(month_summary))
        .route("/api/availability", get(day_grid))
}

async fn courts(State(state): State<AppState>) -> Json<CourtsEnvelope> {
    let courts = state.engine.read().await.courts().to_vec();
    Json(CourtsEnvelope { courts })
}

/// GET /api/availability/summary?month=YYYY-MM
async fn month_summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<DaysEnvelope>, ApiError> {
    let (year, month) = parse_month(query.month.as_deref())?;
    let days = state.engine.read().await.month_summary(year, month)?;
    Ok(Json(DaysEnvelope { days }))
}

/// GET /api/availability?date=YYYY-MM-DD&court_id=N
async fn day_grid(
    State(state): State<AppState>,
    Query(query): Query<DayQuery>,
) -> Result<Json<SlotsEnvelope>, ApiError> {
    let date = query
        .date
        .as_deref()
        .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
        .ok_or_else(|| EngineError::Validation("date must be YYYY-MM-DD".to_string()))?;

    let slots = state.engine.read().await.slots(date, query.court_id);
    Ok(Json(SlotsEnvelope { slots }))
}

fn parse_month(raw: Option<&str>) -> Result<(i32, u32), ApiError> {
    let invalid = || EngineError::Validation("month must be YYYY-MM".to_string());
    let raw = raw.ok_or_else(invalid)?;
    let (year, month) = raw.split_once('-').ok_or_else(invalid)?;
    if year.len() != 4 || month.len() != 2 {
        return Err(invalid().into());
    }
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    Ok((year, month))
}
