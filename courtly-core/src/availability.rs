use crate::payment::PaymentStatus;
use crate::store::EngineStore;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeZone};
use courtly_catalog::{CourtCatalog, OperatingHours, PricePolicy};
use serde::{Deserialize, Serialize};

/// Rendered state of one bookable cell. Never stored; derived from the
/// booking set on every query.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    Available,
    Held,
    Booked,
    PendingPayment,
    IndividualsSlot,
    Unavailable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub court_id: i32,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub is_special_individuals_slot: bool,
    pub state: SlotState,
    pub price: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    Full,
    Available,
    Partial,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaySummary {
    pub date: String,
    pub available: u32,
    pub total: u32,
    pub status: DayStatus,
}

/// Per-slot grid for one date, optionally narrowed to one court.
///
/// Precedence when several facts apply to the same cell: past beats
/// everything, then a live hold, then an unpaid active booking, then any
/// active booking, then the special-cell designation. Lapsed holds are
/// ignored outright, so this never depends on the sweeper having run.
pub fn compute_slots(
    store: &EngineStore,
    catalog: &CourtCatalog,
    hours: &OperatingHours,
    pricing: &PricePolicy,
    date: NaiveDate,
    court_filter: Option<i32>,
    now: DateTime<FixedOffset>,
) -> Vec<Slot> {
    let offset = *now.offset();
    let mut slots = Vec::new();

    for court in catalog.all() {
        if court_filter.is_some_and(|id| id != court.id) {
            continue;
        }

        for hour in hours.hours() {
            let Some(naive) = date.and_hms_opt(hour, 0, 0) else {
                continue;
            };
            let Some(start) = offset.from_local_datetime(&naive).single() else {
                continue;
            };
            let end = start + chrono::Duration::hours(1);
            let special = pricing.is_special(court.id, hour);

            let active = store.cell_active_booking(court.id, start);
            let held = store.cell_live_hold(court.id, start, now);
            let payment = active.and_then(|booking| store.payment_for_booking(booking.id));

            let state = if start <= now {
                SlotState::Unavailable
            } else if held.is_some() {
                SlotState::Held
            } else if active.is_some()
                && payment.is_some_and(|p| p.status == PaymentStatus::PaymentPending)
            {
                SlotState::PendingPayment
            } else if active.is_some() {
                SlotState::Booked
            } else if special {
                SlotState::IndividualsSlot
            } else {
                SlotState::Available
            };

            slots.push(Slot {
                court_id: court.id,
                start,
                end,
                is_special_individuals_slot: special,
                state,
                price: pricing.price_for(court.id, hour),
            });
        }
    }

    slots
}

/// Calendar roll-up for one month: how many future cells are still open
/// each day. A cell counts as open unless it is booked, confirmed, or
/// live-held; cells already in the past count as taken.
pub fn compute_month_summary(
    store: &EngineStore,
    catalog: &CourtCatalog,
    hours: &OperatingHours,
    year: i32,
    month: u32,
    now: DateTime<FixedOffset>,
) -> Option<Vec<DaySummary>> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let offset = *now.offset();
    let total = hours.slots_per_day() * catalog.len() as u32;
    let mut days = Vec::new();

    let mut date = first;
    while date.month() == month {
        let mut available = 0u32;

        for court in catalog.all() {
            for hour in hours.hours() {
                let Some(naive) = date.and_hms_opt(hour, 0, 0) else {
                    continue;
                };
                let Some(start) = offset.from_local_datetime(&naive).single() else {
                    continue;
                };
                if start <= now {
                    continue;
                }
                if store.cell_active_booking(court.id, start).is_none()
                    && store.cell_live_hold(court.id, start, now).is_none()
                {
                    available += 1;
                }
            }
        }

        let status = if available == 0 {
            DayStatus::Full
        } else if f64::from(available) >= f64::from(total) * 0.6 {
            DayStatus::Available
        } else {
            DayStatus::Partial
        };

        days.push(DaySummary {
            date: date.format("%Y-%m-%d").to_string(),
            available,
            total,
            status,
        });

        date = match date.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }

    Some(days)
}
