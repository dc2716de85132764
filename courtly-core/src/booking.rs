use crate::error::{EngineError, EngineResult};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Booking status in the lifecycle. `Cancelled` and `ExpiredHold` are
/// terminal; nothing leaves them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    PendingVerification,
    Booked,
    Confirmed,
    Cancelled,
    ExpiredHold,
}

impl BookingStatus {
    /// Booked or confirmed: the booking occupies its cell outright.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Booked | Self::Confirmed)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::ExpiredHold)
    }

    /// The legal (state, next) pairs. Everything else fails closed.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::PendingVerification, Self::Confirmed)
                | (Self::PendingVerification, Self::ExpiredHold)
                | (Self::Booked, Self::Cancelled)
                | (Self::Confirmed, Self::Cancelled)
        )
    }
}

/// The central entity: one reserved (court, hour) cell. Bookings are
/// never physically deleted; cancelled and expired ones stay as history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub reference: String,
    /// Owning account, if booked while signed in. Guest bookings carry
    /// contact details instead.
    pub user_id: Option<Uuid>,
    pub first_name: Option<String>,
    pub surname: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub court_id: i32,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub status: BookingStatus,
    pub created_at: DateTime<FixedOffset>,
    pub cancellation_deadline: DateTime<FixedOffset>,
    pub hold_expires_at: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub reminder_sent: bool,
    #[serde(default)]
    pub manual_cancellation_override: bool,
}

impl Booking {
    /// Move to `next`, failing closed on anything the transition table
    /// does not allow.
    pub fn transition(&mut self, next: BookingStatus) -> EngineResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(EngineError::InvalidState(format!(
                "Cannot move booking from {:?} to {:?}",
                self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }

    pub fn has_live_hold(&self, now: DateTime<FixedOffset>) -> bool {
        self.status == BookingStatus::PendingVerification
            && self.hold_expires_at.map(|expiry| expiry > now).unwrap_or(false)
    }

    /// Whether this booking keeps its cell out of the pool: an active
    /// booking or a hold that has not lapsed yet.
    pub fn blocks_cell(&self, now: DateTime<FixedOffset>) -> bool {
        self.status.is_active() || self.has_live_hold(now)
    }

    /// The 24h rule, with the manual admin override on top.
    pub fn cancellation_window_open(&self, now: DateTime<FixedOffset>) -> bool {
        self.manual_cancellation_override || now < self.cancellation_deadline
    }

    pub fn cancellable(&self, now: DateTime<FixedOffset>) -> bool {
        self.status.is_active() && self.cancellation_window_open(now)
    }
}
