use crate::error::{EngineError, EngineResult};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    PaymentPending,
    Paid,
    Failed,
    Refunded,
    Credited,
}

impl PaymentStatus {
    /// Legal transitions: pending settles or fails, a failed charge may
    /// be retried, and a paid payment is undone to exactly one of the
    /// two refund rails. `Refunded` and `Credited` are terminal.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::PaymentPending, Self::Paid)
                | (Self::PaymentPending, Self::Failed)
                | (Self::Failed, Self::Paid)
                | (Self::Paid, Self::Refunded)
                | (Self::Paid, Self::Credited)
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Wallet,
}

impl Default for PaymentMethod {
    fn default() -> Self {
        Self::Card
    }
}

/// Where the money goes when a paid booking is cancelled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RefundDestination {
    Wallet,
    OriginalMethod,
}

impl Default for RefundDestination {
    fn default() -> Self {
        Self::Wallet
    }
}

/// Outcome of the refund branch on cancellation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    None,
    Credited,
    Refunded,
}

impl std::fmt::Display for RefundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::None => "none",
            Self::Credited => "credited",
            Self::Refunded => "refunded",
        };
        write!(f, "{label}")
    }
}

/// At most one per booking. Created pending (due at slot start) for
/// standard bookings, or pre-paid for the individuals slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub status: PaymentStatus,
    pub amount: i64,
    pub currency: String,
    pub due_at: Option<DateTime<FixedOffset>>,
    pub paid_at: Option<DateTime<FixedOffset>>,
    pub provider_ref: Option<String>,
    pub method: PaymentMethod,
}

impl Payment {
    pub fn transition(&mut self, next: PaymentStatus) -> EngineResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(EngineError::InvalidState(format!(
                "Cannot move payment from {:?} to {:?}",
                self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }

    pub fn mark_paid(
        &mut self,
        now: DateTime<FixedOffset>,
        provider_ref: Option<String>,
    ) -> EngineResult<()> {
        self.transition(PaymentStatus::Paid)?;
        self.paid_at = Some(now);
        if provider_ref.is_some() {
            self.provider_ref = provider_ref;
        }
        Ok(())
    }
}
