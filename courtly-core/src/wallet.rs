use crate::error::{EngineError, EngineResult};
use crate::user::User;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WalletTransactionType {
    Credit,
    Refund,
    BookingPayment,
}

/// Append-only ledger row. Every row moves the balance by its signed
/// amount — refunds to the original rail included, so the ledger a user
/// sees always adds up to their balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    #[serde(rename = "type")]
    pub kind: WalletTransactionType,
    pub booking_id: Option<Uuid>,
    pub description: String,
    pub created_at: DateTime<FixedOffset>,
}

/// Recompute a balance from scratch. The stored balance must equal this
/// at every point in history.
pub fn replay_balance<'a>(entries: impl IntoIterator<Item = &'a WalletTransaction>) -> i64 {
    entries.into_iter().map(|entry| entry.amount).sum()
}

/// The single choke point for balance mutation: the row and the balance
/// move together or not at all.
pub fn apply(user: &mut User, ledger: &mut Vec<WalletTransaction>, entry: WalletTransaction) {
    debug_assert_eq!(user.id, entry.user_id);
    user.wallet_balance += entry.amount;
    ledger.push(entry);
}

/// Debit the wallet for a booking. Fails without touching anything when
/// the balance cannot cover the amount; the balance never goes negative.
pub fn charge(
    user: &mut User,
    ledger: &mut Vec<WalletTransaction>,
    amount: i64,
    booking_id: Uuid,
    description: &str,
    now: DateTime<FixedOffset>,
) -> EngineResult<()> {
    if user.wallet_balance < amount {
        return Err(EngineError::InsufficientWallet);
    }
    apply(
        user,
        ledger,
        WalletTransaction {
            id: Uuid::new_v4(),
            user_id: user.id,
            amount: -amount,
            kind: WalletTransactionType::BookingPayment,
            booking_id: Some(booking_id),
            description: description.to_string(),
            created_at: now,
        },
    );
    Ok(())
}

/// Add funds back: `Credit` for wallet credits, `Refund` for money that
/// notionally leaves via the original payment rail but is still logged
/// as a balance-affecting entry.
pub fn credit(
    user: &mut User,
    ledger: &mut Vec<WalletTransaction>,
    amount: i64,
    kind: WalletTransactionType,
    booking_id: Option<Uuid>,
    description: &str,
    now: DateTime<FixedOffset>,
) {
    apply(
        user,
        ledger,
        WalletTransaction {
            id: Uuid::new_v4(),
            user_id: user.id,
            amount,
            kind,
            booking_id,
            description: description.to_string(),
            created_at: now,
        },
    );
}
