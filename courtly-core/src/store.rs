use crate::booking::{Booking, BookingStatus};
use crate::notify::NotificationMessage;
use crate::payment::Payment;
use crate::user::User;
use crate::verification::{OtpPurpose, Verification, VerificationSubject};
use crate::wallet::WalletTransaction;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// The whole engine state as one serializable document. This is exactly
/// what gets snapshotted to storage; every field tolerates being absent
/// so older snapshots keep loading.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct EngineStore {
    #[serde(default)]
    pub users: HashMap<Uuid, User>,
    #[serde(default)]
    pub bookings: HashMap<Uuid, Booking>,
    #[serde(default)]
    pub payments: Vec<Payment>,
    #[serde(default)]
    pub verifications: Vec<Verification>,
    #[serde(default)]
    pub wallet_transactions: Vec<WalletTransaction>,
    #[serde(default)]
    pub notifications: Vec<NotificationMessage>,
    #[serde(default)]
    pub idempotency: HashMap<String, Uuid>,
}

impl EngineStore {
    pub fn user_by_email(&self, email: &str) -> Option<&User> {
        self.users.values().find(|user| user.email == email)
    }

    /// Booked or confirmed booking occupying a cell. Used for conflict
    /// detection and for rendering occupied slots.
    pub fn cell_active_booking(
        &self,
        court_id: i32,
        start: DateTime<FixedOffset>,
    ) -> Option<&Booking> {
        self.bookings.values().find(|booking| {
            booking.court_id == court_id
                && booking.start == start
                && matches!(
                    booking.status,
                    BookingStatus::Booked | BookingStatus::Confirmed
                )
        })
    }

    /// Unverified booking whose hold has not lapsed yet. Lapsed holds are
    /// invisible here even before the sweeper flips their status.
    pub fn cell_live_hold(
        &self,
        court_id: i32,
        start: DateTime<FixedOffset>,
        now: DateTime<FixedOffset>,
    ) -> Option<&Booking> {
        self.bookings.values().find(|booking| {
            booking.court_id == court_id && booking.start == start && booking.has_live_hold(now)
        })
    }

    pub fn booking_by_reference_and_phone(&self, reference: &str, phone: &str) -> Option<&Booking> {
        self.bookings.values().find(|booking| {
            booking.reference == reference && booking.phone.as_deref() == Some(phone)
        })
    }

    pub fn reference_exists(&self, reference: &str) -> bool {
        self.bookings
            .values()
            .any(|booking| booking.reference == reference)
    }

    pub fn payment_for_booking(&self, booking_id: Uuid) -> Option<&Payment> {
        self.payments
            .iter()
            .find(|payment| payment.booking_id == booking_id)
    }

    pub fn payment_for_booking_mut(&mut self, booking_id: Uuid) -> Option<&mut Payment> {
        self.payments
            .iter_mut()
            .find(|payment| payment.booking_id == booking_id)
    }

    /// Most recently issued code for a subject and purpose. Records are
    /// append-only, so the last match in insertion order is the latest.
    pub fn latest_verification(
        &self,
        subject: &VerificationSubject,
        purpose: OtpPurpose,
    ) -> Option<&Verification> {
        self.verifications
            .iter()
            .rev()
            .find(|record| record.subject == *subject && record.purpose == purpose)
    }

    pub fn latest_verification_mut(
        &mut self,
        subject: &VerificationSubject,
        purpose: OtpPurpose,
    ) -> Option<&mut Verification> {
        self.verifications
            .iter_mut()
            .rev()
            .find(|record| record.subject == *subject && record.purpose == purpose)
    }

    /// Upcoming confirmed bookings for a phone number, soonest first.
    pub fn confirmed_future_bookings_by_phone(
        &self,
        phone: &str,
        now: DateTime<FixedOffset>,
    ) -> Vec<&Booking> {
        let mut matches: Vec<&Booking> = self
            .bookings
            .values()
            .filter(|booking| {
                booking.phone.as_deref() == Some(phone)
                    && booking.status == BookingStatus::Confirmed
                    && booking.start >= now
            })
            .collect();
        matches.sort_by_key(|booking| booking.start);
        matches
    }

    /// A member's bookings, soonest first.
    pub fn bookings_for_user(&self, user_id: Uuid) -> Vec<&Booking> {
        let mut matches: Vec<&Booking> = self
            .bookings
            .values()
            .filter(|booking| booking.user_id == Some(user_id))
            .collect();
        matches.sort_by_key(|booking| booking.start);
        matches
    }

    /// Every booking in the system, newest first.
    pub fn all_bookings_newest_first(&self) -> Vec<&Booking> {
        let mut all: Vec<&Booking> = self.bookings.values().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all
    }

    /// A member's ledger rows, newest first.
    pub fn wallet_transactions_for_user(&self, user_id: Uuid) -> Vec<&WalletTransaction> {
        let mut rows: Vec<&WalletTransaction> = self
            .wallet_transactions
            .iter()
            .filter(|row| row.user_id == user_id)
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows
    }

    /// A member's notification rows, newest first.
    pub fn notifications_for_user(&self, user_id: Uuid) -> Vec<&NotificationMessage> {
        let mut rows: Vec<&NotificationMessage> = self
            .notifications
            .iter()
            .filter(|row| row.user_id == Some(user_id))
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows
    }
}
