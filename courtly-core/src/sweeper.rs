use crate::booking::BookingStatus;
use crate::notify::{self, Channel, NotificationSink};
use crate::store::EngineStore;
use chrono::{DateTime, FixedOffset};
use courtly_shared::models::events::NotificationKind;
use tracing::debug;

/// What one reconciliation pass changed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepOutcome {
    pub expired_holds: u32,
    pub reminders_sent: u32,
}

impl SweepOutcome {
    pub fn changed_anything(&self) -> bool {
        self.expired_holds > 0 || self.reminders_sent > 0
    }
}

/// Reconcile time-derived booking state: lapse overdue holds and send
/// start-time reminders. Runs before every mutating operation and on a
/// background tick; a pass over an already-consistent store is a no-op,
/// so running it twice is always safe.
pub fn sweep(
    store: &mut EngineStore,
    sink: &dyn NotificationSink,
    channels: &[Channel],
    reminder_hours: i64,
    now: DateTime<FixedOffset>,
) -> SweepOutcome {
    let mut outcome = SweepOutcome::default();
    let EngineStore {
        users,
        bookings,
        notifications,
        ..
    } = store;

    for booking in bookings.values_mut() {
        if booking.status == BookingStatus::PendingVerification && booking.hold_expires_at.is_some()
        {
            let lapsed = booking
                .hold_expires_at
                .is_some_and(|expiry| now >= expiry);
            if lapsed && booking.transition(BookingStatus::ExpiredHold).is_ok() {
                debug!(booking_id = %booking.id, "hold lapsed");
                outcome.expired_holds += 1;
            }
            continue;
        }

        if !matches!(
            booking.status,
            BookingStatus::Booked | BookingStatus::Confirmed
        ) {
            continue;
        }

        let threshold = booking.start - chrono::Duration::hours(reminder_hours);
        if !booking.reminder_sent && now >= threshold && now < booking.start {
            if let Some(user) = booking.user_id.and_then(|id| users.get(&id)) {
                let recipient = user
                    .phone
                    .clone()
                    .unwrap_or_else(|| user.email.clone());
                let message = format!(
                    "Reminder: {} starts in less than {}h on {}.",
                    booking.reference,
                    reminder_hours,
                    booking.start.format("%d %b %H:%M")
                );
                let rows = notify::dispatch(
                    sink,
                    channels,
                    Some(user.id),
                    Some(booking.id),
                    NotificationKind::Reminder24h,
                    &recipient,
                    &message,
                    now,
                );
                notifications.extend(rows);
                outcome.reminders_sent += 1;
            }
            // Marked even without a known recipient so the pass never
            // retries a reminder forever.
            booking.reminder_sent = true;
        }
    }

    outcome
}
