use crate::booking::{Booking, BookingStatus};
use crate::engine::LifecycleRules;
use crate::payment::{Payment, PaymentMethod, PaymentStatus};
use crate::store::EngineStore;
use crate::user::{User, UserRole};
use crate::wallet::{self, WalletTransactionType};
use chrono::{DateTime, Duration, FixedOffset, TimeZone, Timelike};
use courtly_catalog::{OperatingHours, PricePolicy};
use uuid::Uuid;

fn truncate_to_hour(dt: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    dt.with_minute(0)
        .and_then(|d| d.with_second(0))
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(dt)
}

/// Earliest bookable slot a few hours out, walking forward until one
/// lands inside operating hours. Falls back to a plain offset when the
/// walk finds nothing within the horizon.
pub fn next_open_slot(
    hours: &OperatingHours,
    now: DateTime<FixedOffset>,
    horizon_hours: u32,
) -> DateTime<FixedOffset> {
    let mut slot = truncate_to_hour(now + Duration::hours(4));
    for _ in 0..horizon_hours {
        if slot > now && hours.contains_hour(slot.hour()) {
            return slot;
        }
        slot += Duration::hours(1);
    }
    truncate_to_hour(now + Duration::hours(6))
}

fn upcoming_day_at(now: DateTime<FixedOffset>, days: i64, hour: u32) -> DateTime<FixedOffset> {
    let date = (now + Duration::days(days)).date_naive();
    let offset = *now.offset();
    date.and_hms_opt(hour, 0, 0)
        .and_then(|naive| offset.from_local_datetime(&naive).single())
        .unwrap_or_else(|| truncate_to_hour(now + Duration::days(days)))
}

fn seeded_booking(
    user: &User,
    reference: &str,
    court_id: i32,
    start: DateTime<FixedOffset>,
    rules: &LifecycleRules,
    now: DateTime<FixedOffset>,
) -> Booking {
    let mut parts = user.name.splitn(2, ' ');
    let first_name = parts.next().unwrap_or("Demo").to_string();
    let surname = parts.next().unwrap_or("User").to_string();
    Booking {
        id: Uuid::new_v4(),
        reference: reference.to_string(),
        user_id: Some(user.id),
        first_name: Some(first_name),
        surname: Some(surname),
        email: Some(user.email.clone()),
        phone: user.phone.clone(),
        court_id,
        start,
        end: start + Duration::hours(1),
        status: BookingStatus::Confirmed,
        created_at: now,
        cancellation_deadline: rules.cancellation_deadline(start),
        hold_expires_at: None,
        reminder_sent: false,
        manual_cancellation_override: false,
    }
}

fn pending_payment(booking: &Booking, amount: i64, currency: &str) -> Payment {
    Payment {
        id: Uuid::new_v4(),
        booking_id: booking.id,
        status: PaymentStatus::PaymentPending,
        amount,
        currency: currency.to_string(),
        due_at: Some(booking.start),
        paid_at: None,
        provider_ref: None,
        method: PaymentMethod::Card,
    }
}

/// Deterministic walkthrough data for demo mode: two members with wallet
/// credit, an admin, two cancellable standard bookings, two inside the
/// cancellation window, and one already-paid individuals-slot booking.
pub fn demo_store(
    password: &str,
    hours: &OperatingHours,
    pricing: &PricePolicy,
    rules: &LifecycleRules,
    now: DateTime<FixedOffset>,
) -> EngineStore {
    let mut store = EngineStore::default();

    let mut court_user = User::new(
        "Demo Court Booker".to_string(),
        "demo.court@courtly.test".to_string(),
        Some("+27715550102".to_string()),
        password,
        UserRole::Member,
        now,
    );
    let mut individual_user = User::new(
        "Demo Individual Booker".to_string(),
        "demo.individual@courtly.test".to_string(),
        Some("+27715550103".to_string()),
        password,
        UserRole::Member,
        now,
    );
    let admin = User::new(
        "Demo Venue Admin".to_string(),
        "demo.admin@courtly.test".to_string(),
        Some("+27715550101".to_string()),
        password,
        UserRole::Admin,
        now,
    );

    wallet::credit(
        &mut court_user,
        &mut store.wallet_transactions,
        120,
        WalletTransactionType::Credit,
        None,
        "Demo wallet credit",
        now,
    );
    wallet::credit(
        &mut individual_user,
        &mut store.wallet_transactions,
        180,
        WalletTransactionType::Credit,
        None,
        "Demo wallet credit",
        now,
    );

    let cancellable_start = upcoming_day_at(now, 3, 18);
    let locked_start = next_open_slot(hours, now, 22);
    let individual_start = upcoming_day_at(now, 4, 17);

    let court_future = seeded_booking(
        &court_user,
        "CTL-DEMO-COURT-A01",
        2,
        cancellable_start,
        rules,
        now,
    );
    let court_locked = seeded_booking(
        &court_user,
        "CTL-DEMO-COURT-A02",
        1,
        locked_start,
        rules,
        now,
    );
    let individual_future = seeded_booking(
        &individual_user,
        "CTL-DEMO-COURT-B01",
        3,
        cancellable_start,
        rules,
        now,
    );
    let individual_locked = seeded_booking(
        &individual_user,
        "CTL-DEMO-COURT-B02",
        2,
        locked_start,
        rules,
        now,
    );
    let individual_paid = seeded_booking(
        &individual_user,
        "CTL-DEMO-IND-01",
        4,
        individual_start,
        rules,
        now,
    );

    store.payments.push(pending_payment(
        &court_future,
        pricing.flat_rate,
        &pricing.currency,
    ));
    store.payments.push(pending_payment(
        &court_locked,
        pricing.flat_rate,
        &pricing.currency,
    ));
    store.payments.push(pending_payment(
        &individual_future,
        pricing.flat_rate,
        &pricing.currency,
    ));
    store.payments.push(pending_payment(
        &individual_locked,
        pricing.flat_rate,
        &pricing.currency,
    ));
    store.payments.push(Payment {
        id: Uuid::new_v4(),
        booking_id: individual_paid.id,
        status: PaymentStatus::Paid,
        amount: pricing.individual_rate,
        currency: pricing.currency.clone(),
        due_at: Some(individual_paid.start),
        paid_at: Some(now),
        provider_ref: Some("MOCK-DEMO-PAID".to_string()),
        method: PaymentMethod::Card,
    });

    for booking in [
        court_future,
        court_locked,
        individual_future,
        individual_locked,
        individual_paid,
    ] {
        store.bookings.insert(booking.id, booking);
    }
    for user in [court_user, individual_user, admin] {
        store.users.insert(user.id, user);
    }

    store
}
