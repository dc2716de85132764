use crate::availability::{self, DaySummary, Slot};
use crate::booking::{Booking, BookingStatus};
use crate::clock::Clock;
use crate::error::{EngineError, EngineResult};
use crate::notify::{self, Channel, NotificationMessage, NotificationSink};
use crate::payment::{Payment, PaymentMethod, PaymentStatus, RefundDestination, RefundStatus};
use crate::persist::PersistHandle;
use crate::seed;
use crate::store::EngineStore;
use crate::sweeper::{self, SweepOutcome};
use crate::user::{PublicUser, User, UserRole};
use crate::verification::{OtpPurpose, Verification, VerificationSubject};
use crate::verification::OtpPolicy;
use crate::wallet::{self, WalletTransactionType};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Timelike};
use courtly_catalog::{Court, CourtCatalog, OperatingHours, PricePolicy};
use courtly_shared::models::events::{DeliveryStatus, NotificationKind};
use courtly_shared::pii::{mask_phone, Masked};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

const CANCELLATION_CLOSED_REASON: &str = "Cancellation disabled within 24 hours of start time.";
const PHONE_FORMAT_MESSAGE: &str = "Phone number must include country code and digits only.";
const CHECKOUT_URL: &str = "https://checkout.mock/courtly";

/// Timing rules for the booking lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleRules {
    pub hold_minutes: i64,
    pub cancellation_window_hours: i64,
    pub reminder_hours: i64,
}

impl Default for LifecycleRules {
    fn default() -> Self {
        Self {
            hold_minutes: 5,
            cancellation_window_hours: 24,
            reminder_hours: 24,
        }
    }
}

impl LifecycleRules {
    pub fn hold_expiry(&self, now: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        now + Duration::minutes(self.hold_minutes)
    }

    pub fn cancellation_deadline(&self, start: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        start - Duration::hours(self.cancellation_window_hours)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoSettings {
    pub enabled: bool,
    pub password: String,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            password: "DemoPass123!".to_string(),
        }
    }
}

/// Everything the engine needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub catalog: CourtCatalog,
    pub hours: OperatingHours,
    pub pricing: PricePolicy,
    pub rules: LifecycleRules,
    pub otp: OtpPolicy,
    pub demo: DemoSettings,
    pub channels: Vec<Channel>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let pricing = PricePolicy::default();
        Self {
            catalog: CourtCatalog::standard(pricing.flat_rate),
            hours: OperatingHours::default(),
            pricing,
            rules: LifecycleRules::default(),
            otp: OtpPolicy::default(),
            demo: DemoSettings::default(),
            channels: vec![Channel::Whatsapp, Channel::Telegram],
        }
    }
}

// ---------------------------------------------------------------------------
// Request / response payloads

#[derive(Debug, Clone, Deserialize)]
pub struct GuestInitiateRequest {
    /// Present on a resend: re-issues a code for an existing hold instead
    /// of creating a new one.
    pub booking_id: Option<Uuid>,
    pub court_id: i32,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub first_name: String,
    pub surname: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyRequest {
    pub booking_id: Uuid,
    pub code: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelInitiateRequest {
    pub reference: String,
    pub phone: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LookupInitiateRequest {
    pub phone: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LookupVerifyRequest {
    pub phone: String,
    pub code: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: Masked<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignUpRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password: Masked<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBookingRequest {
    pub court_id: i32,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    /// May also arrive as an `idempotency-key` header, which wins.
    #[serde(default)]
    pub idempotency_key: String,
    pub pay_immediately: Option<bool>,
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelBookingRequest {
    #[serde(default)]
    pub refund_option: RefundDestination,
}

#[derive(Debug, Clone, Serialize)]
pub struct OtpIssued {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<Uuid>,
    pub expires_at: DateTime<FixedOffset>,
    /// Clear code, exposed only while demo mode is on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub demo_code: Option<String>,
}

/// A booking joined with everything a caller renders alongside it.
#[derive(Debug, Clone, Serialize)]
pub struct BookingView {
    pub booking: Booking,
    pub court: Option<Court>,
    pub payment: Option<Payment>,
    pub cancellation_allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateBookingResponse {
    pub booking: BookingView,
    /// Set on fresh creations only; an idempotent replay omits it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_animation: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct CreatedBooking {
    pub response: CreateBookingResponse,
    /// False when an idempotency key replayed an earlier creation.
    pub created: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelBookingResponse {
    pub booking: BookingView,
    pub refund_status: RefundStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct PayBookingResponse {
    pub payment_url: String,
    pub booking: BookingView,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: PublicUser,
}

#[derive(Debug, Clone, Serialize)]
pub struct WalletView {
    pub wallet_balance: i64,
    pub transactions: Vec<crate::wallet::WalletTransaction>,
}

// ---------------------------------------------------------------------------
// Token helpers

pub fn issue_token(user_id: Uuid) -> String {
    STANDARD.encode(format!("uid:{user_id}"))
}

fn decode_token(token: &str) -> Option<Uuid> {
    let bytes = STANDARD.decode(token).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    let id = text.strip_prefix("uid:")?;
    Uuid::parse_str(id).ok()
}

// ---------------------------------------------------------------------------
// Input validation

fn valid_phone(phone: &str) -> bool {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    (10..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}

fn valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

fn valid_code(code: &str) -> bool {
    code.len() == 6 && code.chars().all(|c| c.is_ascii_digit())
}

fn validation(message: &str) -> EngineError {
    EngineError::Validation(message.to_string())
}

// ---------------------------------------------------------------------------
// Engine

/// Single authority over booking, verification, payment, and wallet
/// state. Callers wrap it in `Arc<tokio::sync::RwLock<_>>`: mutating
/// operations take the write guard, so each check-then-write sequence is
/// atomic; read-only queries share the read guard.
pub struct Engine {
    store: EngineStore,
    catalog: CourtCatalog,
    hours: OperatingHours,
    pricing: PricePolicy,
    rules: LifecycleRules,
    otp: OtpPolicy,
    demo: DemoSettings,
    channels: Vec<Channel>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn NotificationSink>,
    persist: PersistHandle,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn NotificationSink>,
        persist: PersistHandle,
    ) -> Self {
        Self::with_store(EngineStore::default(), config, clock, sink, persist)
    }

    pub fn with_store(
        store: EngineStore,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn NotificationSink>,
        persist: PersistHandle,
    ) -> Self {
        Self {
            store,
            catalog: config.catalog,
            hours: config.hours,
            pricing: config.pricing,
            rules: config.rules,
            otp: config.otp,
            demo: config.demo,
            channels: config.channels,
            clock,
            sink,
            persist,
        }
    }

    pub fn demo_enabled(&self) -> bool {
        self.demo.enabled
    }

    pub fn courts(&self) -> &[Court] {
        self.catalog.all()
    }

    fn now(&self) -> DateTime<FixedOffset> {
        self.clock.now()
    }

    /// Reconcile time-derived state, exactly as the background tick does.
    /// Every mutating operation calls this before its own checks, so no
    /// caller ever observes a lapsed hold as live.
    pub fn run_sweep(&mut self) -> SweepOutcome {
        let now = self.now();
        self.sweep_at(now)
    }

    fn sweep_at(&mut self, now: DateTime<FixedOffset>) -> SweepOutcome {
        let outcome = sweeper::sweep(
            &mut self.store,
            self.sink.as_ref(),
            &self.channels,
            self.rules.reminder_hours,
            now,
        );
        if outcome.changed_anything() {
            self.publish_snapshot();
        }
        outcome
    }

    fn publish_snapshot(&self) {
        match serde_json::to_string(&self.store) {
            Ok(json) => self.persist.publish(json),
            Err(err) => error!(%err, "failed to serialize state snapshot"),
        }
    }

    pub fn snapshot_json(&self) -> EngineResult<String> {
        serde_json::to_string(&self.store)
            .map_err(|err| EngineError::Validation(format!("snapshot serialization failed: {err}")))
    }

    fn view(&self, booking: &Booking) -> BookingView {
        let now = self.now();
        let allowed = booking.cancellable(now);
        BookingView {
            booking: booking.clone(),
            court: self.catalog.get(booking.court_id).ok().cloned(),
            payment: self.store.payment_for_booking(booking.id).cloned(),
            cancellation_allowed: allowed,
            cancellation_reason: (!allowed).then_some(CANCELLATION_CLOSED_REASON),
        }
    }

    fn generate_reference(&self) -> String {
        loop {
            let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
            let reference = format!("CTL-{n:06}");
            if !self.store.reference_exists(&reference) {
                return reference;
            }
        }
    }

    /// Rate-limit, mint, and record a code for one subject. Returns the
    /// expiry and, in demo mode, the clear code.
    fn issue_code(
        &mut self,
        subject: VerificationSubject,
        purpose: OtpPurpose,
        phone: &str,
        now: DateTime<FixedOffset>,
    ) -> EngineResult<(DateTime<FixedOffset>, Option<String>)> {
        if let Some(existing) = self.store.latest_verification(&subject, purpose) {
            if !existing.can_resend(now, &self.otp) {
                return Err(EngineError::OtpRateLimit);
            }
        }
        let (record, code) = Verification::issue(subject, purpose, &self.otp, self.clock.as_ref());
        let expires_at = record.expires_at;
        self.store.verifications.push(record);

        let demo_code = if self.demo.enabled {
            info!(
                recipient = %mask_phone(phone),
                code = %code,
                purpose = ?purpose,
                "demo verification code issued"
            );
            Some(code)
        } else {
            None
        };
        Ok((expires_at, demo_code))
    }

    /// Check a submitted code against the latest record. A mismatch burns
    /// an attempt, which is durable state, so it is snapshotted even
    /// though the operation fails.
    fn check_code(
        &mut self,
        subject: &VerificationSubject,
        purpose: OtpPurpose,
        code: &str,
        now: DateTime<FixedOffset>,
    ) -> EngineResult<()> {
        let result = {
            let Some(record) = self.store.latest_verification_mut(subject, purpose) else {
                return Err(EngineError::OtpNotFound);
            };
            record.check(code, now, &self.otp)
        };
        if let Err(err) = result {
            if matches!(err, EngineError::OtpInvalid) {
                self.publish_snapshot();
            }
            return Err(err);
        }
        Ok(())
    }

    fn notify_member(
        &mut self,
        user_id: Uuid,
        booking_id: Option<Uuid>,
        kind: NotificationKind,
        message: String,
    ) {
        let now = self.now();
        let Some(user) = self.store.users.get(&user_id) else {
            return;
        };
        let recipient = user.phone.clone().unwrap_or_else(|| user.email.clone());
        let rows = notify::dispatch(
            self.sink.as_ref(),
            &self.channels,
            Some(user_id),
            booking_id,
            kind,
            &recipient,
            &message,
            now,
        );
        self.store.notifications.extend(rows);
    }

    // -- availability ------------------------------------------------------

    pub fn slots(&self, date: NaiveDate, court_filter: Option<i32>) -> Vec<Slot> {
        availability::compute_slots(
            &self.store,
            &self.catalog,
            &self.hours,
            &self.pricing,
            date,
            court_filter,
            self.now(),
        )
    }

    pub fn month_summary(&self, year: i32, month: u32) -> EngineResult<Vec<DaySummary>> {
        availability::compute_month_summary(
            &self.store,
            &self.catalog,
            &self.hours,
            year,
            month,
            self.now(),
        )
        .ok_or_else(|| validation("month must be YYYY-MM"))
    }

    // -- guest booking flow ------------------------------------------------

    pub fn guest_initiate(&mut self, req: GuestInitiateRequest) -> EngineResult<OtpIssued> {
        let now = self.now();
        self.sweep_at(now);

        if req.first_name.trim().chars().count() < 2 || req.surname.trim().chars().count() < 2 {
            return Err(validation("Invalid booking payload"));
        }
        if !valid_email(&req.email) {
            return Err(validation("Invalid booking payload"));
        }
        if !valid_phone(&req.phone) {
            return Err(validation(PHONE_FORMAT_MESSAGE));
        }

        if let Some(booking_id) = req.booking_id {
            return self.reissue_hold_code(booking_id, now);
        }

        self.catalog.get(req.court_id)?;
        if req.end - req.start != Duration::hours(1) {
            return Err(validation("Bookings must be exactly one hour."));
        }
        if req.start <= now {
            return Err(EngineError::InvalidTime);
        }
        if self
            .store
            .cell_active_booking(req.court_id, req.start)
            .is_some()
            || self
                .store
                .cell_live_hold(req.court_id, req.start, now)
                .is_some()
        {
            return Err(EngineError::SlotConflict(
                "Slot is already booked or held.".to_string(),
            ));
        }

        let booking = Booking {
            id: Uuid::new_v4(),
            reference: self.generate_reference(),
            user_id: None,
            first_name: Some(req.first_name.trim().to_string()),
            surname: Some(req.surname.trim().to_string()),
            email: Some(req.email.clone()),
            phone: Some(req.phone.clone()),
            court_id: req.court_id,
            start: req.start,
            end: req.end,
            status: BookingStatus::PendingVerification,
            created_at: now,
            cancellation_deadline: self.rules.cancellation_deadline(req.start),
            hold_expires_at: Some(self.rules.hold_expiry(now)),
            reminder_sent: false,
            manual_cancellation_override: false,
        };
        let booking_id = booking.id;
        self.store.bookings.insert(booking_id, booking);

        let (expires_at, demo_code) = self.issue_code(
            VerificationSubject::Booking(booking_id),
            OtpPurpose::ConfirmBooking,
            &req.phone,
            now,
        )?;
        self.publish_snapshot();
        Ok(OtpIssued {
            booking_id: Some(booking_id),
            expires_at,
            demo_code,
        })
    }

    fn reissue_hold_code(
        &mut self,
        booking_id: Uuid,
        now: DateTime<FixedOffset>,
    ) -> EngineResult<OtpIssued> {
        let (phone, hold_expires_at) = {
            let booking = self
                .store
                .bookings
                .get(&booking_id)
                .ok_or_else(|| EngineError::NotFound("Booking not found.".to_string()))?;
            if booking.status != BookingStatus::PendingVerification {
                return Err(EngineError::InvalidState(
                    "Booking is not awaiting verification.".to_string(),
                ));
            }
            (booking.phone.clone(), booking.hold_expires_at)
        };
        if hold_expires_at.is_some_and(|expiry| expiry <= now) {
            return Err(EngineError::HoldExpired);
        }

        let phone = phone.unwrap_or_default();
        let (expires_at, demo_code) = self.issue_code(
            VerificationSubject::Booking(booking_id),
            OtpPurpose::ConfirmBooking,
            &phone,
            now,
        )?;
        self.publish_snapshot();
        Ok(OtpIssued {
            booking_id: Some(booking_id),
            expires_at,
            demo_code,
        })
    }

    pub fn guest_verify(&mut self, req: VerifyRequest) -> EngineResult<BookingView> {
        let now = self.now();
        self.sweep_at(now);

        if !valid_code(&req.code) {
            return Err(validation("Invalid verification payload"));
        }
        {
            let booking = self
                .store
                .bookings
                .get(&req.booking_id)
                .ok_or_else(|| EngineError::NotFound("Booking not found.".to_string()))?;
            if booking.status != BookingStatus::PendingVerification {
                return Err(EngineError::InvalidState(
                    "Booking is not awaiting verification.".to_string(),
                ));
            }
        }

        self.check_code(
            &VerificationSubject::Booking(req.booking_id),
            OtpPurpose::ConfirmBooking,
            &req.code,
            now,
        )?;

        let booking = {
            let booking = self
                .store
                .bookings
                .get_mut(&req.booking_id)
                .ok_or_else(|| EngineError::NotFound("Booking not found.".to_string()))?;
            booking.transition(BookingStatus::Confirmed)?;
            booking.hold_expires_at = None;
            booking.clone()
        };
        self.publish_snapshot();
        Ok(self.view(&booking))
    }

    // -- guest cancellation flow -------------------------------------------

    pub fn guest_cancel_initiate(
        &mut self,
        req: CancelInitiateRequest,
    ) -> EngineResult<OtpIssued> {
        let now = self.now();
        self.sweep_at(now);

        if req.reference.chars().count() < 4 {
            return Err(validation("Invalid cancellation payload"));
        }
        if !valid_phone(&req.phone) {
            return Err(validation(PHONE_FORMAT_MESSAGE));
        }

        let (booking_id, phone) = {
            let booking = self
                .store
                .booking_by_reference_and_phone(&req.reference, &req.phone)
                .ok_or_else(|| EngineError::NotFound("Booking not found.".to_string()))?;
            if !booking.cancellation_window_open(now) {
                return Err(EngineError::CancellationWindowClosed);
            }
            if !matches!(
                booking.status,
                BookingStatus::Confirmed | BookingStatus::Booked
            ) {
                return Err(EngineError::InvalidState(
                    "Booking is not active.".to_string(),
                ));
            }
            (booking.id, booking.phone.clone().unwrap_or_default())
        };

        let (expires_at, demo_code) = self.issue_code(
            VerificationSubject::Booking(booking_id),
            OtpPurpose::CancelBooking,
            &phone,
            now,
        )?;
        self.publish_snapshot();
        Ok(OtpIssued {
            booking_id: Some(booking_id),
            expires_at,
            demo_code,
        })
    }

    pub fn guest_cancel_verify(&mut self, req: VerifyRequest) -> EngineResult<BookingView> {
        let now = self.now();
        self.sweep_at(now);

        if !valid_code(&req.code) {
            return Err(validation("Invalid verification payload"));
        }
        {
            let booking = self
                .store
                .bookings
                .get(&req.booking_id)
                .ok_or_else(|| EngineError::NotFound("Booking not found.".to_string()))?;
            if !matches!(
                booking.status,
                BookingStatus::Confirmed | BookingStatus::Booked
            ) {
                return Err(EngineError::InvalidState(
                    "Booking is not active.".to_string(),
                ));
            }
        }

        self.check_code(
            &VerificationSubject::Booking(req.booking_id),
            OtpPurpose::CancelBooking,
            &req.code,
            now,
        )?;

        let booking = {
            let booking = self
                .store
                .bookings
                .get_mut(&req.booking_id)
                .ok_or_else(|| EngineError::NotFound("Booking not found.".to_string()))?;
            booking.transition(BookingStatus::Cancelled)?;
            booking.clone()
        };
        self.publish_snapshot();
        Ok(self.view(&booking))
    }

    // -- guest lookup flow -------------------------------------------------

    /// Always issues a code for a well-formed phone number. Whether any
    /// bookings exist is only revealed after a successful verify.
    pub fn lookup_initiate(&mut self, req: LookupInitiateRequest) -> EngineResult<OtpIssued> {
        let now = self.now();
        self.sweep_at(now);

        if !valid_phone(&req.phone) {
            return Err(validation(PHONE_FORMAT_MESSAGE));
        }

        let (expires_at, demo_code) = self.issue_code(
            VerificationSubject::Phone(req.phone.clone()),
            OtpPurpose::Lookup,
            &req.phone,
            now,
        )?;
        self.publish_snapshot();
        Ok(OtpIssued {
            booking_id: None,
            expires_at,
            demo_code,
        })
    }

    pub fn lookup_verify(&mut self, req: LookupVerifyRequest) -> EngineResult<Vec<BookingView>> {
        let now = self.now();
        self.sweep_at(now);

        if !valid_phone(&req.phone) || !valid_code(&req.code) {
            return Err(validation("Invalid lookup verification"));
        }

        self.check_code(
            &VerificationSubject::Phone(req.phone.clone()),
            OtpPurpose::Lookup,
            &req.code,
            now,
        )?;
        self.publish_snapshot();

        let views: Vec<BookingView> = self
            .store
            .confirmed_future_bookings_by_phone(&req.phone, now)
            .into_iter()
            .cloned()
            .collect::<Vec<Booking>>()
            .iter()
            .map(|booking| self.view(booking))
            .collect();
        Ok(views)
    }

    // -- accounts ----------------------------------------------------------

    pub fn sign_in(&self, req: SignInRequest) -> EngineResult<AuthResponse> {
        if !valid_email(&req.email) || req.password.0.is_empty() {
            return Err(validation("Invalid sign in payload"));
        }
        let user = self
            .store
            .user_by_email(&req.email)
            .filter(|user| user.verify_password(&req.password.0))
            .ok_or(EngineError::InvalidCredentials)?;
        Ok(AuthResponse {
            token: issue_token(user.id),
            user: user.to_public(),
        })
    }

    pub fn sign_up(&mut self, req: SignUpRequest) -> EngineResult<AuthResponse> {
        if req.name.trim().chars().count() < 2
            || !valid_email(&req.email)
            || req.password.0.chars().count() < 8
        {
            return Err(validation("Invalid sign up payload"));
        }
        if self.store.user_by_email(&req.email).is_some() {
            return Err(EngineError::EmailExists);
        }

        let user = User::new(
            req.name.trim().to_string(),
            req.email,
            req.phone,
            &req.password.0,
            UserRole::Member,
            self.now(),
        );
        let response = AuthResponse {
            token: issue_token(user.id),
            user: user.to_public(),
        };
        self.store.users.insert(user.id, user);
        self.publish_snapshot();
        Ok(response)
    }

    /// Password reset is mocked end to end. The address shape is still
    /// validated so the caller gets the same contract as the real thing,
    /// but nothing here discloses whether the account exists.
    pub fn forgot_password(&self, email: &str) -> EngineResult<()> {
        if !valid_email(email) {
            return Err(validation("A valid email is required"));
        }
        Ok(())
    }

    pub fn authenticate(&self, token: &str) -> Option<PublicUser> {
        decode_token(token)
            .and_then(|id| self.store.users.get(&id))
            .map(User::to_public)
    }

    pub fn public_user(&self, user_id: Uuid) -> Option<PublicUser> {
        self.store.users.get(&user_id).map(User::to_public)
    }

    // -- member booking flow -----------------------------------------------

    pub fn create_booking(
        &mut self,
        user_id: Uuid,
        idempotency_key: String,
        req: CreateBookingRequest,
    ) -> EngineResult<CreatedBooking> {
        let now = self.now();
        self.sweep_at(now);

        if req.idempotency_key.chars().count() < 8 {
            return Err(validation("Invalid booking payload"));
        }
        self.catalog.get(req.court_id)?;

        if let Some(existing_id) = self.store.idempotency.get(&idempotency_key) {
            if let Some(existing) = self.store.bookings.get(existing_id) {
                let view = self.view(existing);
                return Ok(CreatedBooking {
                    response: CreateBookingResponse {
                        booking: view,
                        payment_animation: None,
                    },
                    created: false,
                });
            }
        }

        if req.end - req.start != Duration::hours(1) {
            return Err(validation("Bookings must be exactly one hour."));
        }
        if req.start <= now {
            return Err(EngineError::InvalidTime);
        }
        let conflict = self.store.bookings.values().any(|booking| {
            booking.court_id == req.court_id
                && booking.start == req.start
                && booking.status == BookingStatus::Booked
        });
        if conflict {
            return Err(EngineError::SlotConflict(
                "Slot is already booked.".to_string(),
            ));
        }

        let special =
            req.start.minute() == 0 && self.pricing.is_special(req.court_id, req.start.hour());
        let amount = if special {
            self.pricing.individual_rate
        } else {
            self.pricing.flat_rate
        };
        let method = req.payment_method.unwrap_or_default();

        if special && !req.pay_immediately.unwrap_or(false) {
            return Err(EngineError::PaymentRequired);
        }

        let booking = Booking {
            id: Uuid::new_v4(),
            reference: self.generate_reference(),
            user_id: Some(user_id),
            first_name: None,
            surname: None,
            email: None,
            phone: None,
            court_id: req.court_id,
            start: req.start,
            end: req.end,
            status: BookingStatus::Booked,
            created_at: now,
            cancellation_deadline: self.rules.cancellation_deadline(req.start),
            hold_expires_at: None,
            reminder_sent: false,
            manual_cancellation_override: false,
        };
        let booking_id = booking.id;
        let reference = booking.reference.clone();

        // Wallet debit goes first so a failed charge leaves nothing behind.
        if special && method == PaymentMethod::Wallet {
            let EngineStore {
                users,
                wallet_transactions,
                ..
            } = &mut self.store;
            let user = users
                .get_mut(&user_id)
                .ok_or_else(|| EngineError::NotFound("Booking not found".to_string()))?;
            wallet::charge(
                user,
                wallet_transactions,
                amount,
                booking_id,
                "Individual slot booking payment",
                now,
            )?;
        }

        let payment = Payment {
            id: Uuid::new_v4(),
            booking_id,
            status: if special {
                PaymentStatus::Paid
            } else {
                PaymentStatus::PaymentPending
            },
            amount,
            currency: self.pricing.currency.clone(),
            due_at: Some(req.start),
            paid_at: special.then_some(now),
            provider_ref: special.then(|| format!("MOCK-{}", now.timestamp_millis())),
            method,
        };
        let paid = payment.status == PaymentStatus::Paid;

        self.store.bookings.insert(booking_id, booking);
        self.store.payments.push(payment);
        self.store
            .idempotency
            .insert(idempotency_key, booking_id);

        self.notify_member(
            user_id,
            Some(booking_id),
            NotificationKind::BookingConfirmation,
            format!(
                "Booking confirmed: {} at {} on Court {}.",
                reference,
                req.start.format("%d %b %H:%M"),
                req.court_id
            ),
        );
        if paid {
            self.notify_member(
                user_id,
                Some(booking_id),
                NotificationKind::PaymentConfirmation,
                format!(
                    "Payment confirmed for {}. Amount {} {}.",
                    reference, self.pricing.currency, amount
                ),
            );
        }
        self.publish_snapshot();

        let booking = self
            .store
            .bookings
            .get(&booking_id)
            .ok_or_else(|| EngineError::NotFound("Booking not found".to_string()))?
            .clone();
        Ok(CreatedBooking {
            response: CreateBookingResponse {
                booking: self.view(&booking),
                payment_animation: Some(paid),
            },
            created: true,
        })
    }

    pub fn my_bookings(&self, user_id: Uuid) -> Vec<BookingView> {
        self.store
            .bookings_for_user(user_id)
            .into_iter()
            .cloned()
            .collect::<Vec<Booking>>()
            .iter()
            .map(|booking| self.view(booking))
            .collect()
    }

    pub fn cancel_booking(
        &mut self,
        user_id: Uuid,
        booking_id: Uuid,
        destination: RefundDestination,
    ) -> EngineResult<CancelBookingResponse> {
        let now = self.now();
        self.sweep_at(now);

        {
            let booking = self
                .store
                .bookings
                .get_mut(&booking_id)
                .filter(|booking| booking.user_id == Some(user_id))
                .ok_or_else(|| EngineError::NotFound("Booking not found".to_string()))?;
            if !matches!(
                booking.status,
                BookingStatus::Booked | BookingStatus::Confirmed
            ) {
                return Err(EngineError::InvalidState(
                    "Only active bookings can be cancelled.".to_string(),
                ));
            }
            if !booking.cancellation_window_open(now) {
                return Err(EngineError::CancellationWindowClosed);
            }
            booking.transition(BookingStatus::Cancelled)?;
        }

        let mut refund_status = RefundStatus::None;
        let mut refund_amount = None;
        if let Some(payment) = self.store.payment_for_booking_mut(booking_id) {
            if payment.status == PaymentStatus::Paid {
                let (target, status) = match destination {
                    RefundDestination::Wallet => (PaymentStatus::Credited, RefundStatus::Credited),
                    RefundDestination::OriginalMethod => {
                        (PaymentStatus::Refunded, RefundStatus::Refunded)
                    }
                };
                payment.transition(target)?;
                refund_amount = Some(payment.amount);
                refund_status = status;
            }
        }

        if let Some(amount) = refund_amount {
            let (kind, description) = match destination {
                RefundDestination::Wallet => {
                    (WalletTransactionType::Credit, "Cancellation credit")
                }
                RefundDestination::OriginalMethod => {
                    (WalletTransactionType::Refund, "Refund to payment method")
                }
            };
            let EngineStore {
                users,
                wallet_transactions,
                ..
            } = &mut self.store;
            if let Some(user) = users.get_mut(&user_id) {
                wallet::credit(
                    user,
                    wallet_transactions,
                    amount,
                    kind,
                    Some(booking_id),
                    description,
                    now,
                );
            }
        }

        let (reference, booking) = {
            let booking = self
                .store
                .bookings
                .get(&booking_id)
                .ok_or_else(|| EngineError::NotFound("Booking not found".to_string()))?;
            (booking.reference.clone(), booking.clone())
        };
        self.notify_member(
            user_id,
            Some(booking_id),
            NotificationKind::CancellationConfirmation,
            format!("Booking {reference} cancelled. Status: {refund_status}."),
        );
        if refund_status != RefundStatus::None {
            self.notify_member(
                user_id,
                Some(booking_id),
                NotificationKind::RefundProcessed,
                format!("Refund processing completed for {reference}: {refund_status}."),
            );
        }
        self.publish_snapshot();

        Ok(CancelBookingResponse {
            booking: self.view(&booking),
            refund_status,
        })
    }

    pub fn pay_booking(&mut self, user_id: Uuid, booking_id: Uuid) -> EngineResult<PayBookingResponse> {
        let now = self.now();
        self.sweep_at(now);

        let booking = self
            .store
            .bookings
            .get(&booking_id)
            .filter(|booking| booking.user_id == Some(user_id))
            .ok_or_else(|| EngineError::NotFound("Booking not found".to_string()))?
            .clone();

        let (reference, amount, already_paid) = {
            let payment = self
                .store
                .payment_for_booking_mut(booking_id)
                .ok_or(EngineError::NoPaymentDue)?;
            if payment.status == PaymentStatus::Paid {
                (booking.reference.clone(), payment.amount, true)
            } else {
                payment.mark_paid(now, Some(format!("MOCK-{}", now.timestamp_millis())))?;
                (booking.reference.clone(), payment.amount, false)
            }
        };

        if !already_paid {
            self.notify_member(
                user_id,
                Some(booking_id),
                NotificationKind::PaymentConfirmation,
                format!(
                    "Payment confirmed for {}. Amount {} {}.",
                    reference, self.pricing.currency, amount
                ),
            );
            self.publish_snapshot();
        }

        Ok(PayBookingResponse {
            payment_url: CHECKOUT_URL.to_string(),
            booking: self.view(&booking),
        })
    }

    pub fn wallet_view(&self, user_id: Uuid) -> Option<WalletView> {
        let user = self.store.users.get(&user_id)?;
        Some(WalletView {
            wallet_balance: user.wallet_balance,
            transactions: self
                .store
                .wallet_transactions_for_user(user_id)
                .into_iter()
                .cloned()
                .collect(),
        })
    }

    pub fn notifications_for(&self, user_id: Uuid) -> Vec<NotificationMessage> {
        self.store
            .notifications_for_user(user_id)
            .into_iter()
            .cloned()
            .collect()
    }

    // -- admin --------------------------------------------------------------

    pub fn admin_bookings(&self) -> Vec<BookingView> {
        self.store
            .all_bookings_newest_first()
            .into_iter()
            .cloned()
            .collect::<Vec<Booking>>()
            .iter()
            .map(|booking| self.view(booking))
            .collect()
    }

    pub fn set_cancellation_override(
        &mut self,
        booking_id: Uuid,
        enabled: bool,
    ) -> EngineResult<BookingView> {
        let now = self.now();
        self.sweep_at(now);

        let booking = {
            let booking = self
                .store
                .bookings
                .get_mut(&booking_id)
                .ok_or_else(|| EngineError::NotFound("Booking not found".to_string()))?;
            booking.manual_cancellation_override = enabled;
            booking.clone()
        };
        self.publish_snapshot();
        Ok(self.view(&booking))
    }

    // -- webhooks ------------------------------------------------------------

    pub fn apply_notification_delivery(
        &mut self,
        notification_id: Uuid,
        status: Option<DeliveryStatus>,
    ) -> EngineResult<()> {
        let row = self
            .store
            .notifications
            .iter_mut()
            .find(|row| row.id == notification_id)
            .ok_or_else(|| EngineError::NotFound("Notification not found".to_string()))?;
        row.status = status.unwrap_or(DeliveryStatus::Delivered);
        self.publish_snapshot();
        Ok(())
    }

    pub fn apply_payment_update(
        &mut self,
        booking_id: Uuid,
        paid: bool,
        provider_ref: Option<String>,
    ) -> EngineResult<()> {
        let now = self.now();
        let payment = self
            .store
            .payment_for_booking_mut(booking_id)
            .ok_or_else(|| EngineError::NotFound("Payment not found".to_string()))?;

        if paid {
            payment.mark_paid(now, provider_ref)?;
        } else {
            payment.transition(PaymentStatus::Failed)?;
            payment.paid_at = None;
            if provider_ref.is_some() {
                payment.provider_ref = provider_ref;
            }
        }
        self.publish_snapshot();
        Ok(())
    }

    // -- demo -----------------------------------------------------------------

    /// Throw everything away and reseed the walkthrough data. Returns the
    /// seeded (users, bookings) counts.
    pub fn demo_reset(&mut self) -> EngineResult<(usize, usize)> {
        if !self.demo.enabled {
            return Err(EngineError::DemoDisabled);
        }
        self.store = seed::demo_store(
            &self.demo.password,
            &self.hours,
            &self.pricing,
            &self.rules,
            self.now(),
        );
        self.publish_snapshot();
        Ok((self.store.users.len(), self.store.bookings.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::notify::MockChannelSink;
    use chrono::TimeZone;
    use tokio::sync::RwLock;

    fn tz() -> FixedOffset {
        FixedOffset::east_opt(2 * 3600).unwrap()
    }

    fn base_now() -> DateTime<FixedOffset> {
        tz().with_ymd_and_hms(2025, 6, 10, 9, 0, 0).unwrap()
    }

    fn at(day: u32, hour: u32) -> DateTime<FixedOffset> {
        tz().with_ymd_and_hms(2025, 6, day, hour, 0, 0).unwrap()
    }

    fn engine_at(now: DateTime<FixedOffset>) -> (Engine, Arc<ManualClock>) {
        engine_with_config(EngineConfig::default(), now)
    }

    fn engine_with_config(
        config: EngineConfig,
        now: DateTime<FixedOffset>,
    ) -> (Engine, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_at(now));
        let engine = Engine::new(
            config,
            clock.clone(),
            Arc::new(MockChannelSink),
            PersistHandle::disabled(),
        );
        (engine, clock)
    }

    fn member(engine: &mut Engine, email: &str) -> Uuid {
        engine
            .sign_up(SignUpRequest {
                name: "Test Member".to_string(),
                email: email.to_string(),
                phone: Some("+27821230000".to_string()),
                password: Masked("hunter2hunter2".to_string()),
            })
            .unwrap()
            .user
            .id
    }

    fn fund(engine: &mut Engine, user_id: Uuid, amount: i64) {
        let now = engine.now();
        let EngineStore {
            users,
            wallet_transactions,
            ..
        } = &mut engine.store;
        let user = users.get_mut(&user_id).unwrap();
        wallet::credit(
            user,
            wallet_transactions,
            amount,
            WalletTransactionType::Credit,
            None,
            "Test credit",
            now,
        );
    }

    fn guest_request(court_id: i32, start: DateTime<FixedOffset>) -> GuestInitiateRequest {
        GuestInitiateRequest {
            booking_id: None,
            court_id,
            start,
            end: start + Duration::hours(1),
            first_name: "Ada".to_string(),
            surname: "Lovelace".to_string(),
            email: "ada@example.test".to_string(),
            phone: "+27821234567".to_string(),
        }
    }

    fn member_request(court_id: i32, start: DateTime<FixedOffset>, key: &str) -> CreateBookingRequest {
        CreateBookingRequest {
            court_id,
            start,
            end: start + Duration::hours(1),
            idempotency_key: key.to_string(),
            pay_immediately: None,
            payment_method: None,
        }
    }

    fn confirmed_guest_booking(engine: &mut Engine, court_id: i32, start: DateTime<FixedOffset>) -> Uuid {
        let issued = engine.guest_initiate(guest_request(court_id, start)).unwrap();
        let booking_id = issued.booking_id.unwrap();
        engine
            .guest_verify(VerifyRequest {
                booking_id,
                code: issued.demo_code.unwrap(),
            })
            .unwrap();
        booking_id
    }

    // -- guest flow ---------------------------------------------------------

    #[test]
    fn test_guest_flow_confirms_booking() {
        let (mut engine, _clock) = engine_at(base_now());
        let issued = engine.guest_initiate(guest_request(1, at(12, 14))).unwrap();

        let booking_id = issued.booking_id.unwrap();
        assert_eq!(issued.expires_at, base_now() + Duration::minutes(10));
        let code = issued.demo_code.unwrap();
        assert_eq!(code.len(), 6);

        let view = engine
            .guest_verify(VerifyRequest { booking_id, code })
            .unwrap();
        assert_eq!(view.booking.status, BookingStatus::Confirmed);
        assert!(view.booking.hold_expires_at.is_none());
        assert!(view.booking.reference.starts_with("CTL-"));
        assert!(view.cancellation_allowed);
        assert!(view.payment.is_none());
    }

    #[test]
    fn test_guest_initiate_rejects_bad_payloads() {
        let (mut engine, _clock) = engine_at(base_now());

        let mut short_name = guest_request(1, at(12, 14));
        short_name.first_name = "A".to_string();
        assert!(matches!(
            engine.guest_initiate(short_name),
            Err(EngineError::Validation(_))
        ));

        let mut bad_phone = guest_request(1, at(12, 14));
        bad_phone.phone = "081 234".to_string();
        let err = engine.guest_initiate(bad_phone).unwrap_err();
        assert!(err.to_string().contains("country code"));

        let mut ninety_minutes = guest_request(1, at(12, 14));
        ninety_minutes.end = ninety_minutes.start + Duration::minutes(90);
        let err = engine.guest_initiate(ninety_minutes).unwrap_err();
        assert!(err.to_string().contains("exactly one hour"));

        let past = guest_request(1, at(9, 14));
        assert!(matches!(
            engine.guest_initiate(past),
            Err(EngineError::InvalidTime)
        ));
    }

    #[test]
    fn test_guest_initiate_conflicts_with_live_hold() {
        let (mut engine, _clock) = engine_at(base_now());
        engine.guest_initiate(guest_request(1, at(12, 14))).unwrap();

        let mut second = guest_request(1, at(12, 14));
        second.phone = "+27829999999".to_string();
        let err = engine.guest_initiate(second).unwrap_err();
        assert!(matches!(err, EngineError::SlotConflict(_)));
        assert!(err.to_string().contains("booked or held"));
    }

    #[test]
    fn test_expired_hold_frees_cell_and_blocks_verify() {
        let (mut engine, clock) = engine_at(base_now());
        let issued = engine.guest_initiate(guest_request(1, at(12, 14))).unwrap();
        let booking_id = issued.booking_id.unwrap();
        let code = issued.demo_code.unwrap();

        clock.advance(Duration::minutes(6));
        let err = engine
            .guest_verify(VerifyRequest { booking_id, code })
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));
        assert_eq!(
            engine.store.bookings[&booking_id].status,
            BookingStatus::ExpiredHold
        );

        // The cell is free again for the next guest.
        let mut retry = guest_request(1, at(12, 14));
        retry.phone = "+27829999999".to_string();
        assert!(engine.guest_initiate(retry).is_ok());
    }

    #[test]
    fn test_resend_rate_limited_inside_cooldown() {
        let (mut engine, clock) = engine_at(base_now());
        let issued = engine.guest_initiate(guest_request(1, at(12, 14))).unwrap();

        let mut resend = guest_request(1, at(12, 14));
        resend.booking_id = issued.booking_id;
        assert!(matches!(
            engine.guest_initiate(resend.clone()),
            Err(EngineError::OtpRateLimit)
        ));

        clock.advance(Duration::seconds(45));
        let reissued = engine.guest_initiate(resend).unwrap();
        assert_eq!(reissued.booking_id, issued.booking_id);
        assert!(reissued.demo_code.is_some());
    }

    #[test]
    fn test_resend_requires_awaiting_verification() {
        let (mut engine, _clock) = engine_at(base_now());
        let booking_id = confirmed_guest_booking(&mut engine, 1, at(12, 14));

        let mut resend = guest_request(1, at(12, 14));
        resend.booking_id = Some(booking_id);
        let err = engine.guest_initiate(resend).unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));
        assert!(err.to_string().contains("awaiting verification"));

        let mut unknown = guest_request(1, at(12, 15));
        unknown.booking_id = Some(Uuid::new_v4());
        assert!(matches!(
            engine.guest_initiate(unknown),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn test_wrong_codes_lock_out_verification() {
        let (mut engine, _clock) = engine_at(base_now());
        let issued = engine.guest_initiate(guest_request(1, at(12, 14))).unwrap();
        let booking_id = issued.booking_id.unwrap();
        let code = issued.demo_code.unwrap();

        for _ in 0..5 {
            let err = engine
                .guest_verify(VerifyRequest {
                    booking_id,
                    code: "000000".to_string(),
                })
                .unwrap_err();
            assert!(matches!(err, EngineError::OtpInvalid));
        }

        // Even the right code is refused once attempts are exhausted.
        let err = engine
            .guest_verify(VerifyRequest { booking_id, code })
            .unwrap_err();
        assert!(matches!(err, EngineError::OtpMaxAttempts));
    }

    #[test]
    fn test_expired_code_is_rejected() {
        let (mut engine, clock) = engine_at(base_now());
        let booking_id = confirmed_guest_booking(&mut engine, 1, at(12, 14));
        let issued = engine
            .guest_cancel_initiate(CancelInitiateRequest {
                reference: engine.store.bookings[&booking_id].reference.clone(),
                phone: "+27821234567".to_string(),
            })
            .unwrap();

        clock.advance(Duration::minutes(11));
        let err = engine
            .guest_cancel_verify(VerifyRequest {
                booking_id,
                code: issued.demo_code.unwrap(),
            })
            .unwrap_err();
        assert!(matches!(err, EngineError::OtpExpired));
    }

    // -- guest cancellation -------------------------------------------------

    #[test]
    fn test_guest_cancel_flow() {
        let (mut engine, _clock) = engine_at(base_now());
        let booking_id = confirmed_guest_booking(&mut engine, 1, at(12, 14));
        let reference = engine.store.bookings[&booking_id].reference.clone();

        let issued = engine
            .guest_cancel_initiate(CancelInitiateRequest {
                reference,
                phone: "+27821234567".to_string(),
            })
            .unwrap();
        let view = engine
            .guest_cancel_verify(VerifyRequest {
                booking_id,
                code: issued.demo_code.unwrap(),
            })
            .unwrap();

        assert_eq!(view.booking.status, BookingStatus::Cancelled);
        // Guest bookings carry no payment, so nothing moves in the ledger.
        assert!(engine.store.payments.is_empty());
        assert!(engine.store.wallet_transactions.is_empty());
    }

    #[test]
    fn test_guest_cancel_requires_open_window_unless_overridden() {
        let (mut engine, _clock) = engine_at(base_now());
        // 23 hours before start: inside the no-cancel window.
        let booking_id = confirmed_guest_booking(&mut engine, 1, at(11, 8));
        let reference = engine.store.bookings[&booking_id].reference.clone();
        let request = CancelInitiateRequest {
            reference,
            phone: "+27821234567".to_string(),
        };

        assert!(matches!(
            engine.guest_cancel_initiate(request.clone()),
            Err(EngineError::CancellationWindowClosed)
        ));

        engine.set_cancellation_override(booking_id, true).unwrap();
        let issued = engine.guest_cancel_initiate(request).unwrap();
        let view = engine
            .guest_cancel_verify(VerifyRequest {
                booking_id,
                code: issued.demo_code.unwrap(),
            })
            .unwrap();
        assert_eq!(view.booking.status, BookingStatus::Cancelled);
    }

    #[test]
    fn test_guest_cancel_rejects_inactive_booking() {
        let (mut engine, _clock) = engine_at(base_now());
        let booking_id = confirmed_guest_booking(&mut engine, 1, at(12, 14));
        let reference = engine.store.bookings[&booking_id].reference.clone();
        let request = CancelInitiateRequest {
            reference,
            phone: "+27821234567".to_string(),
        };

        let issued = engine.guest_cancel_initiate(request.clone()).unwrap();
        engine
            .guest_cancel_verify(VerifyRequest {
                booking_id,
                code: issued.demo_code.unwrap(),
            })
            .unwrap();

        let err = engine.guest_cancel_initiate(request).unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));
        assert!(err.to_string().contains("not active"));
    }

    // -- lookup -------------------------------------------------------------

    #[test]
    fn test_lookup_issues_even_for_unknown_phone() {
        let (mut engine, _clock) = engine_at(base_now());
        let issued = engine
            .lookup_initiate(LookupInitiateRequest {
                phone: "+27820000001".to_string(),
            })
            .unwrap();
        assert!(issued.booking_id.is_none());

        let views = engine
            .lookup_verify(LookupVerifyRequest {
                phone: "+27820000001".to_string(),
                code: issued.demo_code.unwrap(),
            })
            .unwrap();
        assert!(views.is_empty());
    }

    #[test]
    fn test_lookup_returns_confirmed_future_bookings_in_order() {
        let (mut engine, _clock) = engine_at(base_now());
        confirmed_guest_booking(&mut engine, 2, at(13, 15));
        confirmed_guest_booking(&mut engine, 1, at(12, 14));

        let issued = engine
            .lookup_initiate(LookupInitiateRequest {
                phone: "+27821234567".to_string(),
            })
            .unwrap();
        let views = engine
            .lookup_verify(LookupVerifyRequest {
                phone: "+27821234567".to_string(),
                code: issued.demo_code.unwrap(),
            })
            .unwrap();

        assert_eq!(views.len(), 2);
        assert_eq!(views[0].booking.start, at(12, 14));
        assert_eq!(views[1].booking.start, at(13, 15));
        assert!(views[0].court.is_some());
    }

    // -- member bookings ----------------------------------------------------

    #[test]
    fn test_create_booking_replays_idempotency_key() {
        let (mut engine, _clock) = engine_at(base_now());
        let user_id = member(&mut engine, "alice@example.test");

        let first = engine
            .create_booking(
                user_id,
                "key-1234567890".to_string(),
                member_request(1, at(12, 14), "key-1234567890"),
            )
            .unwrap();
        assert!(first.created);
        assert_eq!(first.response.payment_animation, Some(false));

        let replay = engine
            .create_booking(
                user_id,
                "key-1234567890".to_string(),
                member_request(1, at(12, 14), "key-1234567890"),
            )
            .unwrap();
        assert!(!replay.created);
        assert!(replay.response.payment_animation.is_none());
        assert_eq!(
            replay.response.booking.booking.id,
            first.response.booking.booking.id
        );
        assert_eq!(engine.store.bookings.len(), 1);
    }

    #[test]
    fn test_create_booking_conflicts_with_booked_cell() {
        let (mut engine, _clock) = engine_at(base_now());
        let alice = member(&mut engine, "alice@example.test");
        let bob = member(&mut engine, "bob@example.test");

        engine
            .create_booking(
                alice,
                "key-alice-0001".to_string(),
                member_request(1, at(12, 14), "key-alice-0001"),
            )
            .unwrap();
        let err = engine
            .create_booking(
                bob,
                "key-bob-000001".to_string(),
                member_request(1, at(12, 14), "key-bob-000001"),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::SlotConflict(_)));
        assert!(err.to_string().contains("already booked."));
    }

    #[test]
    fn test_create_booking_skips_guest_confirmed_cells() {
        // The member-facing conflict check only counts `booked` rows, so a
        // guest-confirmed slot does not block a member creation. Kept as-is
        // until the product decides otherwise.
        let (mut engine, _clock) = engine_at(base_now());
        confirmed_guest_booking(&mut engine, 1, at(12, 14));
        let user_id = member(&mut engine, "alice@example.test");

        let created = engine
            .create_booking(
                user_id,
                "key-1234567890".to_string(),
                member_request(1, at(12, 14), "key-1234567890"),
            )
            .unwrap();
        assert!(created.created);
    }

    #[test]
    fn test_create_booking_pending_payment_due_at_start() {
        let (mut engine, _clock) = engine_at(base_now());
        let user_id = member(&mut engine, "alice@example.test");

        let created = engine
            .create_booking(
                user_id,
                "key-1234567890".to_string(),
                member_request(2, at(12, 14), "key-1234567890"),
            )
            .unwrap();

        let payment = created.response.booking.payment.unwrap();
        assert_eq!(payment.status, PaymentStatus::PaymentPending);
        assert_eq!(payment.amount, 700);
        assert_eq!(payment.due_at, Some(at(12, 14)));
        assert_eq!(payment.method, PaymentMethod::Card);

        let rows = engine.notifications_for(user_id);
        assert_eq!(rows.len(), 2); // booking confirmation on both channels
        assert!(rows
            .iter()
            .all(|row| row.kind == NotificationKind::BookingConfirmation));
        assert!(rows[0].message.contains("Booking confirmed"));
    }

    // -- special slot -------------------------------------------------------

    #[test]
    fn test_special_slot_requires_immediate_payment() {
        let (mut engine, _clock) = engine_at(base_now());
        let user_id = member(&mut engine, "alice@example.test");

        let err = engine
            .create_booking(
                user_id,
                "key-1234567890".to_string(),
                member_request(4, at(12, 17), "key-1234567890"),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::PaymentRequired));
        assert!(engine.store.bookings.is_empty());
    }

    #[test]
    fn test_special_slot_wallet_payment() {
        let (mut engine, _clock) = engine_at(base_now());
        let user_id = member(&mut engine, "alice@example.test");
        fund(&mut engine, user_id, 50);

        let mut request = member_request(4, at(12, 17), "key-1234567890");
        request.pay_immediately = Some(true);
        request.payment_method = Some(PaymentMethod::Wallet);

        let err = engine
            .create_booking(user_id, "key-1234567890".to_string(), request.clone())
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientWallet));
        assert!(engine.store.bookings.is_empty());
        assert_eq!(engine.store.users[&user_id].wallet_balance, 50);

        fund(&mut engine, user_id, 50);
        let created = engine
            .create_booking(user_id, "key-1234567890".to_string(), request)
            .unwrap();
        assert_eq!(created.response.payment_animation, Some(true));

        let payment = created.response.booking.payment.unwrap();
        assert_eq!(payment.status, PaymentStatus::Paid);
        assert_eq!(payment.amount, 80);
        assert!(payment.paid_at.is_some());
        assert!(payment.provider_ref.unwrap().starts_with("MOCK-"));

        assert_eq!(engine.store.users[&user_id].wallet_balance, 20);
        let debit = engine
            .store
            .wallet_transactions
            .iter()
            .find(|row| row.kind == WalletTransactionType::BookingPayment)
            .unwrap();
        assert_eq!(debit.amount, -80);
        assert_eq!(debit.description, "Individual slot booking payment");

        // Booking + payment confirmations, each on both channels.
        assert_eq!(engine.notifications_for(user_id).len(), 4);
    }

    #[test]
    fn test_special_slot_card_payment_marks_paid() {
        let (mut engine, _clock) = engine_at(base_now());
        let user_id = member(&mut engine, "alice@example.test");

        let mut request = member_request(4, at(12, 17), "key-1234567890");
        request.pay_immediately = Some(true);

        let created = engine
            .create_booking(user_id, "key-1234567890".to_string(), request)
            .unwrap();
        let payment = created.response.booking.payment.unwrap();
        assert_eq!(payment.status, PaymentStatus::Paid);
        assert_eq!(payment.method, PaymentMethod::Card);
        assert!(engine.store.wallet_transactions.is_empty());
    }

    // -- member cancellation ------------------------------------------------

    #[test]
    fn test_cancel_enforces_window_and_override() {
        let (mut engine, _clock) = engine_at(base_now());
        let user_id = member(&mut engine, "alice@example.test");
        let created = engine
            .create_booking(
                user_id,
                "key-1234567890".to_string(),
                member_request(1, at(11, 8), "key-1234567890"),
            )
            .unwrap();
        let booking_id = created.response.booking.booking.id;

        assert!(matches!(
            engine.cancel_booking(user_id, booking_id, RefundDestination::Wallet),
            Err(EngineError::CancellationWindowClosed)
        ));

        engine.set_cancellation_override(booking_id, true).unwrap();
        let cancelled = engine
            .cancel_booking(user_id, booking_id, RefundDestination::Wallet)
            .unwrap();
        assert_eq!(cancelled.booking.booking.status, BookingStatus::Cancelled);
        // Nothing was paid, so nothing is refunded.
        assert_eq!(cancelled.refund_status, RefundStatus::None);
    }

    #[test]
    fn test_cancel_rejects_foreign_and_inactive_bookings() {
        let (mut engine, _clock) = engine_at(base_now());
        let alice = member(&mut engine, "alice@example.test");
        let bob = member(&mut engine, "bob@example.test");
        let created = engine
            .create_booking(
                alice,
                "key-1234567890".to_string(),
                member_request(1, at(12, 14), "key-1234567890"),
            )
            .unwrap();
        let booking_id = created.response.booking.booking.id;

        assert!(matches!(
            engine.cancel_booking(bob, booking_id, RefundDestination::Wallet),
            Err(EngineError::NotFound(_))
        ));

        engine
            .cancel_booking(alice, booking_id, RefundDestination::Wallet)
            .unwrap();
        let err = engine
            .cancel_booking(alice, booking_id, RefundDestination::Wallet)
            .unwrap_err();
        assert!(err.to_string().contains("Only active bookings"));
    }

    #[test]
    fn test_cancel_paid_booking_credits_wallet() {
        let (mut engine, _clock) = engine_at(base_now());
        let user_id = member(&mut engine, "alice@example.test");
        fund(&mut engine, user_id, 100);

        let mut request = member_request(4, at(12, 17), "key-1234567890");
        request.pay_immediately = Some(true);
        request.payment_method = Some(PaymentMethod::Wallet);
        let created = engine
            .create_booking(user_id, "key-1234567890".to_string(), request)
            .unwrap();
        let booking_id = created.response.booking.booking.id;
        assert_eq!(engine.store.users[&user_id].wallet_balance, 20);

        let cancelled = engine
            .cancel_booking(user_id, booking_id, RefundDestination::Wallet)
            .unwrap();
        assert_eq!(cancelled.refund_status, RefundStatus::Credited);
        assert_eq!(
            cancelled.booking.payment.unwrap().status,
            PaymentStatus::Credited
        );
        assert_eq!(engine.store.users[&user_id].wallet_balance, 100);

        let credit = engine
            .store
            .wallet_transactions
            .iter()
            .find(|row| row.description == "Cancellation credit")
            .unwrap();
        assert_eq!(credit.amount, 80);
        assert_eq!(credit.kind, WalletTransactionType::Credit);
        assert_eq!(
            wallet::replay_balance(&engine.store.wallet_transactions),
            engine.store.users[&user_id].wallet_balance
        );

        let kinds: Vec<NotificationKind> = engine
            .notifications_for(user_id)
            .iter()
            .map(|row| row.kind)
            .collect();
        assert!(kinds.contains(&NotificationKind::CancellationConfirmation));
        assert!(kinds.contains(&NotificationKind::RefundProcessed));
    }

    #[test]
    fn test_cancel_refund_to_original_method_moves_balance() {
        let (mut engine, _clock) = engine_at(base_now());
        let user_id = member(&mut engine, "alice@example.test");

        let mut request = member_request(4, at(12, 17), "key-1234567890");
        request.pay_immediately = Some(true);
        let created = engine
            .create_booking(user_id, "key-1234567890".to_string(), request)
            .unwrap();
        let booking_id = created.response.booking.booking.id;

        let cancelled = engine
            .cancel_booking(user_id, booking_id, RefundDestination::OriginalMethod)
            .unwrap();
        assert_eq!(cancelled.refund_status, RefundStatus::Refunded);
        assert_eq!(
            cancelled.booking.payment.unwrap().status,
            PaymentStatus::Refunded
        );

        // Refund rows move the balance just like credits do; the balance
        // always equals the ledger sum.
        let refund = engine
            .store
            .wallet_transactions
            .iter()
            .find(|row| row.kind == WalletTransactionType::Refund)
            .unwrap();
        assert_eq!(refund.amount, 80);
        assert_eq!(engine.store.users[&user_id].wallet_balance, 80);
        assert_eq!(
            wallet::replay_balance(&engine.store.wallet_transactions),
            80
        );
    }

    // -- pay ----------------------------------------------------------------

    #[test]
    fn test_pay_settles_pending_payment_idempotently() {
        let (mut engine, _clock) = engine_at(base_now());
        let user_id = member(&mut engine, "alice@example.test");
        let created = engine
            .create_booking(
                user_id,
                "key-1234567890".to_string(),
                member_request(1, at(12, 14), "key-1234567890"),
            )
            .unwrap();
        let booking_id = created.response.booking.booking.id;

        let paid = engine.pay_booking(user_id, booking_id).unwrap();
        assert_eq!(paid.payment_url, CHECKOUT_URL);
        let payment = paid.booking.payment.unwrap();
        assert_eq!(payment.status, PaymentStatus::Paid);
        assert!(payment.provider_ref.unwrap().starts_with("MOCK-"));
        let notifications_after_first = engine.notifications_for(user_id).len();

        // Second call succeeds without changing anything.
        let again = engine.pay_booking(user_id, booking_id).unwrap();
        assert_eq!(
            again.booking.payment.unwrap().status,
            PaymentStatus::Paid
        );
        assert_eq!(engine.notifications_for(user_id).len(), notifications_after_first);
    }

    #[test]
    fn test_pay_requires_a_payment_row() {
        let (mut engine, _clock) = engine_at(base_now());
        let user_id = member(&mut engine, "alice@example.test");
        let created = engine
            .create_booking(
                user_id,
                "key-1234567890".to_string(),
                member_request(1, at(12, 14), "key-1234567890"),
            )
            .unwrap();
        let booking_id = created.response.booking.booking.id;
        engine.store.payments.clear();

        assert!(matches!(
            engine.pay_booking(user_id, booking_id),
            Err(EngineError::NoPaymentDue)
        ));
        assert!(matches!(
            engine.pay_booking(user_id, Uuid::new_v4()),
            Err(EngineError::NotFound(_))
        ));
    }

    // -- webhooks -----------------------------------------------------------

    #[test]
    fn test_payment_webhook_respects_transition_table() {
        let (mut engine, _clock) = engine_at(base_now());
        let user_id = member(&mut engine, "alice@example.test");
        let created = engine
            .create_booking(
                user_id,
                "key-1234567890".to_string(),
                member_request(1, at(12, 14), "key-1234567890"),
            )
            .unwrap();
        let booking_id = created.response.booking.booking.id;

        engine.apply_payment_update(booking_id, false, None).unwrap();
        let failed = engine.store.payment_for_booking(booking_id).unwrap();
        assert_eq!(failed.status, PaymentStatus::Failed);
        assert!(failed.paid_at.is_none());

        engine
            .apply_payment_update(booking_id, true, Some("PSP-77".to_string()))
            .unwrap();
        let paid = engine.store.payment_for_booking(booking_id).unwrap();
        assert_eq!(paid.status, PaymentStatus::Paid);
        assert_eq!(paid.provider_ref.as_deref(), Some("PSP-77"));
        assert!(paid.paid_at.is_some());

        // A settled payment cannot be un-paid by a late webhook.
        let err = engine.apply_payment_update(booking_id, false, None).unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));
        assert_eq!(
            engine.store.payment_for_booking(booking_id).unwrap().status,
            PaymentStatus::Paid
        );

        assert!(matches!(
            engine.apply_payment_update(Uuid::new_v4(), true, None),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn test_notification_webhook_updates_delivery_status() {
        let (mut engine, _clock) = engine_at(base_now());
        let user_id = member(&mut engine, "alice@example.test");
        engine
            .create_booking(
                user_id,
                "key-1234567890".to_string(),
                member_request(1, at(12, 14), "key-1234567890"),
            )
            .unwrap();
        let notification_id = engine.notifications_for(user_id)[0].id;

        engine
            .apply_notification_delivery(notification_id, None)
            .unwrap();
        assert!(engine
            .notifications_for(user_id)
            .iter()
            .any(|row| row.id == notification_id && row.status == DeliveryStatus::Delivered));

        engine
            .apply_notification_delivery(notification_id, Some(DeliveryStatus::Failed))
            .unwrap();
        assert!(engine
            .notifications_for(user_id)
            .iter()
            .any(|row| row.id == notification_id && row.status == DeliveryStatus::Failed));

        assert!(matches!(
            engine.apply_notification_delivery(Uuid::new_v4(), None),
            Err(EngineError::NotFound(_))
        ));
    }

    // -- accounts -----------------------------------------------------------

    #[test]
    fn test_sign_in_rejects_bad_credentials() {
        let (mut engine, _clock) = engine_at(base_now());
        member(&mut engine, "alice@example.test");

        let err = engine
            .sign_in(SignInRequest {
                email: "alice@example.test".to_string(),
                password: Masked("wrong-password".to_string()),
            })
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidCredentials));

        let err = engine
            .sign_in(SignInRequest {
                email: "nobody@example.test".to_string(),
                password: Masked("hunter2hunter2".to_string()),
            })
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidCredentials));

        assert!(engine
            .sign_in(SignInRequest {
                email: "alice@example.test".to_string(),
                password: Masked("hunter2hunter2".to_string()),
            })
            .is_ok());
    }

    #[test]
    fn test_sign_up_rejects_duplicate_email() {
        let (mut engine, _clock) = engine_at(base_now());
        member(&mut engine, "alice@example.test");

        let err = engine
            .sign_up(SignUpRequest {
                name: "Another Alice".to_string(),
                email: "alice@example.test".to_string(),
                phone: None,
                password: Masked("hunter2hunter2".to_string()),
            })
            .unwrap_err();
        assert!(matches!(err, EngineError::EmailExists));
    }

    #[test]
    fn test_authenticate_round_trips_token() {
        let (mut engine, _clock) = engine_at(base_now());
        let user_id = member(&mut engine, "alice@example.test");

        let token = issue_token(user_id);
        let user = engine.authenticate(&token).unwrap();
        assert_eq!(user.id, user_id);

        assert!(engine.authenticate("not-a-token").is_none());
        assert!(engine.authenticate(&issue_token(Uuid::new_v4())).is_none());
    }

    // -- demo / misc --------------------------------------------------------

    #[test]
    fn test_demo_reset_seeds_walkthrough_data() {
        let (mut engine, _clock) = engine_at(base_now());
        let (users, bookings) = engine.demo_reset().unwrap();
        assert_eq!((users, bookings), (3, 5));
        assert_eq!(engine.store.payments.len(), 5);

        let auth = engine
            .sign_in(SignInRequest {
                email: "demo.court@courtly.test".to_string(),
                password: Masked("DemoPass123!".to_string()),
            })
            .unwrap();
        assert_eq!(auth.user.wallet_balance, 120);
    }

    #[test]
    fn test_demo_disabled_hides_codes_and_blocks_reset() {
        let config = EngineConfig {
            demo: DemoSettings {
                enabled: false,
                password: "DemoPass123!".to_string(),
            },
            ..EngineConfig::default()
        };
        let (mut engine, _clock) = engine_with_config(config, base_now());

        assert!(matches!(
            engine.demo_reset(),
            Err(EngineError::DemoDisabled)
        ));
        let issued = engine.guest_initiate(guest_request(1, at(12, 14))).unwrap();
        assert!(issued.demo_code.is_none());
    }

    #[test]
    fn test_month_summary_rejects_invalid_month() {
        let (engine, _clock) = engine_at(base_now());
        let err = engine.month_summary(2025, 13).unwrap_err();
        assert!(err.to_string().contains("YYYY-MM"));
    }

    #[tokio::test]
    async fn test_concurrent_creates_have_one_winner() {
        let (mut engine, _clock) = engine_at(base_now());
        let alice = member(&mut engine, "alice@example.test");
        let bob = member(&mut engine, "bob@example.test");
        let shared = Arc::new(RwLock::new(engine));
        let start = at(12, 14);

        let mut tasks = Vec::new();
        for (user_id, key) in [(alice, "key-alice-0001"), (bob, "key-bob-000001")] {
            let shared = Arc::clone(&shared);
            tasks.push(tokio::spawn(async move {
                let mut guard = shared.write().await;
                guard.create_booking(
                    user_id,
                    key.to_string(),
                    CreateBookingRequest {
                        court_id: 1,
                        start,
                        end: start + Duration::hours(1),
                        idempotency_key: key.to_string(),
                        pay_immediately: None,
                        payment_method: None,
                    },
                )
            }));
        }

        let mut won = 0;
        let mut lost = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => won += 1,
                Err(EngineError::SlotConflict(_)) => lost += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!((won, lost), (1, 1));
    }
}
