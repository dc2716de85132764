use crate::clock::Clock;
use crate::error::{EngineError, EngineResult};
use chrono::{DateTime, FixedOffset};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Operational limits for verification codes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpPolicy {
    pub ttl_minutes: i64,
    pub resend_cooldown_seconds: i64,
    pub max_attempts: u32,
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self {
            ttl_minutes: 10,
            resend_cooldown_seconds: 45,
            max_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    ConfirmBooking,
    CancelBooking,
    Lookup,
}

/// What a code is bound to. Booking flows key off the booking id; the
/// lookup flow has no booking yet, so it keys off the phone number.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "key", rename_all = "snake_case")]
pub enum VerificationSubject {
    Booking(Uuid),
    Phone(String),
}

/// One issued code. Only the salted digest is stored; the clear code
/// leaves the engine exactly once, through the notification channel
/// (and the demo echo when demo mode is on).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verification {
    pub id: Uuid,
    pub subject: VerificationSubject,
    pub purpose: OtpPurpose,
    pub salt: String,
    pub code_digest: String,
    pub attempts: u32,
    pub issued_at: DateTime<FixedOffset>,
    pub expires_at: DateTime<FixedOffset>,
    pub consumed: bool,
}

pub fn random_code() -> String {
    let code: u32 = rand::thread_rng().gen_range(100_000..1_000_000);
    code.to_string()
}

pub fn random_salt() -> String {
    let bytes: [u8; 8] = rand::thread_rng().gen();
    hex::encode(bytes)
}

pub fn salted_digest(salt: &str, code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

impl Verification {
    /// Issue a fresh record for the given subject. Returns the record and
    /// the clear code for delivery.
    pub fn issue(
        subject: VerificationSubject,
        purpose: OtpPurpose,
        policy: &OtpPolicy,
        clock: &dyn Clock,
    ) -> (Self, String) {
        let code = random_code();
        let salt = random_salt();
        let now = clock.now();
        let record = Self {
            id: Uuid::new_v4(),
            subject,
            purpose,
            code_digest: salted_digest(&salt, &code),
            salt,
            attempts: 0,
            issued_at: now,
            expires_at: now + chrono::Duration::minutes(policy.ttl_minutes),
            consumed: false,
        };
        (record, code)
    }

    pub fn is_expired(&self, now: DateTime<FixedOffset>) -> bool {
        now >= self.expires_at
    }

    /// Whether a fresh code may be issued yet for the same subject.
    pub fn can_resend(&self, now: DateTime<FixedOffset>, policy: &OtpPolicy) -> bool {
        now - self.issued_at >= chrono::Duration::seconds(policy.resend_cooldown_seconds)
    }

    /// Validate a submitted code. Checks run in a fixed order so the
    /// caller always gets the most specific failure: expiry before the
    /// attempt cap, the cap before the digest comparison. A mismatch
    /// burns one attempt; expiry and the cap do not.
    pub fn check(
        &mut self,
        code: &str,
        now: DateTime<FixedOffset>,
        policy: &OtpPolicy,
    ) -> EngineResult<()> {
        if self.is_expired(now) {
            return Err(EngineError::OtpExpired);
        }
        if self.attempts >= policy.max_attempts {
            return Err(EngineError::OtpMaxAttempts);
        }
        if salted_digest(&self.salt, code) != self.code_digest {
            self.attempts += 1;
            return Err(EngineError::OtpInvalid);
        }
        self.consumed = true;
        Ok(())
    }
}
