use courtly_catalog::CatalogError;

pub type EngineResult<T> = Result<T, EngineError>;

/// Every failure the engine can hand back to a caller. Each variant maps
/// to a stable machine-readable kind so the transport layer can translate
/// without string matching. All of these are recoverable by the caller;
/// none poison the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{0}")]
    Validation(String),

    #[error("Cannot book past slots.")]
    InvalidTime,

    #[error("{0}")]
    SlotConflict(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("Booking hold expired. Please restart booking.")]
    HoldExpired,

    #[error("Verification code not found.")]
    OtpNotFound,

    #[error("Verification code expired.")]
    OtpExpired,

    #[error("Too many attempts.")]
    OtpMaxAttempts,

    #[error("Incorrect verification code.")]
    OtpInvalid,

    #[error("Please wait before requesting another code.")]
    OtpRateLimit,

    #[error("Cancellation is only allowed more than 24h before start.")]
    CancellationWindowClosed,

    #[error("Individual slot requires immediate payment upon booking.")]
    PaymentRequired,

    #[error("This booking does not require payment.")]
    NoPaymentDue,

    #[error("Insufficient wallet balance for immediate payment.")]
    InsufficientWallet,

    #[error("{0}")]
    NotFound(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Email or password is incorrect")]
    InvalidCredentials,

    #[error("Email already registered")]
    EmailExists,

    #[error("Admin access required")]
    Forbidden,

    #[error("Demo mode is disabled.")]
    DemoDisabled,
}

impl EngineError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidTime => "INVALID_TIME",
            Self::SlotConflict(_) => "SLOT_CONFLICT",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::HoldExpired => "HOLD_EXPIRED",
            Self::OtpNotFound => "OTP_NOT_FOUND",
            Self::OtpExpired => "OTP_EXPIRED",
            Self::OtpMaxAttempts => "OTP_MAX_ATTEMPTS",
            Self::OtpInvalid => "OTP_INVALID",
            Self::OtpRateLimit => "OTP_RATE_LIMIT",
            Self::CancellationWindowClosed => "CANCELLATION_WINDOW_CLOSED",
            Self::PaymentRequired => "PAYMENT_REQUIRED",
            Self::NoPaymentDue => "NO_PAYMENT_REQUIRED",
            Self::InsufficientWallet => "INSUFFICIENT_WALLET",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::EmailExists => "EMAIL_EXISTS",
            Self::Forbidden => "FORBIDDEN",
            Self::DemoDisabled => "DEMO_DISABLED",
        }
    }
}

impl From<CatalogError> for EngineError {
    fn from(err: CatalogError) -> Self {
        Self::Validation(err.to_string())
    }
}
