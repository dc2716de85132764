pub mod availability;
pub mod booking;
pub mod clock;
pub mod engine;
pub mod error;
pub mod notify;
pub mod payment;
pub mod persist;
pub mod seed;
pub mod store;
pub mod sweeper;
pub mod user;
pub mod verification;
pub mod wallet;

pub use booking::{Booking, BookingStatus};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{DemoSettings, Engine, LifecycleRules};
pub use error::{EngineError, EngineResult};
pub use payment::{Payment, PaymentMethod, PaymentStatus, RefundDestination, RefundStatus};
pub use persist::{PersistHandle, SnapshotStore};
pub use store::EngineStore;
pub use user::{PublicUser, User, UserRole};
pub use verification::{OtpPolicy, OtpPurpose, Verification, VerificationSubject};
pub use wallet::{WalletTransaction, WalletTransactionType};
