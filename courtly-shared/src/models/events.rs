/// What happened, from the booking engine's point of view. Delivery
/// channels decide how to phrase and route it.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BookingConfirmation,
    PaymentConfirmation,
    CancellationConfirmation,
    RefundProcessed,
    Reminder24h,
}

/// Best-effort outcome reported by a single delivery channel.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Queued,
    Mocked,
    Delivered,
    Failed,
}
