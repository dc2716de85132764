use chrono::{DateTime, FixedOffset};
use courtly_shared::models::events::{DeliveryStatus, NotificationKind};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Whatsapp,
    Telegram,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Whatsapp => "whatsapp",
            Channel::Telegram => "telegram",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "whatsapp" => Some(Self::Whatsapp),
            "telegram" => Some(Self::Telegram),
            _ => None,
        }
    }
}

/// One stored delivery row. Fan-out is per channel: a booking
/// confirmation over whatsapp and telegram lands as two rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub booking_id: Option<Uuid>,
    pub kind: NotificationKind,
    pub channel: Channel,
    pub recipient: String,
    pub message: String,
    pub status: DeliveryStatus,
    pub created_at: DateTime<FixedOffset>,
}

/// Outbound transport. Implementations must not block the engine on
/// network calls; the bundled sink only logs.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, message: &NotificationMessage) -> DeliveryStatus;
}

/// Default sink: structured log lines instead of real provider calls.
#[derive(Debug, Default)]
pub struct MockChannelSink;

impl NotificationSink for MockChannelSink {
    fn deliver(&self, message: &NotificationMessage) -> DeliveryStatus {
        info!(
            channel = message.channel.as_str(),
            recipient = %message.recipient,
            kind = ?message.kind,
            "mock notification dispatched"
        );
        DeliveryStatus::Mocked
    }
}

/// Build, deliver, and return the per-channel rows for one logical
/// notification. The caller appends the rows to its store.
pub fn dispatch(
    sink: &dyn NotificationSink,
    channels: &[Channel],
    user_id: Option<Uuid>,
    booking_id: Option<Uuid>,
    kind: NotificationKind,
    recipient: &str,
    message: &str,
    now: DateTime<FixedOffset>,
) -> Vec<NotificationMessage> {
    channels
        .iter()
        .map(|channel| {
            let mut row = NotificationMessage {
                id: Uuid::new_v4(),
                user_id,
                booking_id,
                kind,
                channel: *channel,
                recipient: recipient.to_string(),
                message: message.to_string(),
                status: DeliveryStatus::Queued,
                created_at: now,
            };
            row.status = sink.deliver(&row);
            row
        })
        .collect()
}
