use chrono::Timelike;
use serde::{Deserialize, Serialize};

/// The daily operating window. Slots start on the hour; the last slot of
/// the day starts one hour before close.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperatingHours {
    pub opens_at: u32,
    pub closes_at: u32,
}

impl OperatingHours {
    pub fn new(opens_at: u32, closes_at: u32) -> Self {
        Self { opens_at, closes_at }
    }

    /// Every bookable start hour, in order.
    pub fn hours(&self) -> impl Iterator<Item = u32> {
        self.opens_at..self.closes_at
    }

    /// Whether a slot starting at this hour falls inside the window.
    pub fn contains_hour(&self, hour: u32) -> bool {
        hour >= self.opens_at && hour < self.closes_at
    }

    pub fn contains_start<Tz: chrono::TimeZone>(&self, start: &chrono::DateTime<Tz>) -> bool {
        self.contains_hour(start.hour())
    }

    /// Bookable slots per court per day.
    pub fn slots_per_day(&self) -> u32 {
        self.closes_at.saturating_sub(self.opens_at)
    }
}

impl Default for OperatingHours {
    fn default() -> Self {
        Self { opens_at: 12, closes_at: 22 }
    }
}
