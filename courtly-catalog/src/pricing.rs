use serde::{Deserialize, Serialize};

/// A (court, hour) cell sold per-person instead of per-court.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpecialCell {
    pub court_id: i32,
    pub start_hour: u32,
}

/// Table-driven price policy. Exactly one cell is expected to be special
/// in the standard configuration, but the table form keeps the rule
/// testable and extensible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricePolicy {
    /// Whole-court hourly rate.
    pub flat_rate: i64,
    /// Per-person rate for special cells.
    pub individual_rate: i64,
    pub currency: String,
    pub special_cells: Vec<SpecialCell>,
}

impl PricePolicy {
    pub fn is_special(&self, court_id: i32, start_hour: u32) -> bool {
        self.special_cells
            .iter()
            .any(|cell| cell.court_id == court_id && cell.start_hour == start_hour)
    }

    pub fn price_for(&self, court_id: i32, start_hour: u32) -> i64 {
        if self.is_special(court_id, start_hour) {
            self.individual_rate
        } else {
            self.flat_rate
        }
    }
}

impl Default for PricePolicy {
    fn default() -> Self {
        Self {
            flat_rate: 700,
            individual_rate: 80,
            currency: "ZAR".to_string(),
            special_cells: vec![SpecialCell { court_id: 4, start_hour: 17 }],
        }
    }
}
