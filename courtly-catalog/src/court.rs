use serde::{Deserialize, Serialize};

/// Static catalog entry for one bookable court. Seeded at startup and
/// immutable for the lifetime of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Court {
    pub id: i32,
    pub name: String,
    pub features: Vec<String>,
    /// Flat hourly rate in whole currency units.
    pub base_rate: i64,
}

/// The full set of courts the engine sells slots on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourtCatalog {
    courts: Vec<Court>,
}

impl CourtCatalog {
    pub fn new(courts: Vec<Court>) -> Self {
        Self { courts }
    }

    /// The four-court layout the venue runs with.
    pub fn standard(base_rate: i64) -> Self {
        let feature_sets: [&[&str]; 4] = [
            &["LED floodlights", "evening sessions"],
            &["pro surface", "shaded seating"],
            &["training wall", "ball machine"],
            &["premium turf", "individuals slot"],
        ];
        let courts = feature_sets
            .iter()
            .enumerate()
            .map(|(idx, features)| Court {
                id: idx as i32 + 1,
                name: format!("Court {}", idx + 1),
                features: features.iter().map(|f| f.to_string()).collect(),
                base_rate,
            })
            .collect();
        Self { courts }
    }

    pub fn get(&self, court_id: i32) -> Result<&Court, CatalogError> {
        self.courts
            .iter()
            .find(|c| c.id == court_id)
            .ok_or(CatalogError::UnknownCourt(court_id))
    }

    pub fn contains(&self, court_id: i32) -> bool {
        self.courts.iter().any(|c| c.id == court_id)
    }

    pub fn all(&self) -> &[Court] {
        &self.courts
    }

    pub fn len(&self) -> usize {
        self.courts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courts.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Unknown court: {0}")]
    UnknownCourt(i32),
}
