pub mod court;
pub mod pricing;
pub mod schedule;

pub use court::{CatalogError, Court, CourtCatalog};
pub use pricing::{PricePolicy, SpecialCell};
pub use schedule::OperatingHours;
