pub mod roster;

pub use roster::{PerformanceStats, ValidatorRecord, ValidatorRoster};
