pub mod model;
pub mod registry;

pub use model::{Bed, BedCounts, BedStatus};
pub use registry::BedRegistry;
