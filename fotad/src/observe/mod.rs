//! Device-reported resource values

pub mod snapshot;
pub mod store;

pub use snapshot::ResourceSnapshot;
pub use store::{ObservationProvider, ObservationStore};
