// Venue capabilities and pool sources
// Reference swap math per pool kind and the file-backed pool provider
//
// Numan Thabit 2025 Nov

pub mod amm;
pub mod snapshot;
pub mod transmuter;

pub use amm::ConstantProductCurve;
pub use snapshot::{FileSnapshotProvider, SnapshotFile};
pub use transmuter::TransmuterCurve;
