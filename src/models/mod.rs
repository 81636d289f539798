// Model exports
pub mod domain;
pub mod matrix;
pub mod output;

pub use domain::{AttributeRow, AttributeTable, DonorCandidate, Pair, ResolutionTag, Unit, UnitCatalog, UnitTag};
pub use matrix::DistanceMatrix;
pub use output::{PairingSummary, PairingTable, PAIRING_HEADER};
