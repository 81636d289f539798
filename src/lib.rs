//! Donor Pair - distance based donor-receiver pairing of catchments
//!
//! Every receiver (a catchment to be parameterised) is paired with the donor
//! most similar to it in physical attributes within an expanding spatial
//! neighbourhood. Receivers that no attribute round can pair fall back to the
//! spatially nearest eligible donor.

pub mod config;
pub mod core;
pub mod error;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use config::{DistanceMethod, PairingConfig, Settings};
pub use core::{DonorMatcher, PairingResult};
pub use error::{PairingError, Result};
pub use models::{DistanceMatrix, Pair, PairingSummary, PairingTable, ResolutionTag, UnitCatalog};
