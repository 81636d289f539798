// Core algorithm exports
pub mod accumulator;
pub mod attribute;
pub mod filters;
pub mod forest;
pub mod matcher;
pub mod pca;
pub mod reducer;
pub mod search;
pub mod spatial;

pub use accumulator::{round3, PairingAccumulator};
pub use attribute::{AttributeDistance, AttributeDistanceEngine, ForestDistance, GowerDistance};
pub use filters::{ConstraintFilter, GeneralConstraints, NoConstraints};
pub use forest::UnsupervisedForest;
pub use matcher::{DonorMatcher, PairingResult};
pub use pca::{DimensionalityReducer, Pca, Projection};
pub use reducer::{AttributeReducer, AvailabilityReducer, Reduction};
pub use search::{DonorSearch, SearchOutcome, SearchParams};
pub use spatial::{distances_to_donors, haversine_distance, matrix_from_coordinates};
