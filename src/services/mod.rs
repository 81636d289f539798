// Service exports
pub mod loader;
pub mod writer;

pub use loader::{load_spatial, parse_spatial, spatial_from_settings, UnitLoader};
pub use writer::{write_pairs, write_summary};
