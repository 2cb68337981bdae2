//! Modules d'export (GeoJSON, PostgreSQL)

pub mod geojson;
pub mod pool;
pub mod postgres;
#[cfg(feature = "reproject")]
pub mod reproject;
pub mod transaction;

pub use geojson::{compute_file_checksum, read_features, write_features_atomic, FeatureRecord};
