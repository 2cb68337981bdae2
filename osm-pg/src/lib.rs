//! # osm-pg
//!
//! Pipeline OpenStreetMap → PostGIS en trois étages.
//!
//! ## Features
//!
//! - Géocodage Nominatim et requêtes Overpass avec relances
//! - Nettoyage des géométries, reprojection (pure Rust ou PROJ)
//! - Standardisation des noms de colonnes
//! - Chargement COPY transactionnel dans PostgreSQL/PostGIS
//!
//! ## Usage CLI
//!
//! ```bash
//! # Pipeline complet
//! osm-pg --config settings.json --location "Yaba, Nigeria"
//!
//! # Recharger le fichier nettoyé existant dans une autre table
//! osm-pg --skip-download --skip-clean --table yaba_buildings
//! ```

pub mod clean;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod fetch;
pub mod logging;
pub mod pipeline;
pub mod report;
pub mod reproject_lite;
pub mod stages;

pub use config::{resolve, ConfigOverrides, PipelineConfig};
pub use error::PipelineError;
pub use export::pool::{create_pool, DatabaseConfig};
pub use pipeline::{Orchestrator, SkipPolicy, StageKind};
pub use report::{PipelineRun, RunStatus};
