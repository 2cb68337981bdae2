//! # overpass
//!
//! Construction de requêtes Overpass QL et parsing des réponses JSON Overpass
//! en features `geo`.
//!
//! ## Features
//!
//! - Filtres de tags déclaratifs (`true`, valeur exacte, liste de valeurs)
//! - Zones de recherche par zone Overpass (way/relation) ou par emprise
//! - Ways fermés convertis en polygones selon les tags (`building`, `landuse`, ...)
//! - Reconstruction des relations multipolygones (anneaux découpés, trous)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use overpass::{build_query, parse, SearchArea, TagFilters};
//!
//! let filters: TagFilters = serde_json::from_str(r#"{"building": true}"#)?;
//! let query = build_query(&SearchArea::Area(3_600_012_345), &filters, 300)?;
//! // ... envoi de la requête ...
//! let result = parse(&body, &filters)?;
//! println!("{} features", result.features.len());
//! ```

pub mod assemble;
pub mod error;
pub mod parser;
pub mod query;
pub mod types;

pub use error::OverpassError;
pub use parser::parse;
pub use query::{build_query, matches_any, SearchArea, TagFilters, TagValue};
pub use types::{ElementType, Feature, ParseResult};
