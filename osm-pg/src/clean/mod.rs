//! Nettoyage des features : géométries vides, réparation, reprojection,
//! arrondi puis standardisation des colonnes
//!
//! Le travail par feature est parallélisé avec rayon ; chaque thread possède
//! son propre reprojecteur (PROJ n'est pas partageable entre threads).

pub mod columns;
pub mod geometry;

use anyhow::Result;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::config::TransformConfig;
use crate::export::FeatureRecord;
use crate::reproject_lite::SmartReprojector;

pub use columns::ColumnStandardizer;
pub use geometry::{repair_geometry, round_geometry_coords};

/// Bilan du nettoyage
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanStats {
    pub input: usize,
    pub dropped_empty: usize,
    pub dropped_invalid: usize,
    pub reprojection_failures: usize,
    pub output: usize,
}

/// Features nettoyées et bilan
#[derive(Debug)]
pub struct CleanOutput {
    pub features: Vec<FeatureRecord>,
    pub stats: CleanStats,
}

enum Outcome {
    Kept(FeatureRecord),
    Empty,
    Invalid,
    ReprojectionFailed,
}

/// Nettoie les features lues en `source_epsg` vers la cible de `config`
pub fn clean_features(
    features: Vec<FeatureRecord>,
    source_epsg: u32,
    config: &TransformConfig,
) -> Result<CleanOutput> {
    let target_epsg = config.target_epsg;
    let precision = config.precision;

    // Valide la paire de CRS avant de lancer les threads
    let method = SmartReprojector::new(source_epsg, target_epsg)?.description();
    debug!(
        source = source_epsg,
        target = target_epsg,
        method,
        "Reprojection"
    );

    let input = features.len();
    let outcomes: Vec<Outcome> = features
        .into_par_iter()
        .map_init(
            || SmartReprojector::new(source_epsg, target_epsg),
            |reprojector, feature| clean_one(feature, reprojector, precision),
        )
        .collect();

    let mut stats = CleanStats {
        input,
        ..Default::default()
    };
    let mut kept = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        match outcome {
            Outcome::Kept(feature) => kept.push(feature),
            Outcome::Empty => stats.dropped_empty += 1,
            Outcome::Invalid => stats.dropped_invalid += 1,
            Outcome::ReprojectionFailed => stats.reprojection_failures += 1,
        }
    }

    if config.standardize_columns {
        let standardizer = ColumnStandardizer::new()?;
        let mapping = standardizer.build_mapping(
            kept.iter()
                .flat_map(|f| f.properties.keys().map(String::as_str)),
        );
        kept = kept
            .into_par_iter()
            .map(|mut feature| {
                let properties = std::mem::take(&mut feature.properties);
                feature.properties = standardizer.apply(properties, &mapping);
                feature
            })
            .collect();
    }

    stats.output = kept.len();
    Ok(CleanOutput {
        features: kept,
        stats,
    })
}

fn clean_one(
    feature: FeatureRecord,
    reprojector: &Result<SmartReprojector>,
    precision: u8,
) -> Outcome {
    let Some(geom) = feature
        .geometry
        .as_ref()
        .filter(|g| !geometry::is_empty(g))
    else {
        return Outcome::Empty;
    };

    let Some(repaired) = repair_geometry(geom) else {
        debug!(id = ?feature.id, "Dropping degenerate geometry");
        return Outcome::Invalid;
    };

    let projected = match reprojector {
        Ok(r) => r.transform_geometry(&repaired),
        Err(e) => Err(anyhow::anyhow!("{}", e)),
    };
    let projected = match projected {
        Ok(g) => g,
        Err(e) => {
            warn!(id = ?feature.id, "Reprojection failed: {}", e);
            return Outcome::ReprojectionFailed;
        }
    };

    Outcome::Kept(FeatureRecord {
        geometry: Some(round_geometry_coords(&projected, precision)),
        ..feature
    })
}
