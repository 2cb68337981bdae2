//! Transform : lecture du brut, nettoyage, écriture du GeoJSON nettoyé

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use tracing::{info, warn};

use super::input_file;
use crate::clean::clean_features;
use crate::config::{PipelineConfig, TransformConfig};
use crate::error::PipelineError;
use crate::export::{compute_file_checksum, read_features, write_features_atomic};
use crate::pipeline::{Artifact, Stage, StageKind, StageResult};

/// EPSG supposé quand le fichier ne déclare pas de `crs` (RFC 7946)
const DEFAULT_SOURCE_EPSG: u32 = 4326;

/// Nettoie et reprojette les features brutes
pub struct TransformStage;

impl Stage for TransformStage {
    fn kind(&self) -> StageKind {
        StageKind::Transform
    }

    fn execute<'a>(
        &'a self,
        config: &'a PipelineConfig,
        input: Option<&'a Artifact>,
    ) -> BoxFuture<'a, StageResult> {
        Box::pin(async move {
            let path = match input_file(StageKind::Transform, input) {
                Ok(path) => path,
                Err(e) => return StageResult::failed(StageKind::Transform, e),
            };

            let transform = config.transform.clone();
            let outcome = tokio::task::spawn_blocking(move || transform_file(&path, &transform))
                .await
                .context("Transform task panicked")
                .and_then(|r| r);

            match outcome {
                Ok(artifact) => StageResult::succeeded(StageKind::Transform, artifact),
                Err(e) => StageResult::failed(
                    StageKind::Transform,
                    PipelineError::from_stage(StageKind::Transform, &e),
                ),
            }
        })
    }
}

fn transform_file(input: &Path, config: &TransformConfig) -> Result<Artifact> {
    let collection = read_features(input)?;
    let source_epsg = collection.epsg.unwrap_or(DEFAULT_SOURCE_EPSG);

    let output = clean_features(collection.features, source_epsg, config)?;
    let stats = &output.stats;
    if stats.reprojection_failures > 0 {
        warn!(
            failures = stats.reprojection_failures,
            "Features dropped after reprojection failure"
        );
    }
    info!(
        input = stats.input,
        output = stats.output,
        dropped_empty = stats.dropped_empty,
        dropped_invalid = stats.dropped_invalid,
        source = source_epsg,
        target = config.target_epsg,
        "Features cleaned"
    );

    let path: PathBuf = config.output_path.clone();
    write_features_atomic(&output.features, Some(config.target_epsg), &path)?;
    let checksum = compute_file_checksum(&path)?;

    Ok(Artifact::File {
        path,
        checksum: Some(checksum),
    })
}
