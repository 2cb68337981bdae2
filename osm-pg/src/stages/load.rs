//! Load : chargement du GeoJSON nettoyé dans PostGIS

use std::path::Path;

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use tracing::info;

use super::input_file;
use crate::config::{LoadConfig, PipelineConfig};
use crate::error::PipelineError;
use crate::export::postgres::load_features;
use crate::export::read_features;
use crate::pipeline::{Artifact, Stage, StageKind, StageResult};

/// Charge les features nettoyées dans la table configurée
pub struct LoadStage;

impl Stage for LoadStage {
    fn kind(&self) -> StageKind {
        StageKind::Load
    }

    fn execute<'a>(
        &'a self,
        config: &'a PipelineConfig,
        input: Option<&'a Artifact>,
    ) -> BoxFuture<'a, StageResult> {
        Box::pin(async move {
            let path = match input_file(StageKind::Load, input) {
                Ok(path) => path,
                Err(e) => return StageResult::failed(StageKind::Load, e),
            };

            match load(&path, &config.load, config.transform.target_epsg).await {
                Ok(artifact) => StageResult::succeeded(StageKind::Load, artifact),
                Err(e) => StageResult::failed(
                    StageKind::Load,
                    PipelineError::from_stage(StageKind::Load, &e),
                ),
            }
        })
    }
}

async fn load(path: &Path, config: &LoadConfig, default_srid: u32) -> Result<Artifact> {
    let read_path = path.to_path_buf();
    let collection = tokio::task::spawn_blocking(move || read_features(&read_path))
        .await
        .context("Feature reader panicked")??;

    // Le fichier fait foi ; sinon on suppose la cible du nettoyage
    let srid = collection.epsg.unwrap_or(default_srid);
    info!(
        path = %path.display(),
        features = collection.features.len(),
        srid,
        "Loading features"
    );

    let report = load_features(config, &collection.features, srid).await?;

    Ok(Artifact::Table {
        schema: config.schema.clone(),
        table: config.table_name.clone(),
        rows: report.rows,
    })
}
