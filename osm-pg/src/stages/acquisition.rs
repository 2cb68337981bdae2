//! Acquisition : géocodage, requête Overpass, écriture du GeoJSON brut

use anyhow::{bail, Context, Result};
use futures::future::BoxFuture;
use tracing::info;

use crate::config::{AcquisitionConfig, PipelineConfig};
use crate::error::PipelineError;
use crate::export::{compute_file_checksum, write_features_atomic, FeatureRecord};
use crate::fetch::overpass::fetch_features;
use crate::fetch::{nominatim, HttpClient};
use crate::pipeline::{Artifact, Stage, StageKind, StageResult};

/// Télécharge les features OSM du lieu configuré
pub struct AcquisitionStage;

impl Stage for AcquisitionStage {
    fn kind(&self) -> StageKind {
        StageKind::Acquisition
    }

    fn execute<'a>(
        &'a self,
        config: &'a PipelineConfig,
        _input: Option<&'a Artifact>,
    ) -> BoxFuture<'a, StageResult> {
        Box::pin(async move {
            match acquire(&config.acquisition).await {
                Ok(artifact) => StageResult::succeeded(StageKind::Acquisition, artifact),
                Err(e) => StageResult::failed(
                    StageKind::Acquisition,
                    PipelineError::from_stage(StageKind::Acquisition, &e),
                ),
            }
        })
    }
}

async fn acquire(config: &AcquisitionConfig) -> Result<Artifact> {
    let http = HttpClient::new(config.timeout_secs, config.max_retries)?;

    let area = nominatim::geocode(&http, &config.nominatim_url, &config.location_name).await?;
    let result = fetch_features(
        &http,
        &config.overpass_url,
        &area,
        &config.tags,
        config.timeout_secs,
    )
    .await?;

    if result.features.is_empty() {
        bail!("No features found for '{}'", config.location_name);
    }

    let features: Vec<FeatureRecord> = result.features.into_iter().map(Into::into).collect();
    let path = config.raw_path();
    let count = features.len();

    let write_path = path.clone();
    let checksum = tokio::task::spawn_blocking(move || -> Result<String> {
        write_features_atomic(&features, None, &write_path)?;
        compute_file_checksum(&write_path)
    })
    .await
    .context("Raw feature writer panicked")??;

    info!(
        location = %config.location_name,
        features = count,
        path = %path.display(),
        "Raw features written"
    );

    Ok(Artifact::File {
        path,
        checksum: Some(checksum),
    })
}
