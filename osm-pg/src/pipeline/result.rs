//! Résultat d'un étage et artefacts échangés entre étages

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::stage::StageKind;
use crate::error::PipelineError;

/// Sortie durable d'un étage, consommée par le suivant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    /// Fichier GeoJSON (checksum blake3 si calculé)
    File {
        path: PathBuf,
        checksum: Option<String>,
    },
    /// Table chargée dans PostGIS
    Table {
        schema: String,
        table: String,
        rows: u64,
    },
}

impl Artifact {
    /// Artefact fichier dont on ne connaît que le chemin
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File {
            path: path.into(),
            checksum: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File { path, .. } => Some(path),
            Self::Table { .. } => None,
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File { path, checksum } => {
                write!(f, "{}", path.display())?;
                if let Some(checksum) = checksum {
                    write!(f, " (blake3 {})", &checksum[..checksum.len().min(12)])?;
                }
                Ok(())
            }
            Self::Table {
                schema,
                table,
                rows,
            } => write!(f, "{}.{} ({} rows)", schema, table, rows),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    Succeeded,
    Skipped,
    Failed,
}

/// Issue d'un étage
///
/// Construit uniquement via `succeeded`, `skipped` ou `failed` :
/// un résultat en échec ne porte jamais d'artefact.
#[derive(Debug, Clone)]
pub struct StageResult {
    stage: StageKind,
    status: StageStatus,
    error: Option<PipelineError>,
    artifact: Option<Artifact>,
    duration: Duration,
}

impl StageResult {
    pub fn succeeded(stage: StageKind, artifact: Artifact) -> Self {
        Self {
            stage,
            status: StageStatus::Succeeded,
            error: None,
            artifact: Some(artifact),
            duration: Duration::ZERO,
        }
    }

    pub fn skipped(stage: StageKind) -> Self {
        Self {
            stage,
            status: StageStatus::Skipped,
            error: None,
            artifact: None,
            duration: Duration::ZERO,
        }
    }

    pub fn failed(stage: StageKind, error: PipelineError) -> Self {
        Self {
            stage,
            status: StageStatus::Failed,
            error: Some(error),
            artifact: None,
            duration: Duration::ZERO,
        }
    }

    /// Durée mesurée par l'orchestrateur
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn stage(&self) -> StageKind {
        self.stage
    }

    pub fn status(&self) -> StageStatus {
        self.status
    }

    pub fn error(&self) -> Option<&PipelineError> {
        self.error.as_ref()
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn is_failed(&self) -> bool {
        self.status == StageStatus::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_has_no_artifact() {
        let result = StageResult::failed(
            StageKind::Load,
            PipelineError::ConfigValidation("x".into()),
        );
        assert!(result.is_failed());
        assert!(result.artifact().is_none());
        assert!(result.error().is_some());
    }

    #[test]
    fn test_artifact_display() {
        let file = Artifact::File {
            path: PathBuf::from("data/raw/osm_raw.geojson"),
            checksum: Some("af1349b9f5f9a1a6a0404dea36dcc949".into()),
        };
        assert_eq!(
            file.to_string(),
            "data/raw/osm_raw.geojson (blake3 af1349b9f5f9)"
        );

        let table = Artifact::Table {
            schema: "public".into(),
            table: "osm_features".into(),
            rows: 42,
        };
        assert_eq!(table.to_string(), "public.osm_features (42 rows)");
        assert!(table.path().is_none());
    }
}
