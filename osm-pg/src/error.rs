//! Erreurs du pipeline
//!
//! Les collaborateurs (HTTP, nettoyage, PostGIS) travaillent avec `anyhow` ;
//! la frontière d'un étage convertit la chaîne d'erreurs en `PipelineError`.

use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::StageKind;

/// Taxonomie des erreurs du pipeline
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// Fichier de configuration absent, illisible ou mal formé
    #[error("Failed to load configuration {}: {reason}", path.display())]
    ConfigLoad { path: PathBuf, reason: String },

    /// Configuration chargée mais incohérente
    #[error("Invalid configuration: {0}")]
    ConfigValidation(String),

    /// Artefact amont introuvable
    #[error("Missing input for {stage} stage: {} does not exist", path.display())]
    MissingInput { stage: StageKind, path: PathBuf },

    #[error("Acquisition failed: {message}")]
    Acquisition { message: String, causes: Vec<String> },

    #[error("Transform failed: {message}")]
    Transform { message: String, causes: Vec<String> },

    #[error("Load failed: {message}")]
    Load { message: String, causes: Vec<String> },
}

impl PipelineError {
    /// Convertit l'erreur d'un collaborateur en erreur d'étage
    pub fn from_stage(stage: StageKind, err: &anyhow::Error) -> Self {
        let message = err.to_string();
        let causes = err.chain().skip(1).map(|c| c.to_string()).collect();
        match stage {
            StageKind::Acquisition => Self::Acquisition { message, causes },
            StageKind::Transform => Self::Transform { message, causes },
            StageKind::Load => Self::Load { message, causes },
        }
    }

    /// Causes sous-jacentes (affichées en mode `--debug`)
    pub fn causes(&self) -> &[String] {
        match self {
            Self::Acquisition { causes, .. }
            | Self::Transform { causes, .. }
            | Self::Load { causes, .. } => causes,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_from_stage_keeps_chain() {
        let err: anyhow::Error = Err::<(), _>(std::io::Error::other("connection refused"))
            .context("Failed to connect to PostgreSQL")
            .unwrap_err();

        let pe = PipelineError::from_stage(StageKind::Load, &err);
        assert_eq!(pe.to_string(), "Load failed: Failed to connect to PostgreSQL");
        assert_eq!(pe.causes(), &["connection refused".to_string()]);
    }

    #[test]
    fn test_missing_input_message() {
        let pe = PipelineError::MissingInput {
            stage: StageKind::Transform,
            path: PathBuf::from("data/raw/osm_raw.geojson"),
        };
        assert!(pe.to_string().contains("transform"));
        assert!(pe.to_string().contains("data/raw/osm_raw.geojson"));
        assert!(pe.causes().is_empty());
    }
}
