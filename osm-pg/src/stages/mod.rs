//! Étages réels du pipeline
//!
//! Chaque étage délègue à son collaborateur (`fetch`, `clean`, `export`) et
//! convertit l'erreur `anyhow` en `PipelineError` à sa frontière.

mod acquisition;
mod load;
mod transform;

use std::path::PathBuf;

pub use acquisition::AcquisitionStage;
pub use load::LoadStage;
pub use transform::TransformStage;

use crate::error::PipelineError;
use crate::pipeline::{Artifact, StageKind};

/// Fichier d'entrée d'un étage ; `MissingInput` s'il n'existe pas
pub(crate) fn input_file(
    stage: StageKind,
    input: Option<&Artifact>,
) -> Result<PathBuf, PipelineError> {
    let Some(path) = input.and_then(Artifact::path) else {
        return Err(PipelineError::MissingInput {
            stage,
            path: PathBuf::new(),
        });
    };
    if !path.is_file() {
        return Err(PipelineError::MissingInput {
            stage,
            path: path.to_path_buf(),
        });
    }
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_file() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("raw.geojson");
        std::fs::write(&present, "{}").unwrap();

        let ok = input_file(StageKind::Transform, Some(&Artifact::file(&present))).unwrap();
        assert_eq!(ok, present);

        let missing = dir.path().join("nope.geojson");
        let err = input_file(StageKind::Load, Some(&Artifact::file(&missing))).unwrap_err();
        assert_eq!(
            err,
            PipelineError::MissingInput {
                stage: StageKind::Load,
                path: missing
            }
        );

        let table = Artifact::Table {
            schema: "public".into(),
            table: "t".into(),
            rows: 1,
        };
        assert!(matches!(
            input_file(StageKind::Load, Some(&table)),
            Err(PipelineError::MissingInput { .. })
        ));
    }
}
