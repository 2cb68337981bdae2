//! Orchestrateur : ordre des étages, saut, propagation des artefacts
//!
//! La table de transitions est explicite : chaque étage a un prédicat de saut
//! (`SkipPolicy`) et un artefact de repli quand l'étage précédent est ignoré.

pub mod result;
pub mod stage;

use std::time::Instant;

use tracing::{error, info};

use crate::config::PipelineConfig;
use crate::report::PipelineRun;
use crate::stages::{AcquisitionStage, LoadStage, TransformStage};

pub use result::{Artifact, StageResult, StageStatus};
pub use stage::{SkipPolicy, Stage, StageKind};

/// États de l'orchestrateur
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Acquiring,
    Transforming,
    Loading,
    Done,
    Aborted,
}

impl From<StageKind> for RunState {
    fn from(kind: StageKind) -> Self {
        match kind {
            StageKind::Acquisition => Self::Acquiring,
            StageKind::Transform => Self::Transforming,
            StageKind::Load => Self::Loading,
        }
    }
}

/// Artefact conventionnel fourni à un étage quand le précédent est ignoré
pub fn fallback_artifact(kind: StageKind, config: &PipelineConfig) -> Option<Artifact> {
    match kind {
        StageKind::Acquisition => None,
        StageKind::Transform => Some(Artifact::file(config.acquisition.raw_path())),
        StageKind::Load => Some(Artifact::file(config.transform.output_path.clone())),
    }
}

/// Enchaîne les étages dans l'ordre Acquisition → Transform → Load
pub struct Orchestrator {
    stages: Vec<Box<dyn Stage>>,
}

impl Orchestrator {
    /// Chaque emplacement est typé par l'ordre ; `kind()` doit correspondre
    pub fn new(
        acquisition: Box<dyn Stage>,
        transform: Box<dyn Stage>,
        load: Box<dyn Stage>,
    ) -> Self {
        debug_assert_eq!(acquisition.kind(), StageKind::Acquisition);
        debug_assert_eq!(transform.kind(), StageKind::Transform);
        debug_assert_eq!(load.kind(), StageKind::Load);
        Self {
            stages: vec![acquisition, transform, load],
        }
    }

    /// Étages réels (HTTP, nettoyage, PostGIS)
    pub fn with_default_stages() -> Self {
        Self::new(
            Box::new(AcquisitionStage),
            Box::new(TransformStage),
            Box::new(LoadStage),
        )
    }

    /// Exécute le pipeline ; un échec interrompt les étages restants
    pub async fn run(&self, config: &PipelineConfig, skip: &SkipPolicy) -> PipelineRun {
        let mut recorder = PipelineRun::begin();
        let mut previous: Option<Artifact> = None;

        for stage in &self.stages {
            let kind = stage.kind();

            if skip.skips(kind) {
                info!(stage = %kind, "Skipping stage");
                recorder.record(StageResult::skipped(kind));
                previous = None;
                continue;
            }

            recorder.enter(RunState::from(kind));
            let input = previous.take().or_else(|| fallback_artifact(kind, config));
            let input_label = input
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "-".to_string());
            info!(stage = %kind, input = %input_label, "Starting stage");

            let started_at = Instant::now();
            let result = stage
                .execute(config, input.as_ref())
                .await
                .with_duration(started_at.elapsed());

            if let Some(err) = result.error() {
                error!(stage = %kind, "Stage failed: {}", err);
                recorder.enter(RunState::Aborted);
                recorder.record(result);
                break;
            }

            info!(
                stage = %kind,
                elapsed = ?result.duration(),
                "Stage completed"
            );
            previous = result.artifact().cloned();
            recorder.record(result);
        }

        let run = recorder.finalize();
        info!(status = ?run.status(), "{}", run.summary());
        run
    }
}
