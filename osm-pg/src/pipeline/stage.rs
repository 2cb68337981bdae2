//! Contrat commun des étages

use std::fmt;

use futures::future::BoxFuture;

use super::result::{Artifact, StageResult};
use crate::config::PipelineConfig;

/// Les trois étages, dans leur ordre d'exécution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StageKind {
    Acquisition,
    Transform,
    Load,
}

impl StageKind {
    /// Ordre fixe Acquisition → Transform → Load
    pub const ALL: [StageKind; 3] = [Self::Acquisition, Self::Transform, Self::Load];

    pub fn name(self) -> &'static str {
        match self {
            Self::Acquisition => "acquisition",
            Self::Transform => "transform",
            Self::Load => "load",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Étage du pipeline
///
/// Un étage vérifie d'abord ses entrées, ne laisse jamais d'artefact partiel
/// et ne rapporte son issue que via le `StageResult` retourné.
pub trait Stage: Send + Sync {
    fn kind(&self) -> StageKind;

    fn execute<'a>(
        &'a self,
        config: &'a PipelineConfig,
        input: Option<&'a Artifact>,
    ) -> BoxFuture<'a, StageResult>;
}

/// Étages ignorés pour un run (dérivé des flags CLI)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipPolicy {
    pub skip_download: bool,
    pub skip_clean: bool,
    pub skip_db: bool,
}

impl SkipPolicy {
    pub fn skips(&self, stage: StageKind) -> bool {
        match stage {
            StageKind::Acquisition => self.skip_download,
            StageKind::Transform => self.skip_clean,
            StageKind::Load => self.skip_db,
        }
    }
}
