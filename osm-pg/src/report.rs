//! Rapport d'exécution du pipeline
//!
//! Un `PipelineRun` est construit par l'orchestrateur via un `RunRecorder`,
//! puis figé par `finalize()` : il n'expose ensuite que des accesseurs.

use std::time::{Duration, Instant};

use crate::pipeline::{RunState, StageResult, StageStatus};

/// Statut global d'un run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Tous les étages tentés ont réussi ou ont été ignorés
    Succeeded,
    /// Au moins un étage a échoué
    Failed,
}

/// Run terminé (immuable)
#[derive(Debug, Clone)]
pub struct PipelineRun {
    results: Vec<StageResult>,
    state: RunState,
    status: RunStatus,
    duration: Duration,
}

/// Accumulateur pendant l'exécution
#[derive(Debug)]
pub struct RunRecorder {
    results: Vec<StageResult>,
    state: RunState,
    started_at: Instant,
}

impl PipelineRun {
    /// Démarre l'enregistrement d'un run
    pub fn begin() -> RunRecorder {
        RunRecorder {
            results: Vec::new(),
            state: RunState::NotStarted,
            started_at: Instant::now(),
        }
    }

    /// Résultats dans l'ordre d'exécution
    pub fn results(&self) -> &[StageResult] {
        &self.results
    }

    /// État final (`Done` ou `Aborted`)
    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    /// Premier étage en échec
    pub fn first_failure(&self) -> Option<&StageResult> {
        self.results.iter().find(|r| r.is_failed())
    }

    /// Affiche le rapport sur la console
    pub fn display(&self, debug: bool) {
        println!("\n{}", "=".repeat(60));
        println!("PIPELINE REPORT");
        println!("{}", "=".repeat(60));

        for result in &self.results {
            let status = match result.status() {
                StageStatus::Succeeded => "succeeded",
                StageStatus::Skipped => "skipped",
                StageStatus::Failed => "FAILED",
            };
            println!(
                "  {:<12} {:<10} {:>8.2}s",
                result.stage().name(),
                status,
                result.duration().as_secs_f64()
            );
            if let Some(artifact) = result.artifact() {
                println!("      -> {}", artifact);
            }
            if let Some(error) = result.error() {
                println!("      error: {}", error);
                if debug {
                    for cause in error.causes() {
                        println!("      caused by: {}", cause);
                    }
                }
            }
        }

        println!("\nStatus: {:?} ({:.2}s)", self.status, self.duration.as_secs_f64());
        if let Some(summary) = self.failure_summary() {
            println!("{}", summary);
        }
        println!("{}", "=".repeat(60));
    }

    /// Résumé d'une ligne de l'échec, s'il y en a un
    pub fn failure_summary(&self) -> Option<String> {
        let failed = self.first_failure()?;
        let cause = failed
            .error()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string());
        Some(format!("Pipeline failed at {} stage: {}", failed.stage(), cause))
    }

    /// Affichage compact
    pub fn summary(&self) -> String {
        let count = |status: StageStatus| {
            self.results
                .iter()
                .filter(|r| r.status() == status)
                .count()
        };
        format!(
            "{:?}: {} succeeded, {} skipped, {} failed",
            self.status,
            count(StageStatus::Succeeded),
            count(StageStatus::Skipped),
            count(StageStatus::Failed)
        )
    }
}

impl RunRecorder {
    pub fn enter(&mut self, state: RunState) {
        self.state = state;
    }

    pub fn record(&mut self, result: StageResult) {
        self.results.push(result);
    }

    /// Fige le run ; l'état terminal dépend de la présence d'un échec
    pub fn finalize(self) -> PipelineRun {
        let failed = self.state == RunState::Aborted
            || self.results.iter().any(StageResult::is_failed);
        PipelineRun {
            state: if failed {
                RunState::Aborted
            } else {
                RunState::Done
            },
            status: if failed {
                RunStatus::Failed
            } else {
                RunStatus::Succeeded
            },
            duration: self.started_at.elapsed(),
            results: self.results,
        }
    }
}
