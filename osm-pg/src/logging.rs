//! Initialisation du logging : console (stderr) + fichier `pipeline.log`

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Fichier de log écrit dans le répertoire courant
pub const LOG_FILE: &str = "pipeline.log";

/// WARN par défaut, INFO avec `--verbose`, DEBUG avec `--debug`
pub fn level_for(verbose: bool, debug: bool) -> Level {
    match (debug, verbose) {
        (true, _) => Level::DEBUG,
        (_, true) => Level::INFO,
        _ => Level::WARN,
    }
}

// `RUST_LOG` s'ajoute au niveau choisi
fn filter(level: Level) -> EnvFilter {
    EnvFilter::from_default_env().add_directive(level.into())
}

/// Construit le subscriber ; le guard doit vivre jusqu'à la fin du programme
///
/// Si le fichier ne peut pas être ouvert, seule la console est utilisée.
pub fn build_subscriber(
    level: Level,
    log_path: &Path,
) -> (impl Subscriber + Send + Sync + 'static, Option<WorkerGuard>) {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_filter(filter(level));

    let (file_layer, guard) = match open_log_file(log_path) {
        Ok(appender) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_filter(filter(level));
            (Some(layer), Some(guard))
        }
        Err(e) => {
            eprintln!("Warning: file logging disabled: {:#}", e);
            (None, None)
        }
    };

    let subscriber = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer);

    (subscriber, guard)
}

fn open_log_file(log_path: &Path) -> Result<RollingFileAppender> {
    let dir = log_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = log_path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid log file path {}", log_path.display()))?;

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(dir)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))
}

/// Installe le subscriber global
pub fn init(verbose: bool, debug: bool, log_path: &Path) -> Result<Option<WorkerGuard>> {
    let (subscriber, guard) = build_subscriber(level_for(verbose, debug), log_path);
    subscriber
        .try_init()
        .context("Failed to install tracing subscriber")?;
    Ok(guard)
}
