//! Point d'entrée CLI pour osm-pg

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;

use osm_pg::cli::Cli;
use osm_pg::config;
use osm_pg::logging;
use osm_pg::pipeline::Orchestrator;

// Charger .env au démarrage
fn load_env() {
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Charger .env avant tout (variables PG*)
    load_env();

    let cli = Cli::parse();
    // Garder le guard : il vide le fichier de log à la sortie
    let _log_guard = match logging::init(cli.verbose, cli.debug, Path::new(logging::LOG_FILE)) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Warning: {:#}", e);
            None
        }
    };

    let config = match config::resolve(&cli.config, &cli.overrides()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let run = Orchestrator::with_default_stages()
        .run(&config, &cli.skip_policy())
        .await;
    run.display(config.debug);

    if run.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
