//! Arguments de la ligne de commande
//!
//! Uniquement des options : pas de sous-commande. Les options de saut
//! forment la `SkipPolicy`, les autres surchargent la configuration.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{ConfigOverrides, DEFAULT_CONFIG_PATH};
use crate::pipeline::SkipPolicy;

/// Télécharger les données OpenStreetMap d'un lieu, les nettoyer et les charger dans PostGIS
#[derive(Parser, Debug)]
#[command(name = "osm-pg")]
#[command(author, version)]
#[command(about = "Download OpenStreetMap features for a place, clean them and load them into PostGIS")]
pub struct Cli {
    /// Path to the JSON settings file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Location to download (overrides osm.location_name)
    #[arg(long)]
    pub location: Option<String>,

    /// Target table (overrides postgis.table_name)
    #[arg(long)]
    pub table: Option<String>,

    /// Skip the download stage and reuse the raw file
    #[arg(long)]
    pub skip_download: bool,

    /// Skip the cleaning stage and load the cleaned file as is
    #[arg(long)]
    pub skip_clean: bool,

    /// Skip loading into PostGIS
    #[arg(long)]
    pub skip_db: bool,

    /// Log stage progress (INFO)
    #[arg(short, long)]
    pub verbose: bool,

    /// Log everything (DEBUG) and print full error chains
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    pub fn skip_policy(&self) -> SkipPolicy {
        SkipPolicy {
            skip_download: self.skip_download,
            skip_clean: self.skip_clean,
            skip_db: self.skip_db,
        }
    }

    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            location: self.location.clone(),
            table: self.table.clone(),
            verbose: self.verbose,
            debug: self.debug,
        }
    }
}
