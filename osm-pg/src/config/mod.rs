//! Résolution de la configuration
//!
//! Fichier JSON (`osm`, `cleaning`, `postgis`) + surcharges CLI, fusionnés en
//! un `PipelineConfig` immuable. Priorité : CLI > fichier > `PG*` > défauts.

use std::path::{Path, PathBuf};

use overpass::{TagFilters, TagValue};
use serde::Deserialize;

use crate::error::PipelineError;
use crate::export::pool::{DatabaseConfig, SslMode};

pub const DEFAULT_CONFIG_PATH: &str = "settings.json";
pub const RAW_FILE_NAME: &str = "osm_raw.geojson";
pub const DEFAULT_CLEANED_PATH: &str = "data/processed/osm_cleaned.geojson";
pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";
pub const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";

const GEOMETRY_TYPES: &[&str] = &[
    "GEOMETRY",
    "POINT",
    "LINESTRING",
    "POLYGON",
    "MULTIPOINT",
    "MULTILINESTRING",
    "MULTIPOLYGON",
    "GEOMETRYCOLLECTION",
];

/// Politique quand la table cible existe déjà
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    #[default]
    Replace,
    Append,
    Fail,
}

impl std::fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Replace => "replace",
            Self::Append => "append",
            Self::Fail => "fail",
        })
    }
}

/// Surcharges issues de la ligne de commande
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub location: Option<String>,
    pub table: Option<String>,
    pub verbose: bool,
    pub debug: bool,
}

/// Configuration résolue, partagée en lecture seule par tous les étages
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub acquisition: AcquisitionConfig,
    pub transform: TransformConfig,
    pub load: LoadConfig,
    pub verbose: bool,
    pub debug: bool,
}

#[derive(Debug, Clone)]
pub struct AcquisitionConfig {
    pub location_name: String,
    pub destination_folder: PathBuf,
    pub timeout_secs: u64,
    pub tags: TagFilters,
    pub nominatim_url: String,
    pub overpass_url: String,
    /// Relances HTTP (429, 5xx, timeout), attente fixe de 2 s
    pub max_retries: u32,
}

impl AcquisitionConfig {
    /// Artefact brut produit par l'acquisition
    pub fn raw_path(&self) -> PathBuf {
        self.destination_folder.join(RAW_FILE_NAME)
    }
}

#[derive(Debug, Clone)]
pub struct TransformConfig {
    pub target_crs: String,
    pub target_epsg: u32,
    pub standardize_columns: bool,
    pub output_path: PathBuf,
    /// Nombre de décimales conservées
    pub precision: u8,
}

#[derive(Debug, Clone)]
pub struct LoadConfig {
    pub connection: DatabaseConfig,
    pub schema: String,
    pub table_name: String,
    pub if_exists: ConflictPolicy,
    pub extensions: Vec<String>,
    pub chunk_size: usize,
    pub geometry_type: String,
    pub create_index: bool,
}

// Forme brute du fichier : tout est optionnel sauf les sections

#[derive(Debug, Deserialize)]
struct ConfigFile {
    osm: OsmSection,
    cleaning: CleaningSection,
    postgis: PostgisSection,
}

#[derive(Debug, Default, Deserialize)]
struct OsmSection {
    location_name: Option<String>,
    destination_folder: Option<PathBuf>,
    timeout: Option<u64>,
    tags: Option<TagFilters>,
    nominatim_url: Option<String>,
    overpass_url: Option<String>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct CleaningSection {
    target_crs: Option<String>,
    standardize_columns: Option<bool>,
    output_path: Option<PathBuf>,
    precision: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
struct PostgisSection {
    user: Option<String>,
    password: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    database: Option<String>,
    schema: Option<String>,
    table_name: Option<String>,
    if_exists: Option<ConflictPolicy>,
    extensions: Option<Vec<String>>,
    chunk_size: Option<usize>,
    geometry_type: Option<String>,
    create_index: Option<bool>,
    ssl_mode: Option<String>,
}

/// Filtre de tags par défaut
pub fn default_tags() -> TagFilters {
    ["building", "highway", "amenity", "landuse", "natural"]
        .into_iter()
        .map(|key| (key.to_string(), TagValue::Any(true)))
        .collect()
}

/// `EPSG:4326` → 4326
pub fn parse_epsg(crs: &str) -> Option<u32> {
    let (authority, code) = crs.trim().split_once(':')?;
    if !authority.eq_ignore_ascii_case("epsg") {
        return None;
    }
    code.trim().parse().ok().filter(|&c| c > 0)
}

/// Charge le fichier et applique les surcharges
pub fn resolve(path: &Path, overrides: &ConfigOverrides) -> Result<PipelineConfig, PipelineError> {
    let content = std::fs::read_to_string(path).map_err(|e| PipelineError::ConfigLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    resolve_str(&content, path, overrides, DatabaseConfig::from_env())
}

/// Variante sans accès disque ni environnement
pub fn resolve_str(
    content: &str,
    path: &Path,
    overrides: &ConfigOverrides,
    db_defaults: DatabaseConfig,
) -> Result<PipelineConfig, PipelineError> {
    let file: ConfigFile = serde_json::from_str(content).map_err(|e| PipelineError::ConfigLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let config = merge(file, overrides, db_defaults)?;
    validate(&config)?;
    Ok(config)
}

fn merge(
    file: ConfigFile,
    overrides: &ConfigOverrides,
    db_defaults: DatabaseConfig,
) -> Result<PipelineConfig, PipelineError> {
    let ConfigFile {
        osm,
        cleaning,
        postgis,
    } = file;

    let acquisition = AcquisitionConfig {
        location_name: overrides
            .location
            .clone()
            .or(osm.location_name)
            .unwrap_or_default(),
        destination_folder: osm
            .destination_folder
            .unwrap_or_else(|| PathBuf::from("data/raw")),
        timeout_secs: osm.timeout.unwrap_or(300),
        tags: osm.tags.unwrap_or_else(default_tags),
        nominatim_url: osm
            .nominatim_url
            .unwrap_or_else(|| DEFAULT_NOMINATIM_URL.to_string()),
        overpass_url: osm
            .overpass_url
            .unwrap_or_else(|| DEFAULT_OVERPASS_URL.to_string()),
        max_retries: osm.max_retries.unwrap_or(3),
    };

    let target_crs = cleaning
        .target_crs
        .unwrap_or_else(|| "EPSG:4326".to_string());
    let target_epsg = parse_epsg(&target_crs).ok_or_else(|| {
        PipelineError::ConfigValidation(format!(
            "cleaning.target_crs '{}' is not of the form EPSG:<code>",
            target_crs
        ))
    })?;
    // 4326 (degrés) : 7 décimales ≈ 1 cm ; projections métriques : 2 décimales
    let precision = cleaning
        .precision
        .unwrap_or(if target_epsg == 4326 { 7 } else { 2 });

    let transform = TransformConfig {
        target_crs,
        target_epsg,
        standardize_columns: cleaning.standardize_columns.unwrap_or(true),
        output_path: cleaning
            .output_path
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CLEANED_PATH)),
        precision,
    };

    let ssl_mode = match postgis.ssl_mode {
        Some(mode) => mode
            .parse::<SslMode>()
            .map_err(PipelineError::ConfigValidation)?,
        None => db_defaults.ssl_mode,
    };
    let connection = DatabaseConfig {
        host: postgis.host.unwrap_or(db_defaults.host),
        port: postgis.port.unwrap_or(db_defaults.port),
        dbname: postgis.database.unwrap_or(db_defaults.dbname),
        user: postgis.user.unwrap_or(db_defaults.user),
        password: postgis.password.or(db_defaults.password),
        pool_size: db_defaults.pool_size,
        ssl_mode,
    };

    let load = LoadConfig {
        connection,
        schema: postgis.schema.unwrap_or_else(|| "public".to_string()),
        table_name: overrides
            .table
            .clone()
            .or(postgis.table_name)
            .unwrap_or_else(|| "osm_features".to_string()),
        if_exists: postgis.if_exists.unwrap_or_default(),
        extensions: postgis
            .extensions
            .unwrap_or_else(|| vec!["postgis".to_string()]),
        chunk_size: postgis.chunk_size.unwrap_or(5000),
        geometry_type: postgis
            .geometry_type
            .unwrap_or_else(|| "GEOMETRY".to_string())
            .to_uppercase(),
        create_index: postgis.create_index.unwrap_or(true),
    };

    Ok(PipelineConfig {
        acquisition,
        transform,
        load,
        verbose: overrides.verbose || overrides.debug,
        debug: overrides.debug,
    })
}

fn validate(config: &PipelineConfig) -> Result<(), PipelineError> {
    let invalid = |msg: String| Err(PipelineError::ConfigValidation(msg));

    if config.acquisition.location_name.trim().is_empty() {
        return invalid("osm.location_name is empty (set it in the file or pass --location)".into());
    }
    if config.acquisition.timeout_secs == 0 {
        return invalid("osm.timeout must be greater than 0".into());
    }
    if !config.acquisition.tags.values().any(TagValue::is_enabled) {
        return invalid("osm.tags does not enable any tag".into());
    }
    if config.load.if_exists == ConflictPolicy::Append && config.load.table_name.trim().is_empty()
    {
        return invalid("postgis.if_exists = append requires a non-empty table_name".into());
    }
    if config.load.table_name.trim().is_empty() {
        return invalid("postgis.table_name is empty".into());
    }
    if config.load.schema.trim().is_empty() {
        return invalid("postgis.schema is empty".into());
    }
    if config.load.chunk_size == 0 {
        return invalid("postgis.chunk_size must be greater than 0".into());
    }
    if !GEOMETRY_TYPES.contains(&config.load.geometry_type.as_str()) {
        return invalid(format!(
            "postgis.geometry_type '{}' is not one of {}",
            config.load.geometry_type,
            GEOMETRY_TYPES.join(", ")
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = r#"{
        "osm": {"location_name": "A", "destination_folder": "data/raw", "timeout": 120,
                "tags": {"building": true}},
        "cleaning": {"target_crs": "EPSG:4326", "standardize_columns": true},
        "postgis": {"user": "osm", "password": "secret", "host": "db", "port": 5433,
                    "database": "gis", "schema": "public", "table_name": "features",
                    "if_exists": "replace", "create_index": true}
    }"#;

    fn resolve_base(overrides: &ConfigOverrides) -> Result<PipelineConfig, PipelineError> {
        resolve_str(BASE, Path::new("settings.json"), overrides, DatabaseConfig::default())
    }

    #[test]
    fn test_file_values() {
        let config = resolve_base(&ConfigOverrides::default()).unwrap();
        assert_eq!(config.acquisition.location_name, "A");
        assert_eq!(config.acquisition.timeout_secs, 120);
        assert_eq!(config.acquisition.raw_path(), PathBuf::from("data/raw/osm_raw.geojson"));
        assert_eq!(config.load.connection.host, "db");
        assert_eq!(config.load.connection.port, 5433);
        assert_eq!(config.load.connection.dbname, "gis");
        assert_eq!(config.load.table_name, "features");
        assert_eq!(config.transform.target_epsg, 4326);
        assert_eq!(config.transform.precision, 7);
    }

    #[test]
    fn test_cli_overrides_win() {
        let overrides = ConfigOverrides {
            location: Some("B".into()),
            table: Some("other".into()),
            verbose: false,
            debug: true,
        };
        let config = resolve_base(&overrides).unwrap();
        assert_eq!(config.acquisition.location_name, "B");
        assert_eq!(config.load.table_name, "other");
        assert!(config.debug);
        assert!(config.verbose, "debug implies verbose");
    }

    #[test]
    fn test_defaults() {
        let json = r#"{"osm": {"location_name": "Yaba, Nigeria"}, "cleaning": {}, "postgis": {}}"#;
        let env = DatabaseConfig {
            host: "pg.internal".into(),
            ..Default::default()
        };
        let config =
            resolve_str(json, Path::new("s.json"), &ConfigOverrides::default(), env).unwrap();

        assert_eq!(config.acquisition.timeout_secs, 300);
        assert_eq!(config.acquisition.tags, default_tags());
        assert_eq!(config.acquisition.max_retries, 3);
        assert_eq!(config.transform.target_crs, "EPSG:4326");
        assert!(config.transform.standardize_columns);
        assert_eq!(
            config.transform.output_path,
            PathBuf::from(DEFAULT_CLEANED_PATH)
        );
        assert_eq!(config.load.schema, "public");
        assert_eq!(config.load.table_name, "osm_features");
        assert_eq!(config.load.if_exists, ConflictPolicy::Replace);
        assert_eq!(config.load.extensions, vec!["postgis".to_string()]);
        assert_eq!(config.load.chunk_size, 5000);
        assert_eq!(config.load.geometry_type, "GEOMETRY");
        assert!(config.load.create_index);
        // variable d'environnement utilisée à défaut du fichier
        assert_eq!(config.load.connection.host, "pg.internal");
    }

    #[test]
    fn test_missing_section_is_load_error() {
        let json = r#"{"osm": {"location_name": "A"}, "cleaning": {}}"#;
        let err = resolve_str(
            json,
            Path::new("s.json"),
            &ConfigOverrides::default(),
            DatabaseConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::ConfigLoad { .. }));
        assert!(err.to_string().contains("postgis"));
    }

    #[test]
    fn test_append_requires_table() {
        let json = r#"{"osm": {"location_name": "A"}, "cleaning": {},
                       "postgis": {"if_exists": "append", "table_name": "  "}}"#;
        let err = resolve_str(
            json,
            Path::new("s.json"),
            &ConfigOverrides::default(),
            DatabaseConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::ConfigValidation(_)));
        assert!(err.to_string().contains("append"));
    }

    #[test]
    fn test_invalid_values() {
        let cases = [
            r#"{"osm": {"location_name": ""}, "cleaning": {}, "postgis": {}}"#,
            r#"{"osm": {"location_name": "A"}, "cleaning": {"target_crs": "WGS84"}, "postgis": {}}"#,
            r#"{"osm": {"location_name": "A"}, "cleaning": {}, "postgis": {"chunk_size": 0}}"#,
            r#"{"osm": {"location_name": "A"}, "cleaning": {}, "postgis": {"geometry_type": "CIRCLE"}}"#,
            r#"{"osm": {"location_name": "A", "timeout": 0}, "cleaning": {}, "postgis": {}}"#,
            r#"{"osm": {"location_name": "A", "tags": {"building": false}}, "cleaning": {}, "postgis": {}}"#,
        ];
        for json in cases {
            let err = resolve_str(
                json,
                Path::new("s.json"),
                &ConfigOverrides::default(),
                DatabaseConfig::default(),
            )
            .unwrap_err();
            assert!(
                matches!(err, PipelineError::ConfigValidation(_)),
                "{} -> {:?}",
                json,
                err
            );
        }
    }

    #[test]
    fn test_unknown_policy_is_load_error() {
        let json = r#"{"osm": {"location_name": "A"}, "cleaning": {}, "postgis": {"if_exists": "merge"}}"#;
        assert!(matches!(
            resolve_str(
                json,
                Path::new("s.json"),
                &ConfigOverrides::default(),
                DatabaseConfig::default()
            ),
            Err(PipelineError::ConfigLoad { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = resolve(
            Path::new("/nonexistent/settings.json"),
            &ConfigOverrides::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::ConfigLoad { .. }));
    }

    #[test]
    fn test_parse_epsg() {
        assert_eq!(parse_epsg("EPSG:4326"), Some(4326));
        assert_eq!(parse_epsg("epsg:32631"), Some(32631));
        assert_eq!(parse_epsg("EPSG:abc"), None);
        assert_eq!(parse_epsg("4326"), None);
    }

    #[test]
    fn test_projected_precision() {
        let json = r#"{"osm": {"location_name": "A"}, "cleaning": {"target_crs": "EPSG:3857"}, "postgis": {}}"#;
        let config = resolve_str(
            json,
            Path::new("s.json"),
            &ConfigOverrides::default(),
            DatabaseConfig::default(),
        )
        .unwrap();
        assert_eq!(config.transform.precision, 2);
    }
}
