//! Export vers PostgreSQL/PostGIS
//!
//! Chargement en trois temps dans une seule transaction : préparation de la
//! table cible selon la politique de conflit, COPY CSV vers une table de
//! staging temporaire, puis fusion avec `ST_MakeValid`.

use std::collections::BTreeSet;

use anyhow::{bail, Context, Result};
use bytes::{Bytes, BytesMut};
use deadpool_postgres::{Object, Pool, Transaction};
use futures::SinkExt;
use geo::Geometry;
use geozero::wkt::WktWriter;
use geozero::GeozeroGeometry;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::geojson::FeatureRecord;
use super::pool::{create_pool, DatabaseConfig, MAINTENANCE_DB};
use super::transaction::{LoadReport, LoadTransaction};
use crate::config::{ConflictPolicy, LoadConfig};

/// Colonne géométrique de la table cible
pub const GEOMETRY_COLUMN: &str = "geometry";

/// Description de la table cible
#[derive(Debug, Clone)]
pub struct TableSpec {
    pub schema: String,
    pub name: String,
    /// Colonnes attributaires (TEXT), triées
    pub columns: Vec<String>,
    pub geometry_type: String,
    pub srid: u32,
}

impl TableSpec {
    /// `"schema"."table"`
    pub fn qualified(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.name))
    }

    fn staging_name(&self) -> String {
        quote_ident(&format!("_staging_{}", self.name))
    }

    fn index_name(&self) -> String {
        quote_ident(&format!("idx_{}_{}", self.name, GEOMETRY_COLUMN))
    }

    fn column_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| quote_ident(c))
            .chain(std::iter::once(quote_ident(GEOMETRY_COLUMN)))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Chunk CSV pré-formaté pour COPY
#[derive(Debug)]
pub struct CopyChunk {
    pub data: Bytes,
    pub rows: u64,
}

/// Lignes encodées et nombre de features écartées
#[derive(Debug, Default)]
pub struct EncodedRows {
    pub chunks: Vec<CopyChunk>,
    pub rows: u64,
    pub skipped: usize,
}

/// Identifiant SQL entre guillemets
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Union triée des clés d'attributs (hors colonne géométrique)
pub fn collect_columns(features: &[FeatureRecord]) -> Vec<String> {
    features
        .iter()
        .flat_map(|f| f.properties.keys())
        .filter(|k| k.as_str() != GEOMETRY_COLUMN)
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Crée la base cible si elle n'existe pas (via la base de maintenance)
///
/// Retourne `true` si la base a été créée.
pub async fn ensure_database(connection: &DatabaseConfig) -> Result<bool> {
    if connection.dbname == MAINTENANCE_DB {
        return Ok(false);
    }

    let pool = create_pool(&connection.for_database(MAINTENANCE_DB))?;
    let result = create_database_if_missing(&pool, &connection.dbname).await;
    pool.close();

    match result {
        Ok(created) => Ok(created),
        Err(e) => {
            // La connexion à la base cible remontera l'erreur réelle
            warn!(
                database = %connection.dbname,
                "Could not check database through '{}': {:#}", MAINTENANCE_DB, e
            );
            Ok(false)
        }
    }
}

async fn create_database_if_missing(pool: &Pool, dbname: &str) -> Result<bool> {
    let client = pool
        .get()
        .await
        .context("Failed to connect to maintenance database")?;

    let exists = client
        .query_opt("SELECT 1 FROM pg_database WHERE datname = $1", &[&dbname])
        .await
        .context("Failed to check pg_database")?
        .is_some();
    if exists {
        debug!(database = %dbname, "Database already exists");
        return Ok(false);
    }

    client
        .execute(&format!("CREATE DATABASE {}", quote_ident(dbname)), &[])
        .await
        .with_context(|| format!("Failed to create database {}", dbname))?;
    info!(database = %dbname, "Created database");
    Ok(true)
}

/// Active les extensions et crée le schéma
pub async fn prepare_database(client: &Object, extensions: &[String], schema: &str) -> Result<()> {
    for extension in extensions {
        ensure_extension(client, extension).await?;
    }

    client
        .execute(
            &format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(schema)),
            &[],
        )
        .await
        .with_context(|| format!("Failed to create schema {}", schema))?;

    Ok(())
}

/// `CREATE EXTENSION` peut nécessiter des droits superuser : si l'extension
/// est déjà installée, l'échec est toléré.
async fn ensure_extension(client: &Object, extension: &str) -> Result<()> {
    let sql = format!("CREATE EXTENSION IF NOT EXISTS {}", quote_ident(extension));
    match client.execute(&sql, &[]).await {
        Ok(_) => Ok(()),
        Err(e) => {
            warn!("CREATE EXTENSION {extension} failed (will check if already installed): {e}");
            let exists = client
                .query_opt(
                    "SELECT 1 FROM pg_extension WHERE extname = $1",
                    &[&extension],
                )
                .await
                .context("Failed to check pg_extension")?
                .is_some();
            if !exists {
                bail!("Extension {extension} is not installed and could not be created: {e}");
            }
            Ok(())
        }
    }
}

pub async fn table_exists(tx: &Transaction<'_>, schema: &str, table: &str) -> Result<bool> {
    let exists = tx
        .query_opt(
            "SELECT 1 FROM information_schema.tables WHERE table_schema = $1 AND table_name = $2",
            &[&schema, &table],
        )
        .await
        .context("Failed to check information_schema.tables")?
        .is_some();
    Ok(exists)
}

fn create_table_sql(spec: &TableSpec, if_not_exists: bool) -> String {
    let mut columns: Vec<String> = spec
        .columns
        .iter()
        .map(|c| format!("{} TEXT", quote_ident(c)))
        .collect();
    columns.push(format!(
        "{} geometry({}, {})",
        quote_ident(GEOMETRY_COLUMN),
        spec.geometry_type,
        spec.srid
    ));

    format!(
        "CREATE TABLE {}{} (\n    {}\n)",
        if if_not_exists { "IF NOT EXISTS " } else { "" },
        spec.qualified(),
        columns.join(",\n    ")
    )
}

/// Prépare la table cible selon la politique de conflit
pub async fn prepare_table(
    tx: &Transaction<'_>,
    spec: &TableSpec,
    policy: ConflictPolicy,
) -> Result<()> {
    let target = spec.qualified();

    match policy {
        ConflictPolicy::Replace => {
            tx.execute(&format!("DROP TABLE IF EXISTS {} CASCADE", target), &[])
                .await
                .with_context(|| format!("Failed to drop table {}", target))?;
            tx.execute(&create_table_sql(spec, false), &[])
                .await
                .with_context(|| format!("Failed to create table {}", target))?;
            info!(table = %target, "Replaced table");
        }
        ConflictPolicy::Append => {
            tx.execute(&create_table_sql(spec, true), &[])
                .await
                .with_context(|| format!("Failed to create table {}", target))?;
            // Nouvelles clés d'attributs depuis le dernier chargement
            for column in &spec.columns {
                tx.execute(
                    &format!(
                        "ALTER TABLE {} ADD COLUMN IF NOT EXISTS {} TEXT",
                        target,
                        quote_ident(column)
                    ),
                    &[],
                )
                .await
                .with_context(|| format!("Failed to add column {} to {}", column, target))?;
            }
            debug!(table = %target, "Appending to table");
        }
        ConflictPolicy::Fail => {
            if table_exists(tx, &spec.schema, &spec.name).await? {
                bail!("Table {} already exists (if_exists = fail)", target);
            }
            tx.execute(&create_table_sql(spec, false), &[])
                .await
                .with_context(|| format!("Failed to create table {}", target))?;
            info!(table = %target, "Created table");
        }
    }

    Ok(())
}

/// Crée la table de staging (temporaire, supprimée au commit)
pub async fn create_staging_table(tx: &Transaction<'_>, spec: &TableSpec) -> Result<String> {
    let staging = spec.staging_name();
    let mut columns: Vec<String> = spec
        .columns
        .iter()
        .map(|c| format!("{} TEXT", quote_ident(c)))
        .collect();
    columns.push(format!("{} geometry", quote_ident(GEOMETRY_COLUMN)));

    tx.execute(
        &format!(
            "CREATE TEMP TABLE {} ({}) ON COMMIT DROP",
            staging,
            columns.join(", ")
        ),
        &[],
    )
    .await
    .with_context(|| format!("Failed to create staging table {}", staging))?;

    Ok(staging)
}

/// Envoie les chunks CSV via COPY dans la table de staging
pub async fn copy_chunks(
    tx: &Transaction<'_>,
    staging: &str,
    spec: &TableSpec,
    chunks: Vec<CopyChunk>,
) -> Result<u64> {
    let copy_sql = format!(
        "COPY {} ({}) FROM STDIN WITH (FORMAT csv, DELIMITER '|', QUOTE '\"', ESCAPE '\"', NULL '')",
        staging,
        spec.column_list()
    );

    let copy_in = tx.copy_in(&copy_sql).await.context("Failed to start COPY")?;
    let mut pinned = std::pin::pin!(copy_in);

    let mut sent: u64 = 0;
    for chunk in chunks {
        if chunk.data.is_empty() {
            continue;
        }
        pinned
            .as_mut()
            .send(chunk.data)
            .await
            .context("Failed to send COPY chunk")?;
        sent += chunk.rows;
        debug!(rows = sent, "COPY progress");
    }

    let copied = pinned
        .as_mut()
        .finish()
        .await
        .context("Failed to finish COPY")?;
    if copied != sent {
        warn!(sent, copied, "COPY row count mismatch");
    }

    Ok(copied)
}

/// Fusionne la staging vers la table cible en corrigeant les géométries
pub async fn merge_staging(tx: &Transaction<'_>, spec: &TableSpec, staging: &str) -> Result<u64> {
    let source_cols: Vec<String> = spec
        .columns
        .iter()
        .map(|c| quote_ident(c))
        .chain(std::iter::once(format!(
            "ST_MakeValid({})",
            quote_ident(GEOMETRY_COLUMN)
        )))
        .collect();

    let sql = format!(
        "INSERT INTO {} ({}) SELECT {} FROM {}",
        spec.qualified(),
        spec.column_list(),
        source_cols.join(", "),
        staging
    );

    let inserted = tx
        .execute(&sql, &[])
        .await
        .with_context(|| format!("Failed to merge staging into {}", spec.qualified()))?;

    Ok(inserted)
}

/// Crée l'index spatial GiST
pub async fn create_spatial_index(client: &Object, spec: &TableSpec) -> Result<()> {
    client
        .execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} USING GIST ({})",
                spec.index_name(),
                spec.qualified(),
                quote_ident(GEOMETRY_COLUMN)
            ),
            &[],
        )
        .await
        .with_context(|| format!("Failed to create geometry index on {}", spec.qualified()))?;

    info!(table = %spec.qualified(), "Created spatial index");
    Ok(())
}

/// Charge les features dans la table décrite par `config`
///
/// Le pool est créé pour la durée de l'appel et fermé sur tous les chemins.
pub async fn load_features(
    config: &LoadConfig,
    features: &[FeatureRecord],
    srid: u32,
) -> Result<LoadReport> {
    ensure_database(&config.connection).await?;

    let pool = create_pool(&config.connection)?;
    let result = load_with_pool(&pool, config, features, srid).await;
    pool.close();
    result
}

async fn load_with_pool(
    pool: &Pool,
    config: &LoadConfig,
    features: &[FeatureRecord],
    srid: u32,
) -> Result<LoadReport> {
    let mut client = pool.get().await.with_context(|| {
        format!(
            "Failed to connect to PostgreSQL at {}:{}/{}",
            config.connection.host, config.connection.port, config.connection.dbname
        )
    })?;
    prepare_database(&client, &config.extensions, &config.schema).await?;

    let spec = TableSpec {
        schema: config.schema.clone(),
        name: config.table_name.clone(),
        columns: collect_columns(features),
        geometry_type: config.geometry_type.clone(),
        srid,
    };

    let encoded = encode_copy_chunks(features, &spec.columns, srid, config.chunk_size);
    if encoded.skipped > 0 {
        warn!(
            skipped = encoded.skipped,
            "Features without a loadable geometry were skipped"
        );
    }
    info!(
        rows = encoded.rows,
        chunks = encoded.chunks.len(),
        columns = spec.columns.len(),
        "Loading into {}",
        spec.qualified()
    );

    let mut load = LoadTransaction::begin(&mut client, &spec.qualified()).await?;
    match fill_table(load.transaction(), &spec, config.if_exists, encoded.chunks).await {
        Ok(rows) => load.record_rows(rows),
        Err(e) => {
            load.rollback(&format!("{:#}", e)).await;
            return Err(e);
        }
    }
    let report = load.commit().await?;

    // Hors transaction : un échec d'index n'annule pas le chargement
    if config.create_index {
        if let Err(e) = create_spatial_index(&client, &spec).await {
            warn!("Spatial index not created: {:#}", e);
        }
    }

    Ok(report)
}

async fn fill_table(
    tx: &Transaction<'_>,
    spec: &TableSpec,
    policy: ConflictPolicy,
    chunks: Vec<CopyChunk>,
) -> Result<u64> {
    prepare_table(tx, spec, policy).await?;
    let staging = create_staging_table(tx, spec).await?;
    copy_chunks(tx, &staging, spec, chunks).await?;
    merge_staging(tx, spec, &staging).await
}

/// Encode les features en chunks CSV de `chunk_size` lignes
///
/// Format : `col1|col2|...|"SRID=4326;WKT"`. Les features sans géométrie
/// exploitable par PostGIS sont écartées.
pub fn encode_copy_chunks(
    features: &[FeatureRecord],
    columns: &[String],
    srid: u32,
    chunk_size: usize,
) -> EncodedRows {
    let chunk_size = chunk_size.max(1);
    let ewkt_prefix = format!("SRID={};", srid);
    let mut wkt_buf = Vec::new();
    let mut buf = BytesMut::new();
    let mut pending: u64 = 0;
    let mut encoded = EncodedRows::default();

    for feature in features {
        let Some(geometry) = feature.geometry.as_ref() else {
            encoded.skipped += 1;
            continue;
        };
        if let Err(e) = write_copy_row(
            &mut buf,
            feature,
            geometry,
            columns,
            ewkt_prefix.as_bytes(),
            &mut wkt_buf,
        ) {
            debug!(id = ?feature.id, "Row skipped: {}", e);
            encoded.skipped += 1;
            continue;
        }
        pending += 1;
        encoded.rows += 1;

        if pending as usize >= chunk_size {
            encoded.chunks.push(CopyChunk {
                data: buf.split().freeze(),
                rows: pending,
            });
            pending = 0;
        }
    }

    if pending > 0 {
        encoded.chunks.push(CopyChunk {
            data: buf.split().freeze(),
            rows: pending,
        });
    }

    encoded
}

fn write_copy_row(
    buf: &mut BytesMut,
    feature: &FeatureRecord,
    geometry: &Geometry,
    columns: &[String],
    ewkt_prefix: &[u8],
    wkt_buf: &mut Vec<u8>,
) -> Result<()> {
    let start_len = buf.len();

    let res: Result<()> = (|| {
        for column in columns {
            if let Some(text) = feature.properties.get(column).and_then(property_to_text) {
                push_csv_text_field(buf, &text);
            }
            buf.extend_from_slice(b"|");
        }

        // geometry (EWKT: SRID=...;WKT)
        if !geometry_ok_for_postgis(geometry) {
            bail!("Geometry not valid for PostGIS ingestion (too few points)");
        }
        wkt_buf.clear();
        {
            let mut writer = WktWriter::new(&mut *wkt_buf);
            geometry
                .process_geom(&mut writer)
                .context("Failed to encode geometry to WKT")?;
        }
        buf.extend_from_slice(b"\"");
        buf.extend_from_slice(ewkt_prefix);
        buf.extend_from_slice(&wkt_buf[..]);
        buf.extend_from_slice(b"\"");

        buf.extend_from_slice(b"\n");
        Ok(())
    })();

    if res.is_err() {
        buf.truncate(start_len);
    }

    res
}

/// Valeur JSON → texte de colonne ; `null` devient NULL
fn property_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn push_csv_text_field(buf: &mut BytesMut, value: &str) {
    buf.extend_from_slice(b"\"");
    for b in value.as_bytes() {
        match *b {
            b'"' => buf.extend_from_slice(b"\"\""),
            b'\n' | b'\r' => buf.extend_from_slice(b" "),
            _ => buf.extend_from_slice(&[*b]),
        }
    }
    buf.extend_from_slice(b"\"");
}

/// Vérifie qu'une géométrie respecte les contraintes minimales de PostGIS
pub fn geometry_ok_for_postgis(geom: &Geometry) -> bool {
    use geo::{LineString, MultiLineString, MultiPolygon, Polygon};

    fn ring_ok(r: &LineString) -> bool {
        // LinearRing: >= 4 points, first == last
        if r.0.len() < 4 {
            return false;
        }
        match (r.0.first(), r.0.last()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    fn polygon_ok(p: &Polygon) -> bool {
        ring_ok(p.exterior()) && p.interiors().iter().all(ring_ok)
    }

    fn multilines_ok(mls: &MultiLineString) -> bool {
        mls.0.iter().all(|ls| ls.0.len() >= 2)
    }

    fn multipoly_ok(mp: &MultiPolygon) -> bool {
        mp.0.iter().all(polygon_ok)
    }

    match geom {
        Geometry::Point(_) => true,
        Geometry::MultiPoint(_) => true,
        Geometry::LineString(ls) => ls.0.len() >= 2,
        Geometry::MultiLineString(mls) => multilines_ok(mls),
        Geometry::Polygon(p) => polygon_ok(p),
        Geometry::MultiPolygon(mp) => multipoly_ok(mp),
        Geometry::GeometryCollection(gc) => gc.0.iter().all(geometry_ok_for_postgis),
        _ => true,
    }
}
