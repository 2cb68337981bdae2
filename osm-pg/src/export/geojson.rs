//! Artefacts GeoJSON : lecture, écriture atomique (geozero), checksum blake3

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use geo::{Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use geojson::{GeoJson, Position};
use geozero::geojson::GeoJsonWriter;
use geozero::GeozeroGeometry;
use serde_json::{Map, Value};
use tracing::debug;

/// Feature échangée entre étages
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    pub id: Option<String>,
    /// `None` : géométrie nulle ou vide dans le fichier source
    pub geometry: Option<Geometry>,
    pub properties: Map<String, Value>,
}

impl From<overpass::Feature> for FeatureRecord {
    fn from(feature: overpass::Feature) -> Self {
        Self {
            id: Some(feature.id),
            geometry: Some(feature.geometry),
            properties: feature.properties,
        }
    }
}

/// Contenu d'un fichier GeoJSON
#[derive(Debug, Default)]
pub struct FeatureCollection {
    pub features: Vec<FeatureRecord>,
    /// EPSG déclaré par le membre `crs` (absent = 4326 selon RFC 7946)
    pub epsg: Option<u32>,
}

/// Lit une FeatureCollection GeoJSON
pub fn read_features(path: &Path) -> Result<FeatureCollection> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_features(&content).with_context(|| format!("Invalid GeoJSON in {}", path.display()))
}

/// Parse une FeatureCollection depuis une chaîne
pub fn parse_features(content: &str) -> Result<FeatureCollection> {
    let collection = match content.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(fc) => fc,
        GeoJson::Feature(_) | GeoJson::Geometry(_) => {
            bail!("Expected a FeatureCollection")
        }
    };

    let epsg = collection
        .foreign_members
        .as_ref()
        .and_then(|members| members.get("crs"))
        .and_then(crs_to_epsg);

    let features = collection
        .features
        .into_iter()
        .map(|feature| {
            let id = feature.id.map(|id| match id {
                geojson::feature::Id::String(s) => s,
                geojson::feature::Id::Number(n) => n.to_string(),
            });
            let geometry = feature
                .geometry
                .as_ref()
                .and_then(|g| value_to_geometry(&g.value));
            FeatureRecord {
                id,
                geometry,
                properties: feature.properties.unwrap_or_default(),
            }
        })
        .collect();

    Ok(FeatureCollection { features, epsg })
}

/// `{"type":"name","properties":{"name":"urn:ogc:def:crs:EPSG::3857"}}` → 3857
fn crs_to_epsg(crs: &Value) -> Option<u32> {
    let name = crs.get("properties")?.get("name")?.as_str()?;
    if name.ends_with("CRS84") {
        return Some(4326);
    }
    let upper = name.to_ascii_uppercase();
    let idx = upper.find("EPSG")?;
    let code: String = upper[idx + 4..]
        .trim_start_matches(':')
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    code.parse().ok()
}

fn to_coord(position: &Position) -> Option<Coord> {
    match position.as_slice() {
        [x, y, ..] if x.is_finite() && y.is_finite() => Some(Coord { x: *x, y: *y }),
        _ => None,
    }
}

fn to_line(positions: &[Position]) -> LineString {
    LineString::new(positions.iter().filter_map(to_coord).collect())
}

fn to_polygon(rings: &[Vec<Position>]) -> Option<Polygon> {
    let (exterior, interiors) = rings.split_first()?;
    Some(Polygon::new(
        to_line(exterior),
        interiors.iter().map(|r| to_line(r)).collect(),
    ))
}

/// Conversion tolérante : les positions invalides sont ignorées et une
/// géométrie sans coordonnée devient `None`
fn value_to_geometry(value: &geojson::Value) -> Option<Geometry> {
    use geojson::Value as V;

    let geometry = match value {
        V::Point(p) => Geometry::Point(Point::from(to_coord(p)?)),
        V::MultiPoint(points) => Geometry::MultiPoint(MultiPoint::new(
            points.iter().filter_map(to_coord).map(Point::from).collect(),
        )),
        V::LineString(line) => Geometry::LineString(to_line(line)),
        V::MultiLineString(lines) => Geometry::MultiLineString(MultiLineString::new(
            lines.iter().map(|l| to_line(l)).collect(),
        )),
        V::Polygon(rings) => Geometry::Polygon(to_polygon(rings)?),
        V::MultiPolygon(polygons) => Geometry::MultiPolygon(MultiPolygon::new(
            polygons.iter().filter_map(|p| to_polygon(p)).collect(),
        )),
        V::GeometryCollection(geometries) => {
            Geometry::GeometryCollection(geo::GeometryCollection::new_from(
                geometries
                    .iter()
                    .filter_map(|g| value_to_geometry(&g.value))
                    .collect(),
            ))
        }
    };
    Some(geometry)
}

/// Écrit une FeatureCollection de façon atomique (fichier temporaire puis rename)
///
/// Avec `epsg`, un membre `crs` nommé est ajouté ; sans, le fichier suit
/// RFC 7946 (WGS84).
pub fn write_features_atomic(
    features: &[FeatureRecord],
    epsg: Option<u32>,
    output_path: &Path,
) -> Result<()> {
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let tmp_path = temp_sibling(output_path);
    let written = write_features(features, epsg, &tmp_path);
    if let Err(e) = written {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e);
    }

    std::fs::rename(&tmp_path, output_path).with_context(|| {
        format!(
            "Failed to move {} to {}",
            tmp_path.display(),
            output_path.display()
        )
    })?;
    debug!(path = %output_path.display(), features = features.len(), "GeoJSON written");
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    path.with_file_name(format!(".{}.tmp", name))
}

fn write_features(features: &[FeatureRecord], epsg: Option<u32>, path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    write!(writer, r#"{{"type":"FeatureCollection","#)?;
    if let Some(epsg) = epsg {
        write!(
            writer,
            r#""crs":{{"type":"name","properties":{{"name":"urn:ogc:def:crs:EPSG::{}"}}}},"#,
            epsg
        )?;
    }
    write!(writer, r#""features":["#)?;

    for (i, feature) in features.iter().enumerate() {
        if i > 0 {
            write!(writer, ",")?;
        }
        write_feature(&mut writer, feature)?;
    }

    write!(writer, "]}}")?;
    writer.flush()?;
    writer
        .into_inner()
        .map_err(|e| e.into_error())?
        .sync_all()
        .with_context(|| format!("Failed to sync {}", path.display()))?;

    Ok(())
}

/// Écrit une feature en GeoJSON
fn write_feature<W: Write>(writer: &mut W, feature: &FeatureRecord) -> Result<()> {
    write!(writer, r#"{{"type":"Feature","#)?;
    if let Some(id) = &feature.id {
        write!(writer, r#""id":"#)?;
        serde_json::to_writer(&mut *writer, id)?;
        write!(writer, ",")?;
    }

    // Géométrie via geozero
    write!(writer, r#""geometry":"#)?;
    match &feature.geometry {
        Some(geometry) => {
            let mut geom_buf = Vec::new();
            let mut geom_writer = GeoJsonWriter::new(&mut geom_buf);
            geometry.process_geom(&mut geom_writer)?;
            writer.write_all(&geom_buf)?;
        }
        None => write!(writer, "null")?,
    }

    write!(writer, r#","properties":"#)?;
    serde_json::to_writer(&mut *writer, &feature.properties)?;
    write!(writer, "}}")?;

    Ok(())
}

/// Calcule le checksum blake3 d'un fichier
pub fn compute_file_checksum(path: &Path) -> Result<String> {
    let mut file = File::open(path).with_context(|| format!("Cannot open {}", path.display()))?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0u8; 65536];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, geometry: Geometry) -> FeatureRecord {
        let mut properties = Map::new();
        properties.insert("name".into(), Value::String("Test \"quoted\"".into()));
        properties.insert("osmid".into(), Value::from(42u64));
        FeatureRecord {
            id: Some(id.to_string()),
            geometry: Some(geometry),
            properties,
        }
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.geojson");
        let features = vec![
            record("node/1", Geometry::Point(Point::new(3.37, 6.5))),
            FeatureRecord {
                id: None,
                geometry: None,
                properties: Map::new(),
            },
        ];

        write_features_atomic(&features, Some(3857), &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("EPSG::3857"));
        assert!(!dir.path().join("nested/.out.geojson.tmp").exists());

        let collection = read_features(&path).unwrap();
        assert_eq!(collection.epsg, Some(3857));
        assert_eq!(collection.features.len(), 2);
        assert_eq!(collection.features[0], features[0]);
        assert!(collection.features[1].geometry.is_none());
    }

    #[test]
    fn test_rfc7946_has_no_crs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.geojson");
        write_features_atomic(
            &[record("way/1", Geometry::Point(Point::new(0.0, 0.0)))],
            None,
            &path,
        )
        .unwrap();

        let collection = read_features(&path).unwrap();
        assert_eq!(collection.epsg, None);
    }

    #[test]
    fn test_empty_geometries_become_none() {
        let json = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","geometry":{"type":"Point","coordinates":[]},"properties":{}},
            {"type":"Feature","geometry":{"type":"Polygon","coordinates":[]},"properties":null},
            {"type":"Feature","id":7,"geometry":{"type":"LineString","coordinates":[[0,0],[1,1]]},"properties":{"a":1}}
        ]}"#;
        let collection = parse_features(json).unwrap();
        assert!(collection.features[0].geometry.is_none());
        assert!(collection.features[1].geometry.is_none());
        assert_eq!(collection.features[2].id.as_deref(), Some("7"));
        assert!(matches!(
            collection.features[2].geometry,
            Some(Geometry::LineString(_))
        ));
    }

    #[test]
    fn test_crs_names() {
        let crs = |name: &str| serde_json::json!({"type": "name", "properties": {"name": name}});
        assert_eq!(crs_to_epsg(&crs("urn:ogc:def:crs:EPSG::32631")), Some(32631));
        assert_eq!(crs_to_epsg(&crs("EPSG:3857")), Some(3857));
        assert_eq!(crs_to_epsg(&crs("urn:ogc:def:crs:OGC:1.3:CRS84")), Some(4326));
        assert_eq!(crs_to_epsg(&crs("something")), None);
    }

    #[test]
    fn test_not_a_collection() {
        assert!(parse_features(r#"{"type":"Point","coordinates":[1,2]}"#).is_err());
    }

    #[test]
    fn test_checksum_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"osm").unwrap();
        let first = compute_file_checksum(&path).unwrap();
        assert_eq!(first, compute_file_checksum(&path).unwrap());
        assert_eq!(first.len(), 64);
    }
}
