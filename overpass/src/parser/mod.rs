//! Parsing des réponses JSON Overpass (`[out:json]` + `out geom`)

pub mod area;

use std::collections::{BTreeMap, HashSet};

use geo::{Coord, Geometry, LineString, Point, Polygon};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::assemble::{build_multipolygon, RingRole};
use crate::query::{matches_any, TagFilters};
use crate::types::{ElementType, Feature, ParseResult};
use crate::OverpassError;

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    elements: Vec<Element>,
    remark: Option<String>,
    osm3s: Option<Osm3s>,
}

#[derive(Debug, Deserialize)]
struct Osm3s {
    timestamp_osm_base: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Element {
    Node {
        id: u64,
        lat: Option<f64>,
        lon: Option<f64>,
        #[serde(default)]
        tags: BTreeMap<String, String>,
    },
    Way {
        id: u64,
        #[serde(default)]
        geometry: Vec<Option<LatLon>>,
        #[serde(default)]
        tags: BTreeMap<String, String>,
    },
    Relation {
        id: u64,
        #[serde(default)]
        members: Vec<Member>,
        #[serde(default)]
        tags: BTreeMap<String, String>,
    },
    /// `area`, `count`, ... : ignorés
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct LatLon {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct Member {
    #[serde(rename = "type")]
    member_type: String,
    #[serde(default)]
    role: String,
    #[serde(default)]
    geometry: Vec<Option<LatLon>>,
}

/// Parse une réponse Overpass et retient les éléments qui portent au moins
/// un des tags demandés.
pub fn parse(json: &str, filters: &TagFilters) -> Result<ParseResult, OverpassError> {
    let response: Response = serde_json::from_str(json)?;

    if let Some(remark) = &response.remark {
        if remark.contains("runtime error") {
            return Err(OverpassError::Remote(remark.trim().to_string()));
        }
        debug!(remark = %remark, "Overpass remark");
    }

    let mut result = ParseResult {
        osm_base: response.osm3s.and_then(|o| o.timestamp_osm_base),
        ..Default::default()
    };
    let mut seen: HashSet<String> = HashSet::new();

    for element in response.elements {
        let (element_type, id, tags) = match &element {
            Element::Node { id, tags, .. } => (ElementType::Node, *id, tags),
            Element::Way { id, tags, .. } => (ElementType::Way, *id, tags),
            Element::Relation { id, tags, .. } => (ElementType::Relation, *id, tags),
            Element::Other => {
                result.skipped += 1;
                continue;
            }
        };

        if !matches_any(filters, tags) {
            result.skipped += 1;
            continue;
        }

        let feature_id = format!("{}/{}", element_type, id);
        if !seen.insert(feature_id.clone()) {
            continue;
        }

        let geometry = match build_geometry(&feature_id, &element) {
            Ok(Some(geometry)) => geometry,
            Ok(None) => {
                result.skipped += 1;
                continue;
            }
            Err(e) => {
                result.errors.push(e);
                continue;
            }
        };

        result.features.push(Feature {
            properties: build_properties(element_type, id, tags),
            id: feature_id,
            geometry,
        });
    }

    Ok(result)
}

fn build_properties(
    element_type: ElementType,
    id: u64,
    tags: &BTreeMap<String, String>,
) -> Map<String, Value> {
    let mut properties: Map<String, Value> = tags
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    properties.insert(
        "element_type".to_string(),
        Value::String(element_type.as_str().to_string()),
    );
    properties.insert("osmid".to_string(), Value::from(id));
    properties
}

/// `Ok(None)` : élément valide mais sans géométrie exploitable (relation de route, ...)
fn build_geometry(feature_id: &str, element: &Element) -> Result<Option<Geometry>, OverpassError> {
    match element {
        Element::Node { lat, lon, .. } => match (lat, lon) {
            (Some(lat), Some(lon)) => Ok(Some(Geometry::Point(Point::new(*lon, *lat)))),
            _ => Err(OverpassError::invalid_geometry(feature_id, "node without coordinates")),
        },
        Element::Way { geometry, tags, .. } => {
            let coords = to_coords(geometry);
            if coords.len() < 2 {
                return Err(OverpassError::invalid_geometry(
                    feature_id,
                    format!("way with {} usable points", coords.len()),
                ));
            }
            let closed = coords.len() >= 4 && coords.first() == coords.last();
            let line = LineString::new(coords);
            if closed && area::is_area(tags) {
                Ok(Some(Geometry::Polygon(Polygon::new(line, vec![]))))
            } else {
                Ok(Some(Geometry::LineString(line)))
            }
        }
        Element::Relation { members, tags, .. } => {
            let kind = tags.get("type").map(String::as_str);
            if !matches!(kind, Some("multipolygon") | Some("boundary")) {
                return Ok(None);
            }
            let rings: Vec<(RingRole, Vec<Coord>)> = members
                .iter()
                .filter(|m| m.member_type == "way")
                .map(|m| (RingRole::from_role(&m.role), to_coords(&m.geometry)))
                .collect();
            let multipolygon = build_multipolygon(feature_id, &rings)?;
            Ok(Some(Geometry::MultiPolygon(multipolygon)))
        }
        Element::Other => Ok(None),
    }
}

/// Les points `null` (nœuds hors emprise) sont ignorés
fn to_coords(points: &[Option<LatLon>]) -> Vec<Coord> {
    points
        .iter()
        .flatten()
        .map(|p| Coord { x: p.lon, y: p.lat })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::TagValue;

    fn building_filter() -> TagFilters {
        let mut f = TagFilters::new();
        f.insert("building".into(), TagValue::Any(true));
        f.insert("highway".into(), TagValue::Any(true));
        f
    }

    const SAMPLE: &str = r#"{
      "version": 0.6,
      "osm3s": {"timestamp_osm_base": "2024-05-01T10:00:00Z"},
      "elements": [
        {"type": "node", "id": 1, "lat": 6.5, "lon": 3.37, "tags": {"building": "yes"}},
        {"type": "node", "id": 2, "lat": 6.5, "lon": 3.38},
        {"type": "way", "id": 10, "tags": {"building": "house", "name": "Casa"},
         "geometry": [{"lat": 0, "lon": 0}, {"lat": 0, "lon": 1}, {"lat": 1, "lon": 1}, {"lat": 0, "lon": 0}]},
        {"type": "way", "id": 11, "tags": {"highway": "residential"},
         "geometry": [{"lat": 0, "lon": 0}, {"lat": 0, "lon": 1}, {"lat": 1, "lon": 1}, {"lat": 0, "lon": 0}]},
        {"type": "way", "id": 12, "tags": {"highway": "path"}, "geometry": [{"lat": 0, "lon": 0}, null]},
        {"type": "relation", "id": 20, "tags": {"type": "multipolygon", "building": "yes"},
         "members": [
           {"type": "way", "ref": 100, "role": "outer", "geometry": [{"lat": 0, "lon": 0}, {"lat": 0, "lon": 10}]},
           {"type": "way", "ref": 101, "role": "outer", "geometry": [{"lat": 0, "lon": 10}, {"lat": 10, "lon": 10}, {"lat": 10, "lon": 0}, {"lat": 0, "lon": 0}]},
           {"type": "way", "ref": 102, "role": "inner", "geometry": [{"lat": 2, "lon": 2}, {"lat": 2, "lon": 3}, {"lat": 3, "lon": 3}, {"lat": 2, "lon": 2}]}
         ]},
        {"type": "relation", "id": 21, "tags": {"type": "route", "highway": "bus"}, "members": []}
      ]
    }"#;

    #[test]
    fn test_parse_sample() {
        let result = parse(SAMPLE, &building_filter()).unwrap();

        assert_eq!(result.osm_base.as_deref(), Some("2024-05-01T10:00:00Z"));
        let ids: Vec<&str> = result.features.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["node/1", "way/10", "way/11", "relation/20"]);

        // node/2 sans tag et relation de route
        assert_eq!(result.skipped, 2);
        // way/12 n'a qu'un point exploitable
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn test_closed_way_kinds() {
        let result = parse(SAMPLE, &building_filter()).unwrap();
        let by_id = |id: &str| result.features.iter().find(|f| f.id == id).unwrap();

        assert!(matches!(by_id("way/10").geometry, Geometry::Polygon(_)));
        assert!(matches!(by_id("way/11").geometry, Geometry::LineString(_)));
        match &by_id("relation/20").geometry {
            Geometry::MultiPolygon(mp) => {
                assert_eq!(mp.0.len(), 1);
                assert_eq!(mp.0[0].interiors().len(), 1);
            }
            other => panic!("Expected MultiPolygon, got {:?}", other),
        }
    }

    #[test]
    fn test_properties() {
        let result = parse(SAMPLE, &building_filter()).unwrap();
        let casa = &result.features[1];
        assert_eq!(casa.properties["name"], Value::String("Casa".into()));
        assert_eq!(casa.properties["element_type"], Value::String("way".into()));
        assert_eq!(casa.properties["osmid"], Value::from(10u64));
    }

    #[test]
    fn test_point_is_lon_lat() {
        let result = parse(SAMPLE, &building_filter()).unwrap();
        match result.features[0].geometry {
            Geometry::Point(p) => {
                assert_eq!(p.x(), 3.37);
                assert_eq!(p.y(), 6.5);
            }
            ref other => panic!("Expected Point, got {:?}", other),
        }
    }

    #[test]
    fn test_runtime_error_remark() {
        let json = r#"{"elements": [], "remark": "runtime error: Query timed out in \"query\" at line 3 after 25 seconds."}"#;
        let err = parse(json, &building_filter()).unwrap_err();
        assert!(matches!(err, OverpassError::Remote(_)));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            parse("<html>", &building_filter()),
            Err(OverpassError::Json(_))
        ));
    }
}
