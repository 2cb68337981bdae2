//! Tests d'intégration : requête + parsing via l'API publique

use geo::Geometry;
use overpass::{build_query, parse, ElementType, SearchArea, TagFilters};

const RESPONSE: &str = r#"{
  "version": 0.6,
  "generator": "Overpass API",
  "osm3s": {"timestamp_osm_base": "2024-06-01T00:00:00Z", "copyright": "ODbL"},
  "elements": [
    {"type": "node", "id": 501, "lat": 6.5166, "lon": 3.3805, "tags": {"amenity": "school", "name": "Yaba College"}},
    {"type": "way", "id": 601, "tags": {"landuse": "residential"},
     "geometry": [{"lat": 6.51, "lon": 3.37}, {"lat": 6.51, "lon": 3.38}, {"lat": 6.52, "lon": 3.38}, {"lat": 6.51, "lon": 3.37}]},
    {"type": "way", "id": 602, "tags": {"highway": "primary"},
     "geometry": [{"lat": 6.50, "lon": 3.37}, {"lat": 6.53, "lon": 3.39}]},
    {"type": "way", "id": 602, "tags": {"highway": "primary"},
     "geometry": [{"lat": 6.50, "lon": 3.37}, {"lat": 6.53, "lon": 3.39}]},
    {"type": "relation", "id": 701, "tags": {"type": "multipolygon", "natural": "water"},
     "members": [
       {"type": "node", "ref": 1, "role": "label", "lat": 6.5, "lon": 3.3},
       {"type": "way", "ref": 2, "role": "outer",
        "geometry": [{"lat": 6.50, "lon": 3.36}, {"lat": 6.50, "lon": 3.365}, {"lat": 6.505, "lon": 3.365}, {"lat": 6.50, "lon": 3.36}]}
     ]}
  ]
}"#;

fn config_filters() -> TagFilters {
    serde_json::from_str(
        r#"{"building": true, "highway": true, "amenity": true, "landuse": true, "natural": true}"#,
    )
    .unwrap()
}

#[test]
fn test_query_for_relation_area() {
    let area = SearchArea::from_element(ElementType::Relation, 3_718_182).unwrap();
    let query = build_query(&area, &config_filters(), 300).unwrap();

    assert!(query.contains("area(id:3603718182)->.searchArea;"));
    for key in ["building", "highway", "amenity", "landuse", "natural"] {
        assert!(
            query.contains(&format!("nwr[\"{}\"](area.searchArea);", key)),
            "missing selector for {}",
            key
        );
    }
}

#[test]
fn test_parse_mixed_response() {
    let result = parse(RESPONSE, &config_filters()).unwrap();

    assert!(result.errors.is_empty(), "errors: {:?}", result.errors);
    // le doublon way/602 n'est retenu qu'une fois
    assert_eq!(result.features.len(), 4);

    let kinds: Vec<&str> = result
        .features
        .iter()
        .map(|f| match f.geometry {
            Geometry::Point(_) => "point",
            Geometry::LineString(_) => "line",
            Geometry::Polygon(_) => "polygon",
            Geometry::MultiPolygon(_) => "multipolygon",
            _ => "other",
        })
        .collect();
    assert_eq!(kinds, vec!["point", "polygon", "line", "multipolygon"]);

    for feature in &result.features {
        assert!(feature.properties.contains_key("osmid"));
        assert!(feature.properties.contains_key("element_type"));
    }
}
