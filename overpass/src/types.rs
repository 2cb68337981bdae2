//! Types de données pour le crate overpass

use std::fmt;

use geo::Geometry;
use serde_json::{Map, Value};

use crate::OverpassError;

/// Résultat du parsing d'une réponse Overpass
#[derive(Debug, Default)]
pub struct ParseResult {
    /// Features retenues, dans l'ordre de la réponse
    pub features: Vec<Feature>,

    /// Nombre d'éléments ignorés (aucun tag demandé, relation non surfacique, ...)
    pub skipped: usize,

    /// Horodatage de la base OSM interrogée (`osm3s.timestamp_osm_base`)
    pub osm_base: Option<String>,

    /// Erreurs non fatales rencontrées pendant la construction des géométries
    pub errors: Vec<OverpassError>,
}

/// Une feature OSM avec sa géométrie et ses attributs
#[derive(Debug, Clone)]
pub struct Feature {
    /// Identifiant unique (`node/123`, `way/456`, `relation/789`)
    pub id: String,

    /// Géométrie en WGS84 (lon, lat)
    pub geometry: Geometry,

    /// Attributs : tags OSM + `element_type` et `osmid`
    pub properties: Map<String, Value>,
}

/// Type d'élément OSM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Node,
    Way,
    Relation,
}

impl ElementType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Way => "way",
            Self::Relation => "relation",
        }
    }

    /// Décalage ajouté à l'identifiant OSM pour obtenir un id de zone Overpass
    pub fn area_offset(self) -> Option<u64> {
        match self {
            Self::Node => None,
            Self::Way => Some(2_400_000_000),
            Self::Relation => Some(3_600_000_000),
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ElementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "node" | "N" => Ok(Self::Node),
            "way" | "W" => Ok(Self::Way),
            "relation" | "R" => Ok(Self::Relation),
            other => Err(format!("Unknown OSM element type: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_area_offset() {
        assert_eq!(ElementType::Node.area_offset(), None);
        assert_eq!(ElementType::Way.area_offset(), Some(2_400_000_000));
        assert_eq!(ElementType::Relation.area_offset(), Some(3_600_000_000));
    }

    #[test]
    fn test_element_type_from_str() {
        assert_eq!("relation".parse::<ElementType>().unwrap(), ElementType::Relation);
        assert_eq!("W".parse::<ElementType>().unwrap(), ElementType::Way);
        assert!("area".parse::<ElementType>().is_err());
    }
}
