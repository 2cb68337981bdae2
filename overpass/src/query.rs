//! Construction des requêtes Overpass QL
//!
//! Un filtre de tags reprend la forme du fichier de configuration :
//! `{"building": true, "highway": ["primary", "secondary"], "amenity": "school"}`.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::types::ElementType;
use crate::OverpassError;

/// Valeur d'un filtre de tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    /// `true` : toute valeur, `false` : tag ignoré
    Any(bool),
    /// Valeur exacte
    Exact(String),
    /// Une valeur parmi la liste
    OneOf(Vec<String>),
}

impl TagValue {
    /// Le filtre sélectionne-t-il quelque chose ?
    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Any(enabled) => *enabled,
            Self::Exact(_) => true,
            Self::OneOf(values) => !values.is_empty(),
        }
    }

    /// Teste une valeur de tag
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Self::Any(enabled) => *enabled,
            Self::Exact(expected) => expected == value,
            Self::OneOf(values) => values.iter().any(|v| v == value),
        }
    }
}

/// Filtre complet, trié par clé pour des requêtes reproductibles
pub type TagFilters = BTreeMap<String, TagValue>;

/// Vrai si au moins un filtre actif correspond aux tags de l'élément
pub fn matches_any(filters: &TagFilters, tags: &BTreeMap<String, String>) -> bool {
    filters.iter().any(|(key, filter)| {
        tags.get(key)
            .map(|value| filter.matches(value))
            .unwrap_or(false)
    })
}

/// Zone de recherche Overpass
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchArea {
    /// Zone Overpass dérivée d'un way ou d'une relation
    Area(u64),
    /// Emprise (degrés WGS84)
    BoundingBox {
        south: f64,
        west: f64,
        north: f64,
        east: f64,
    },
}

impl SearchArea {
    /// Zone Overpass à partir d'un élément OSM (way ou relation uniquement)
    pub fn from_element(element_type: ElementType, osm_id: u64) -> Option<Self> {
        element_type
            .area_offset()
            .map(|offset| Self::Area(offset + osm_id))
    }

    fn validate(&self) -> Result<(), OverpassError> {
        if let Self::BoundingBox {
            south,
            west,
            north,
            east,
        } = *self
        {
            let finite = [south, west, north, east].iter().all(|v| v.is_finite());
            if !finite || south > north || west > east {
                return Err(OverpassError::InvalidArea(format!(
                    "({}, {}, {}, {})",
                    south, west, north, east
                )));
            }
            if !(-90.0..=90.0).contains(&south) || !(-90.0..=90.0).contains(&north) {
                return Err(OverpassError::InvalidArea(format!(
                    "latitude out of range: {} / {}",
                    south, north
                )));
            }
        }
        Ok(())
    }

    fn clause(&self) -> String {
        match *self {
            Self::Area(_) => "(area.searchArea)".to_string(),
            Self::BoundingBox {
                south,
                west,
                north,
                east,
            } => format!("({},{},{},{})", south, west, north, east),
        }
    }
}

/// Construit la requête Overpass QL (`out geom` : géométries inline)
pub fn build_query(
    area: &SearchArea,
    filters: &TagFilters,
    timeout_secs: u64,
) -> Result<String, OverpassError> {
    area.validate()?;

    let selectors = filters
        .iter()
        .filter(|(_, value)| value.is_enabled())
        .map(|(key, value)| tag_selector(key, value))
        .collect::<Result<Vec<_>, _>>()?;

    if selectors.is_empty() {
        return Err(OverpassError::EmptyFilter);
    }

    let mut query = String::new();
    // write! sur une String ne peut pas échouer
    let _ = writeln!(query, "[out:json][timeout:{}];", timeout_secs);
    if let SearchArea::Area(id) = area {
        let _ = writeln!(query, "area(id:{})->.searchArea;", id);
    }
    query.push_str("(\n");
    let clause = area.clause();
    for selector in &selectors {
        let _ = writeln!(query, "  nwr{}{};", selector, clause);
    }
    query.push_str(");\nout geom;\n");

    Ok(query)
}

fn tag_selector(key: &str, value: &TagValue) -> Result<String, OverpassError> {
    if key.trim().is_empty() {
        return Err(OverpassError::invalid_tag(key, "empty key"));
    }

    let selector = match value {
        TagValue::Any(_) => format!("[\"{}\"]", quote(key)),
        TagValue::Exact(v) => format!("[\"{}\"=\"{}\"]", quote(key), quote(v)),
        TagValue::OneOf(values) => {
            let alternatives = values
                .iter()
                .map(|v| escape_regex(v))
                .collect::<Vec<_>>()
                .join("|");
            format!("[\"{}\"~\"^({})$\"]", quote(key), quote(&alternatives))
        }
    };
    Ok(selector)
}

/// Échappe une chaîne pour un littéral Overpass QL entre guillemets
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

fn escape_regex(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(
            c,
            '\\' | '.' | '+' | '*' | '?' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$'
        ) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
