//! Règles "way fermé = surface ?"
//!
//! Reprend l'esprit des règles `polygon_features` de l'écosystème OSM :
//! une clé peut rendre toutes ses valeurs surfaciques, toutes sauf certaines,
//! ou seulement certaines.

use std::collections::BTreeMap;

enum Rule {
    All,
    Except(&'static [&'static str]),
    Only(&'static [&'static str]),
}

const RULES: &[(&str, Rule)] = &[
    ("building", Rule::All),
    ("building:part", Rule::All),
    ("landuse", Rule::All),
    ("amenity", Rule::All),
    ("leisure", Rule::All),
    ("shop", Rule::All),
    ("tourism", Rule::All),
    ("office", Rule::All),
    ("craft", Rule::All),
    ("historic", Rule::All),
    ("military", Rule::All),
    ("place", Rule::All),
    ("public_transport", Rule::All),
    ("golf", Rule::All),
    (
        "natural",
        Rule::Except(&["coastline", "cliff", "ridge", "arete", "tree_row"]),
    ),
    ("man_made", Rule::Except(&["cutline", "embankment", "pipeline"])),
    ("aeroway", Rule::Except(&["taxiway"])),
    ("waterway", Rule::Only(&["riverbank", "dock", "boatyard", "dam"])),
    ("highway", Rule::Only(&["services", "rest_area", "escape", "elevator"])),
    (
        "railway",
        Rule::Only(&["station", "turntable", "roundhouse", "platform"]),
    ),
    (
        "barrier",
        Rule::Only(&["city_wall", "ditch", "hedge", "retaining_wall", "spikes"]),
    ),
    (
        "power",
        Rule::Only(&["plant", "substation", "generator", "transformer"]),
    ),
];

/// Un way fermé portant ces tags doit-il devenir un polygone ?
pub fn is_area(tags: &BTreeMap<String, String>) -> bool {
    match tags.get("area").map(String::as_str) {
        Some("no") => return false,
        Some("yes") => return true,
        _ => {}
    }

    RULES.iter().any(|(key, rule)| {
        let Some(value) = tags.get(*key) else {
            return false;
        };
        if value == "no" {
            return false;
        }
        match rule {
            Rule::All => true,
            Rule::Except(excluded) => !excluded.contains(&value.as_str()),
            Rule::Only(allowed) => allowed.contains(&value.as_str()),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_building_is_area() {
        assert!(is_area(&tags(&[("building", "yes")])));
        assert!(!is_area(&tags(&[("building", "no")])));
    }

    #[test]
    fn test_highway_ring_is_line() {
        assert!(!is_area(&tags(&[("highway", "residential")])));
        assert!(is_area(&tags(&[("highway", "rest_area")])));
        assert!(is_area(&tags(&[("highway", "pedestrian"), ("area", "yes")])));
    }

    #[test]
    fn test_natural_exceptions() {
        assert!(is_area(&tags(&[("natural", "water")])));
        assert!(!is_area(&tags(&[("natural", "coastline")])));
    }

    #[test]
    fn test_area_no_wins() {
        assert!(!is_area(&tags(&[("amenity", "parking"), ("area", "no")])));
    }
}
