//! Assemblage des relations multipolygones

pub mod ring;

use geo::{Contains, Coord, LineString, MultiPolygon, Polygon};
use tracing::warn;

use crate::OverpassError;

pub use ring::reconstruct_rings;

/// Rôle d'un way membre dans une relation surfacique
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingRole {
    Outer,
    Inner,
}

impl RingRole {
    /// Les rôles vides ou inconnus sont traités comme `outer`
    pub fn from_role(role: &str) -> Self {
        if role.eq_ignore_ascii_case("inner") {
            Self::Inner
        } else {
            Self::Outer
        }
    }
}

/// Construit un MultiPolygon à partir des ways membres d'une relation
///
/// Chaque trou est rattaché au premier anneau extérieur qui le contient ;
/// un trou orphelin est abandonné.
pub fn build_multipolygon(
    relation_id: &str,
    members: &[(RingRole, Vec<Coord>)],
) -> Result<MultiPolygon, OverpassError> {
    let outer: Vec<Vec<Coord>> = members
        .iter()
        .filter(|(role, _)| *role == RingRole::Outer)
        .map(|(_, coords)| coords.clone())
        .collect();
    let inner: Vec<Vec<Coord>> = members
        .iter()
        .filter(|(role, _)| *role == RingRole::Inner)
        .map(|(_, coords)| coords.clone())
        .collect();

    let shells = reconstruct_rings(relation_id, &outer)?;
    if shells.is_empty() {
        return Err(OverpassError::invalid_geometry(relation_id, "no outer ring"));
    }

    let holes = if inner.is_empty() {
        Vec::new()
    } else {
        match reconstruct_rings(relation_id, &inner) {
            Ok(rings) => rings,
            Err(e) => {
                warn!(relation = relation_id, "Ignoring inner rings: {}", e);
                Vec::new()
            }
        }
    };

    let probes: Vec<Polygon> = shells
        .iter()
        .map(|shell| Polygon::new(shell.clone(), vec![]))
        .collect();
    let mut interiors: Vec<Vec<LineString>> = vec![Vec::new(); shells.len()];

    for hole in holes {
        match probes.iter().position(|shell| shell.contains(&hole)) {
            Some(idx) => interiors[idx].push(hole),
            None => warn!(relation = relation_id, "Dropping orphan inner ring"),
        }
    }

    let polygons = shells
        .into_iter()
        .zip(interiors)
        .map(|(exterior, holes)| Polygon::new(exterior, holes))
        .collect();

    Ok(MultiPolygon::new(polygons))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, size: f64) -> Vec<Coord> {
        vec![
            Coord { x: x0, y: y0 },
            Coord { x: x0 + size, y: y0 },
            Coord { x: x0 + size, y: y0 + size },
            Coord { x: x0, y: y0 + size },
            Coord { x: x0, y: y0 },
        ]
    }

    #[test]
    fn test_hole_assigned_to_containing_shell() {
        let members = vec![
            (RingRole::Outer, square(0.0, 0.0, 10.0)),
            (RingRole::Outer, square(20.0, 0.0, 10.0)),
            (RingRole::Inner, square(22.0, 2.0, 2.0)),
        ];

        let mp = build_multipolygon("relation/1", &members).unwrap();
        assert_eq!(mp.0.len(), 2);
        let with_hole = mp.0.iter().filter(|p| p.interiors().len() == 1).count();
        assert_eq!(with_hole, 1);
        assert_eq!(mp.0[1].interiors().len(), 1);
    }

    #[test]
    fn test_orphan_hole_dropped() {
        let members = vec![
            (RingRole::Outer, square(0.0, 0.0, 1.0)),
            (RingRole::Inner, square(50.0, 50.0, 1.0)),
        ];
        let mp = build_multipolygon("relation/2", &members).unwrap();
        assert_eq!(mp.0.len(), 1);
        assert!(mp.0[0].interiors().is_empty());
    }

    #[test]
    fn test_no_outer_is_error() {
        let members = vec![(RingRole::Inner, square(0.0, 0.0, 1.0))];
        assert!(build_multipolygon("relation/3", &members).is_err());
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!(RingRole::from_role("inner"), RingRole::Inner);
        assert_eq!(RingRole::from_role("outer"), RingRole::Outer);
        assert_eq!(RingRole::from_role(""), RingRole::Outer);
    }
}
