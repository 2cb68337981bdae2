//! Reconstruction des anneaux à partir des ways membres d'une relation

use geo::{Coord, LineString};

use crate::OverpassError;

/// Reconstruit des anneaux fermés à partir de ways non ordonnés
///
/// Les ways sont chaînés bout à bout (dans un sens ou dans l'autre).
/// Un anneau presque fermé est refermé automatiquement ; un fragment trop
/// court pour former un anneau est abandonné.
pub fn reconstruct_rings(
    relation_id: &str,
    ways: &[Vec<Coord>],
) -> Result<Vec<LineString>, OverpassError> {
    let mut remaining: Vec<Vec<Coord>> = ways.iter().filter(|w| w.len() >= 2).cloned().collect();
    if remaining.is_empty() {
        return Ok(Vec::new());
    }

    let mut rings = Vec::new();

    // D'abord, les ways qui bouclent sur eux-mêmes
    remaining.retain(|way| {
        if way.len() > 3 && coords_equal(way[0], way[way.len() - 1]) {
            rings.push(LineString::new(way.clone()));
            false
        } else {
            true
        }
    });

    while let Some(mut ring) = remaining.pop() {
        let mut made_progress = true;
        while made_progress && !remaining.is_empty() {
            made_progress = false;
            if coords_equal(ring[0], ring[ring.len() - 1]) {
                break;
            }
            let ring_first = ring[0];
            let ring_last = ring[ring.len() - 1];

            for i in (0..remaining.len()).rev() {
                let way_first = remaining[i][0];
                let way_last = remaining[i][remaining[i].len() - 1];

                if coords_equal(ring_last, way_first) {
                    let way = remaining.swap_remove(i);
                    ring.pop();
                    ring.extend(way);
                } else if coords_equal(ring_last, way_last) {
                    let way = remaining.swap_remove(i);
                    ring.pop();
                    ring.extend(way.into_iter().rev());
                } else if coords_equal(ring_first, way_last) {
                    let mut head = remaining.swap_remove(i);
                    head.pop();
                    head.extend(ring);
                    ring = head;
                } else if coords_equal(ring_first, way_first) {
                    let way = remaining.swap_remove(i);
                    let mut head: Vec<Coord> = way.into_iter().rev().collect();
                    head.pop();
                    head.extend(ring);
                    ring = head;
                } else {
                    continue;
                }
                made_progress = true;
                break;
            }
        }

        let is_closed = ring.len() > 1 && coords_equal(ring[0], ring[ring.len() - 1]);

        if is_closed && ring.len() > 3 {
            rings.push(LineString::new(ring));
        } else if ring.len() > 2 {
            tracing::warn!(
                relation = relation_id,
                points = ring.len(),
                "Auto-closing unclosed ring"
            );
            let first = ring[0];
            ring.push(first);
            rings.push(LineString::new(ring));
        } else {
            tracing::debug!(
                relation = relation_id,
                points = ring.len(),
                "Dropping ring fragment"
            );
        }
    }

    if rings.is_empty() {
        Err(OverpassError::invalid_geometry(
            relation_id,
            "could not reconstruct any closed ring",
        ))
    } else {
        Ok(rings)
    }
}

/// Compare deux coordonnées avec tolérance
pub(crate) fn coords_equal(a: Coord, b: Coord) -> bool {
    const TOLERANCE: f64 = 1e-9;
    (a.x - b.x).abs() < TOLERANCE && (a.y - b.y).abs() < TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(x: f64, y: f64) -> Coord {
        Coord { x, y }
    }

    #[test]
    fn test_reconstruct_from_segments() {
        let ways = vec![
            vec![c(0.0, 0.0), c(1.0, 0.0)],
            vec![c(1.0, 1.0), c(1.0, 0.0)],
            vec![c(1.0, 1.0), c(0.0, 1.0)],
            vec![c(0.0, 1.0), c(0.0, 0.0)],
        ];

        let rings = reconstruct_rings("relation/1", &ways).unwrap();
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0].0.len(), 5);
        assert_eq!(rings[0].0.first(), rings[0].0.last());
    }

    #[test]
    fn test_self_closing_way() {
        let ways = vec![vec![c(0.0, 0.0), c(1.0, 0.0), c(1.0, 1.0), c(0.0, 0.0)]];
        let rings = reconstruct_rings("relation/2", &ways).unwrap();
        assert_eq!(rings.len(), 1);
    }

    #[test]
    fn test_two_disjoint_rings() {
        let ways = vec![
            vec![c(0.0, 0.0), c(1.0, 0.0), c(1.0, 1.0), c(0.0, 0.0)],
            vec![c(5.0, 5.0), c(6.0, 5.0)],
            vec![c(6.0, 5.0), c(6.0, 6.0), c(5.0, 5.0)],
        ];
        let rings = reconstruct_rings("relation/3", &ways).unwrap();
        assert_eq!(rings.len(), 2);
    }

    #[test]
    fn test_only_fragments_fails() {
        let ways = vec![vec![c(0.0, 0.0), c(1.0, 0.0)]];
        assert!(reconstruct_rings("relation/4", &ways).is_err());
    }
}
