//! Réparation et arrondi des géométries

use geo::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point, Polygon,
};

/// Vrai si la géométrie ne contient aucune coordonnée
pub fn is_empty(geom: &Geometry) -> bool {
    match geom {
        Geometry::Point(_) | Geometry::Line(_) | Geometry::Rect(_) | Geometry::Triangle(_) => {
            false
        }
        Geometry::LineString(ls) => ls.0.is_empty(),
        Geometry::Polygon(p) => p.exterior().0.is_empty(),
        Geometry::MultiPoint(mp) => mp.0.is_empty(),
        Geometry::MultiLineString(mls) => mls.0.iter().all(|ls| ls.0.is_empty()),
        Geometry::MultiPolygon(mp) => mp.0.iter().all(|p| p.exterior().0.is_empty()),
        Geometry::GeometryCollection(gc) => gc.0.iter().all(is_empty),
    }
}

/// Ferme un anneau ouvert ; `None` s'il reste moins de 4 points
fn repair_ring(ring: &LineString) -> Option<LineString> {
    let mut coords: Vec<Coord> = ring.0.clone();
    coords.dedup();
    if let (Some(first), Some(last)) = (coords.first().copied(), coords.last().copied()) {
        if first != last {
            coords.push(first);
        }
    }
    (coords.len() >= 4).then(|| LineString::new(coords))
}

fn repair_line(line: &LineString) -> Option<LineString> {
    let mut coords: Vec<Coord> = line.0.clone();
    coords.dedup();
    (coords.len() >= 2).then(|| LineString::new(coords))
}

fn repair_polygon(poly: &Polygon) -> Option<Polygon> {
    let exterior = repair_ring(poly.exterior())?;
    let interiors = poly.interiors().iter().filter_map(repair_ring).collect();
    Some(Polygon::new(exterior, interiors))
}

/// Répare une géométrie : anneaux fermés, parties dégénérées supprimées
///
/// Retourne `None` si plus rien d'exploitable ne subsiste.
pub fn repair_geometry(geom: &Geometry) -> Option<Geometry> {
    let repaired = match geom {
        Geometry::Point(p) => {
            if !(p.x().is_finite() && p.y().is_finite()) {
                return None;
            }
            Geometry::Point(*p)
        }
        Geometry::MultiPoint(mp) => {
            if mp.0.is_empty() {
                return None;
            }
            Geometry::MultiPoint(mp.clone())
        }
        Geometry::LineString(ls) => Geometry::LineString(repair_line(ls)?),
        Geometry::MultiLineString(mls) => {
            let lines: Vec<LineString> = mls.0.iter().filter_map(repair_line).collect();
            if lines.is_empty() {
                return None;
            }
            Geometry::MultiLineString(MultiLineString::new(lines))
        }
        Geometry::Polygon(p) => Geometry::Polygon(repair_polygon(p)?),
        Geometry::MultiPolygon(mp) => {
            let polys: Vec<Polygon> = mp.0.iter().filter_map(repair_polygon).collect();
            if polys.is_empty() {
                return None;
            }
            Geometry::MultiPolygon(MultiPolygon::new(polys))
        }
        Geometry::GeometryCollection(gc) => {
            let parts: Vec<Geometry> = gc.0.iter().filter_map(repair_geometry).collect();
            if parts.is_empty() {
                return None;
            }
            Geometry::GeometryCollection(GeometryCollection::new_from(parts))
        }
        other => other.clone(),
    };
    Some(repaired)
}

/// Arrondit les coordonnées d'une géométrie à la précision spécifiée
pub fn round_geometry_coords(geom: &Geometry, decimals: u8) -> Geometry {
    let factor = 10_f64.powi(decimals as i32);

    let round_coord = |c: &Coord| -> Coord {
        Coord {
            x: (c.x * factor).round() / factor,
            y: (c.y * factor).round() / factor,
        }
    };

    let round_line = |ls: &LineString| -> LineString {
        LineString::new(ls.0.iter().map(round_coord).collect())
    };

    let round_polygon = |poly: &Polygon| -> Polygon {
        let exterior = round_line(poly.exterior());
        let interiors: Vec<LineString> = poly.interiors().iter().map(round_line).collect();
        Polygon::new(exterior, interiors)
    };

    match geom {
        Geometry::Point(p) => Geometry::Point(Point::from(round_coord(&p.0))),
        Geometry::LineString(ls) => Geometry::LineString(round_line(ls)),
        Geometry::Polygon(poly) => Geometry::Polygon(round_polygon(poly)),
        Geometry::MultiPoint(mp) => {
            let points: Vec<Point> = mp.0.iter().map(|p| Point::from(round_coord(&p.0))).collect();
            Geometry::MultiPoint(MultiPoint::new(points))
        }
        Geometry::MultiLineString(mls) => {
            let lines: Vec<LineString> = mls.0.iter().map(round_line).collect();
            Geometry::MultiLineString(MultiLineString::new(lines))
        }
        Geometry::MultiPolygon(mpoly) => {
            let polys: Vec<Polygon> = mpoly.0.iter().map(round_polygon).collect();
            Geometry::MultiPolygon(MultiPolygon::new(polys))
        }
        Geometry::GeometryCollection(gc) => Geometry::GeometryCollection(
            GeometryCollection::new_from(
                gc.0.iter()
                    .map(|g| round_geometry_coords(g, decimals))
                    .collect(),
            ),
        ),
        other => other.clone(),
    }
}
