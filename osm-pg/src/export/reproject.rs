//! Reprojection de géométries avec PROJ
//!
//! Ce module est disponible uniquement avec le feature `reproject`.

use anyhow::{Context, Result};
use geo::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point, Polygon,
};
use proj::Proj;

/// Reprojection de géométries entre deux systèmes de coordonnées
pub struct Reprojector {
    proj: Proj,
    source_epsg: u32,
    target_epsg: u32,
}

impl Reprojector {
    /// Crée un nouveau reprojector entre deux EPSG
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self> {
        let source = format!("EPSG:{}", source_epsg);
        let target = format!("EPSG:{}", target_epsg);

        // Ordre d'axes lon/lat (x, y) quel que soit l'EPSG
        let proj = Proj::new_known_crs(&source, &target, None).with_context(|| {
            format!("Failed to create projection from {} to {}", source, target)
        })?;

        Ok(Self {
            proj,
            source_epsg,
            target_epsg,
        })
    }

    pub fn source_epsg(&self) -> u32 {
        self.source_epsg
    }

    pub fn target_epsg(&self) -> u32 {
        self.target_epsg
    }

    /// Transforme une géométrie
    pub fn transform_geometry(&self, geom: &Geometry) -> Result<Geometry> {
        let transformed = match geom {
            Geometry::Point(p) => Geometry::Point(self.transform_point(p)?),
            Geometry::Line(line) => {
                let ls = self.transform_linestring(&LineString::new(vec![line.start, line.end]))?;
                Geometry::LineString(ls)
            }
            Geometry::LineString(ls) => Geometry::LineString(self.transform_linestring(ls)?),
            Geometry::Polygon(p) => Geometry::Polygon(self.transform_polygon(p)?),
            Geometry::MultiPoint(mp) => {
                let points: Result<Vec<Point>> =
                    mp.0.iter().map(|p| self.transform_point(p)).collect();
                Geometry::MultiPoint(MultiPoint::new(points?))
            }
            Geometry::MultiLineString(mls) => {
                let lines: Result<Vec<LineString>> = mls
                    .0
                    .iter()
                    .map(|ls| self.transform_linestring(ls))
                    .collect();
                Geometry::MultiLineString(MultiLineString::new(lines?))
            }
            Geometry::MultiPolygon(mp) => {
                let polys: Result<Vec<Polygon>> =
                    mp.0.iter().map(|p| self.transform_polygon(p)).collect();
                Geometry::MultiPolygon(MultiPolygon::new(polys?))
            }
            Geometry::GeometryCollection(gc) => {
                let geometries: Result<Vec<Geometry>> =
                    gc.0.iter().map(|g| self.transform_geometry(g)).collect();
                Geometry::GeometryCollection(GeometryCollection::new_from(geometries?))
            }
            Geometry::Rect(rect) => Geometry::Polygon(self.transform_polygon(&rect.to_polygon())?),
            Geometry::Triangle(triangle) => {
                Geometry::Polygon(self.transform_polygon(&triangle.to_polygon())?)
            }
        };
        Ok(transformed)
    }

    fn transform_point(&self, p: &Point) -> Result<Point> {
        let (x, y) = self
            .proj
            .convert((p.x(), p.y()))
            .context("Coordinate transformation failed")?;
        Ok(Point::new(x, y))
    }

    /// Transforme une LineString (conversion par lot)
    fn transform_linestring(&self, ls: &LineString) -> Result<LineString> {
        let mut coords: Vec<(f64, f64)> = ls.0.iter().map(|c| (c.x, c.y)).collect();

        self.proj
            .convert_array(&mut coords)
            .context("Batch coordinate transformation failed")?;

        let result: Vec<Coord> = coords.into_iter().map(|(x, y)| Coord { x, y }).collect();
        Ok(LineString::new(result))
    }

    fn transform_polygon(&self, p: &Polygon) -> Result<Polygon> {
        let exterior = self.transform_linestring(p.exterior())?;
        let interiors: Result<Vec<LineString>> = p
            .interiors()
            .iter()
            .map(|ls| self.transform_linestring(ls))
            .collect();
        Ok(Polygon::new(exterior, interiors?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wgs84_to_lambert93() {
        // Paris : 2.35°E, 48.85°N → Lambert-93 ≈ (652 000, 6 862 000)
        let reprojector = Reprojector::new(4326, 2154).unwrap();

        let paris = Geometry::Point(Point::new(2.35, 48.85));
        let Geometry::Point(p) = reprojector.transform_geometry(&paris).unwrap() else {
            panic!("Expected Point geometry");
        };

        assert!((p.x() - 652_000.0).abs() < 2_000.0, "x={}", p.x());
        assert!((p.y() - 6_862_000.0).abs() < 2_000.0, "y={}", p.y());
    }

    #[test]
    fn test_polygon_transform() {
        let reprojector = Reprojector::new(4326, 32631).unwrap();

        let poly = Geometry::Polygon(Polygon::new(
            LineString::from(vec![
                (3.37, 6.52),
                (3.38, 6.52),
                (3.38, 6.53),
                (3.37, 6.53),
                (3.37, 6.52),
            ]),
            vec![],
        ));

        let Geometry::Polygon(p) = reprojector.transform_geometry(&poly).unwrap() else {
            panic!("Expected Polygon geometry");
        };
        assert_eq!(p.exterior().0.len(), 5);
        let first = &p.exterior().0[0];
        assert!((first.x - 540_900.0).abs() < 1_000.0, "x={}", first.x);
        assert!((first.y - 720_700.0).abs() < 1_000.0, "y={}", first.y);
    }

    #[test]
    fn test_invalid_epsg() {
        assert!(Reprojector::new(99999, 4326).is_err());
    }
}
