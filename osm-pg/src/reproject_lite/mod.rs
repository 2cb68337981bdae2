//! Reprojection légère en Rust pur (sans dépendances externes)
//!
//! Couvre les systèmes usuels d'un extrait OSM :
//! - WGS84 (EPSG:4326), système des données Overpass
//! - Web Mercator (EPSG:3857)
//! - UTM WGS84 nord/sud (EPSG:326xx, EPSG:327xx)
//!
//! Toute paire de ces systèmes est supportée (passage par WGS84).

mod ellipsoid;
mod mercator;
mod smart;
mod utm;

pub use smart::SmartReprojector;
pub use utm::UtmZone;

use anyhow::{bail, Result};
use geo::{Coord, Geometry, MapCoords};

/// Point en coordonnées géographiques (radians)
#[derive(Debug, Clone, Copy)]
pub struct Geographic {
    /// Longitude en radians
    pub lon: f64,
    /// Latitude en radians
    pub lat: f64,
}

impl Geographic {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Convertit en degrés
    pub fn to_degrees(self) -> (f64, f64) {
        (self.lon.to_degrees(), self.lat.to_degrees())
    }

    /// Crée depuis des degrés
    pub fn from_degrees(lon_deg: f64, lat_deg: f64) -> Self {
        Self {
            lon: lon_deg.to_radians(),
            lat: lat_deg.to_radians(),
        }
    }
}

/// Système de coordonnées pris en charge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Crs {
    Wgs84,
    WebMercator,
    Utm(UtmZone),
}

impl Crs {
    fn from_epsg(epsg: u32) -> Option<Self> {
        match epsg {
            4326 => Some(Self::Wgs84),
            3857 => Some(Self::WebMercator),
            _ => UtmZone::from_epsg(epsg).map(Self::Utm),
        }
    }

    fn unproject(self, x: f64, y: f64) -> Geographic {
        match self {
            Self::Wgs84 => Geographic::from_degrees(x, y),
            Self::WebMercator => mercator::web_mercator_to_geographic(x, y),
            Self::Utm(zone) => utm::utm_to_geographic(x, y, zone),
        }
    }

    fn project(self, geo: Geographic) -> (f64, f64) {
        match self {
            Self::Wgs84 => geo.to_degrees(),
            Self::WebMercator => mercator::geographic_to_web_mercator(geo),
            Self::Utm(zone) => utm::geographic_to_utm(geo, zone),
        }
    }
}

/// Reprojection légère entre systèmes WGS84
#[derive(Debug, Clone, Copy)]
pub struct ReprojectorLite {
    source: Crs,
    target: Crs,
}

impl ReprojectorLite {
    /// Crée un nouveau reprojector
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self> {
        let Some(source) = Crs::from_epsg(source_epsg) else {
            bail!(
                "EPSG:{} is not supported without PROJ (supported: 4326, 3857, 32601-32660, 32701-32760)",
                source_epsg
            );
        };
        let Some(target) = Crs::from_epsg(target_epsg) else {
            bail!(
                "EPSG:{} is not supported without PROJ (supported: 4326, 3857, 32601-32660, 32701-32760)",
                target_epsg
            );
        };

        Ok(Self { source, target })
    }

    /// Vérifie si l'EPSG est pris en charge
    pub fn is_supported_epsg(epsg: u32) -> bool {
        Crs::from_epsg(epsg).is_some()
    }

    /// Vérifie si la reprojection est supportée
    pub fn is_supported(source: u32, target: u32) -> bool {
        Self::is_supported_epsg(source) && Self::is_supported_epsg(target)
    }

    /// Transforme un point (x, y) de la source vers la cible
    pub fn transform_point(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let geo = self.source.unproject(x, y);
        let (tx, ty) = self.target.project(geo);
        if !tx.is_finite() || !ty.is_finite() {
            bail!("Coordinate ({}, {}) cannot be reprojected", x, y);
        }
        Ok((tx, ty))
    }

    /// Transforme une géométrie (tous types, collections comprises)
    pub fn transform_geometry(&self, geom: &Geometry) -> Result<Geometry> {
        geom.try_map_coords(|c| {
            let (x, y) = self.transform_point(c.x, c.y)?;
            Ok(Coord { x, y })
        })
    }
}
