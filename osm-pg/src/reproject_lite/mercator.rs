//! Projection Web Mercator (EPSG:3857)
//!
//! Modèle sphérique de rayon équatorial, utilisé par les tuiles OSM.

use super::ellipsoid::WGS84;
use super::Geographic;

/// Latitude limite de la projection (carré de tuiles)
const MAX_LAT_DEG: f64 = 85.051_128_779_806_59;

/// Coordonnées géographiques → Web Mercator
pub fn geographic_to_web_mercator(geo: Geographic) -> (f64, f64) {
    let r = WGS84::A;
    let lat = geo
        .lat
        .clamp(-MAX_LAT_DEG.to_radians(), MAX_LAT_DEG.to_radians());

    let x = r * geo.lon;
    let y = r * (std::f64::consts::FRAC_PI_4 + lat / 2.0).tan().ln();

    (x, y)
}

/// Web Mercator → coordonnées géographiques
pub fn web_mercator_to_geographic(x: f64, y: f64) -> Geographic {
    let r = WGS84::A;
    let lon = x / r;
    let lat = 2.0 * (y / r).exp().atan() - std::f64::consts::FRAC_PI_2;

    Geographic::new(lon, lat)
}
