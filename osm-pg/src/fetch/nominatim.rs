//! Géocodage d'un nom de lieu via Nominatim

use anyhow::{anyhow, bail, Context, Result};
use overpass::{ElementType, SearchArea};
use serde::Deserialize;
use tracing::info;

use super::HttpClient;

/// Premier résultat Nominatim (`format=jsonv2`)
#[derive(Debug, Clone, Deserialize)]
pub struct Place {
    pub osm_type: Option<String>,
    pub osm_id: Option<u64>,
    #[serde(default)]
    pub display_name: String,
    /// `[south, north, west, east]` en chaînes
    #[serde(default)]
    pub boundingbox: Vec<String>,
}

impl Place {
    /// Zone Overpass (way/relation) ou, à défaut, emprise du résultat
    pub fn search_area(&self) -> Result<SearchArea> {
        let element = self
            .osm_type
            .as_deref()
            .and_then(|t| t.parse::<ElementType>().ok());
        if let (Some(element), Some(id)) = (element, self.osm_id) {
            if let Some(area) = SearchArea::from_element(element, id) {
                return Ok(area);
            }
        }

        let bbox: Vec<f64> = self
            .boundingbox
            .iter()
            .map(|v| v.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .with_context(|| format!("Invalid bounding box for '{}'", self.display_name))?;
        let [south, north, west, east] = bbox[..] else {
            bail!("No usable area or bounding box for '{}'", self.display_name);
        };
        Ok(SearchArea::BoundingBox {
            south,
            west,
            north,
            east,
        })
    }
}

/// Parse la réponse de recherche et retourne le premier résultat
pub fn parse_search_response(body: &str, location: &str) -> Result<Place> {
    let places: Vec<Place> =
        serde_json::from_str(body).context("Invalid Nominatim response")?;
    places
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("Location not found: {}", location))
}

/// Géocode `location` et retourne la zone de recherche Overpass
pub async fn geocode(http: &HttpClient, url: &str, location: &str) -> Result<SearchArea> {
    let body = http
        .fetch_text("Nominatim", |client| {
            client
                .get(url)
                .query(&[("q", location), ("format", "jsonv2"), ("limit", "1")])
        })
        .await?;

    let place = parse_search_response(&body, location)?;
    let area = place.search_area()?;
    info!(location, found = %place.display_name, area = ?area, "Location geocoded");
    Ok(area)
}
