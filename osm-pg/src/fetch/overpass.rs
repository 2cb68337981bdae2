//! Téléchargement des features via l'API Overpass

use anyhow::{Context, Result};
use overpass::{build_query, ParseResult, SearchArea, TagFilters};
use tracing::{debug, info, warn};

use super::HttpClient;

/// Exécute la requête Overpass et parse la réponse (hors du runtime async)
pub async fn fetch_features(
    http: &HttpClient,
    url: &str,
    area: &SearchArea,
    filters: &TagFilters,
    timeout_secs: u64,
) -> Result<ParseResult> {
    let query = build_query(area, filters, timeout_secs).context("Failed to build Overpass query")?;
    debug!(query = %query, "Overpass query");

    let body = http
        .fetch_text("Overpass", |client| {
            client.post(url).form(&[("data", query.as_str())])
        })
        .await?;

    let filters = filters.clone();
    let result = tokio::task::spawn_blocking(move || overpass::parse(&body, &filters))
        .await
        .context("Overpass parsing task panicked")?
        .context("Failed to parse Overpass response")?;

    for err in &result.errors {
        warn!("Skipped OSM element: {}", err);
    }
    info!(
        features = result.features.len(),
        skipped = result.skipped,
        errors = result.errors.len(),
        osm_base = result.osm_base.as_deref().unwrap_or("-"),
        "Overpass response parsed"
    );

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::{client, serve};

    const RESPONSE: &str = r#"{
        "osm3s": {"timestamp_osm_base": "2024-05-01T00:00:00Z"},
        "elements": [
            {"type": "node", "id": 1, "lat": 6.5, "lon": 3.37, "tags": {"amenity": "school"}},
            {"type": "node", "id": 2, "lat": 6.5, "lon": 3.38, "tags": {"shop": "bakery"}}
        ]
    }"#;

    #[tokio::test]
    async fn test_fetch_and_parse() {
        let (url, hits) = serve(vec![(502, "".into()), (200, RESPONSE.into())]).await;
        let filters: TagFilters = serde_json::from_str(r#"{"amenity": true}"#).unwrap();

        let result = fetch_features(
            &client(2),
            &url,
            &SearchArea::Area(3_600_000_001),
            &filters,
            60,
        )
        .await
        .unwrap();

        assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 2);
        assert_eq!(result.features.len(), 1);
        assert_eq!(result.features[0].id, "node/1");
        assert_eq!(result.skipped, 1);
        assert_eq!(result.osm_base.as_deref(), Some("2024-05-01T00:00:00Z"));
    }
}
