//! GADM 4.1 level-1 boundary fetcher.
//!
//! Downloads `gadm41_{ISO3}_1.json` for a country and converts each
//! feature into a [`Region`]. Countries without a published file answer
//! 404, which is reported as [`GeographyError::NotFound`] so the caller can
//! skip them.

use std::time::Duration;

use async_trait::async_trait;
use bloom_watch_config::BoundaryConfig;
use bloom_watch_geography_models::{Coordinate, Country, Region};
use geo::{Centroid, MultiPolygon};
use geojson::GeoJson;

use crate::{BoundarySource, GeographyError};

/// Maximum retry attempts for transient failures.
const MAX_RETRIES: u32 = 3;

/// Property holding the level-1 unit name.
const NAME_PROPERTY: &str = "NAME_1";

/// Boundary source backed by the GADM download site.
pub struct GadmBoundarySource {
    client: reqwest::Client,
    config: BoundaryConfig,
}

impl GadmBoundarySource {
    /// Creates a source using `client` for all requests.
    #[must_use]
    pub const fn new(client: reqwest::Client, config: BoundaryConfig) -> Self {
        Self { client, config }
    }

    async fn fetch_body(&self, country: &Country) -> Result<String, GeographyError> {
        let url = self.config.url_for(&country.iso3);
        let timeout = Duration::from_secs(self.config.timeout_secs);
        let mut last_error: Option<GeographyError> = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = Duration::from_secs(1u64 << attempt);
                log::warn!(
                    "{} boundaries: retry {attempt}/{MAX_RETRIES} in {delay:?}...",
                    country.iso3
                );
                tokio::time::sleep(delay).await;
            }

            let resp = match self.client.get(&url).timeout(timeout).send().await {
                Ok(r) => r,
                Err(e) if e.is_timeout() || e.is_connect() => {
                    log::warn!("{} boundaries: transient error: {e}", country.iso3);
                    last_error = Some(e.into());
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = resp.status();
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(GeographyError::NotFound {
                    iso3: country.iso3.clone(),
                });
            }
            if status.is_server_error() {
                log::warn!("{} boundaries: HTTP {status}", country.iso3);
                last_error = Some(GeographyError::Status {
                    iso3: country.iso3.clone(),
                    status,
                });
                continue;
            }
            if !status.is_success() {
                return Err(GeographyError::Status {
                    iso3: country.iso3.clone(),
                    status,
                });
            }

            return Ok(resp.text().await?);
        }

        Err(last_error.unwrap_or_else(|| GeographyError::Conversion {
            message: format!("{} boundaries: request failed after all retries", country.iso3),
        }))
    }
}

#[async_trait]
impl BoundarySource for GadmBoundarySource {
    async fn regions(&self, country: &Country) -> Result<Vec<Region>, GeographyError> {
        log::debug!("Fetching level-1 boundaries for {} ({})", country.name, country.iso3);
        let body = self.fetch_body(country).await?;
        parse_regions(country, &body)
    }
}

/// Parses a GADM level-1 `FeatureCollection` into regions.
///
/// Features without a usable name or polygon are skipped with a warning.
///
/// # Errors
///
/// Returns [`GeographyError::Conversion`] if the body is not a `GeoJSON`
/// `FeatureCollection`.
pub fn parse_regions(country: &Country, body: &str) -> Result<Vec<Region>, GeographyError> {
    let geojson: GeoJson = body.parse().map_err(|e| GeographyError::Conversion {
        message: format!("Failed to parse boundaries for {}: {e}", country.iso3),
    })?;

    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(GeographyError::Conversion {
            message: format!("Boundaries for {} are not a FeatureCollection", country.iso3),
        });
    };

    let mut regions = Vec::with_capacity(collection.features.len());
    for feature in collection.features {
        let Some(unit) = feature
            .property(NAME_PROPERTY)
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
        else {
            log::warn!("{}: feature without {NAME_PROPERTY}, skipping", country.iso3);
            continue;
        };

        let Some(boundary) = feature.geometry.and_then(to_multipolygon) else {
            log::warn!("{}: {unit} has no polygon geometry, skipping", country.iso3);
            continue;
        };

        let Some(centroid) = boundary.centroid() else {
            log::warn!("{}: {unit} has an empty polygon, skipping", country.iso3);
            continue;
        };

        regions.push(Region {
            country: country.clone(),
            unit,
            centroid: Coordinate {
                latitude: centroid.y(),
                longitude: centroid.x(),
            },
            boundary: Some(boundary),
        });
    }

    Ok(regions)
}

fn to_multipolygon(geometry: geojson::Geometry) -> Option<MultiPolygon<f64>> {
    let geometry: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geometry {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn japan() -> Country {
        Country::new("Japan", "JPN")
    }

    #[test]
    fn parses_polygon_and_centroid() {
        let body = serde_json::json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {"NAME_1": "Aichi", "GID_1": "JPN.1_1"},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[136.0, 34.0], [138.0, 34.0], [138.0, 36.0], [136.0, 36.0], [136.0, 34.0]]]
                }
            }]
        })
        .to_string();

        let regions = parse_regions(&japan(), &body).unwrap();
        assert_eq!(regions.len(), 1);
        let region = &regions[0];
        assert_eq!(region.unit, "Aichi");
        assert_eq!(region.key(), "Japan_Aichi");
        assert!((region.centroid.latitude - 35.0).abs() < 1e-9);
        assert!((region.centroid.longitude - 137.0).abs() < 1e-9);
        assert!(region.boundary.is_some());
    }

    #[test]
    fn skips_features_without_name_or_polygon() {
        let body = serde_json::json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {},
                    "geometry": {"type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]}
                },
                {
                    "type": "Feature",
                    "properties": {"NAME_1": "Dot"},
                    "geometry": {"type": "Point", "coordinates": [1.0, 1.0]}
                },
                {
                    "type": "Feature",
                    "properties": {"NAME_1": "Tokyo"},
                    "geometry": {
                        "type": "MultiPolygon",
                        "coordinates": [[[[139.0, 35.0], [140.0, 35.0], [140.0, 36.0], [139.0, 35.0]]]]
                    }
                }
            ]
        })
        .to_string();

        let regions = parse_regions(&japan(), &body).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].unit, "Tokyo");
    }

    #[test]
    fn empty_collection_yields_no_regions() {
        let body = r#"{"type": "FeatureCollection", "features": []}"#;
        assert!(parse_regions(&japan(), body).unwrap().is_empty());
    }

    #[test]
    fn rejects_non_collection() {
        let body = r#"{"type": "Point", "coordinates": [1.0, 2.0]}"#;
        assert!(matches!(
            parse_regions(&japan(), body),
            Err(GeographyError::Conversion { .. })
        ));
    }
}
