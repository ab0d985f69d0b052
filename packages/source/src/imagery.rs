//! Imagery reduction-service client.
//!
//! Posts the region polygon and a date window to a service that reduces
//! every composite of an image collection to its mean band value over the
//! polygon. The service answers with one feature per composite:
//!
//! ```json
//! {"features": [{"properties": {"date": "2024-01-01", "NDVI": 4200}}]}
//! ```
//!
//! Band values arrive in the collection's stored units and are multiplied
//! by [`ImageryConfig::scale_factor`] to land on the unit index scale.
//! A composite with no valid pixels in the polygon comes back with a null
//! (or missing) band value and is kept as a no-data sample.

use async_trait::async_trait;
use bloom_watch_config::ImageryConfig;
use bloom_watch_geography_models::Region;
use bloom_watch_series_models::VegetationSample;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{SourceError, VegetationSource, retry};

/// Request body sent to the reduction service.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReduceRequest<'a> {
    collection: &'a str,
    band: &'a str,
    start: String,
    end: String,
    scale: f64,
    max_pixels: f64,
    reducer: &'static str,
    geometry: geojson::Geometry,
}

/// Reduction response, one feature per composite.
#[derive(Debug, Deserialize)]
pub struct ReduceResponse {
    #[serde(default)]
    features: Vec<ReducedFeature>,
}

#[derive(Debug, Deserialize)]
struct ReducedFeature {
    #[serde(default)]
    properties: serde_json::Map<String, serde_json::Value>,
}

/// Vegetation source backed by an imagery reduction service.
pub struct ImageryVegetationSource {
    client: reqwest::Client,
    config: ImageryConfig,
    token: Option<String>,
}

impl ImageryVegetationSource {
    /// Creates a source using `client` for all requests.
    ///
    /// If the config names a token environment variable and it is set, its
    /// value is sent as a bearer token.
    #[must_use]
    pub fn new(client: reqwest::Client, config: ImageryConfig) -> Self {
        let token = config
            .token_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|t| !t.is_empty());
        Self {
            client,
            config,
            token,
        }
    }
}

#[async_trait]
impl VegetationSource for ImageryVegetationSource {
    fn id(&self) -> &str {
        "imagery"
    }

    async fn fetch_vegetation(
        &self,
        region: &Region,
        year: i32,
    ) -> Result<Vec<VegetationSample>, SourceError> {
        let Some(boundary) = region.boundary.as_ref() else {
            return Err(SourceError::Unqueryable {
                region: region.key(),
                message: "no boundary polygon".to_string(),
            });
        };

        let collection =
            self.config
                .collection_for_year(year)
                .ok_or_else(|| SourceError::Unqueryable {
                    region: region.key(),
                    message: format!("no image collection configured for {year}"),
                })?;

        let request = ReduceRequest {
            collection,
            band: &self.config.band,
            start: format!("{year}-01-01"),
            end: format!("{}-01-01", year + 1),
            scale: self.config.scale_meters,
            max_pixels: self.config.max_pixels,
            reducer: "mean",
            geometry: geojson::Geometry::new(geojson::Value::from(boundary)),
        };

        log::debug!("{}: reducing {collection} for {year}", region.key());

        let response: ReduceResponse = retry::send_json(|| {
            let builder = self.client.post(&self.config.base_url).json(&request);
            match &self.token {
                Some(token) => builder.bearer_auth(token),
                None => builder,
            }
        })
        .await?;

        parse_reduce_response(response, &self.config.band, self.config.scale_factor)
    }
}

/// Converts a reduction response into samples sorted by date, scaling
/// each band value by `scale_factor`.
///
/// # Errors
///
/// Returns [`SourceError::Malformed`] if a feature lacks a parseable
/// `date` property or carries a non-numeric band value.
pub fn parse_reduce_response(
    response: ReduceResponse,
    band: &str,
    scale_factor: f64,
) -> Result<Vec<VegetationSample>, SourceError> {
    let mut samples = Vec::with_capacity(response.features.len());

    for feature in response.features {
        let props = feature.properties;
        let date = props
            .get("date")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| SourceError::Malformed {
                message: "feature without a date property".to_string(),
            })
            .and_then(|s| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| SourceError::Malformed {
                    message: format!("invalid date {s:?}: {e}"),
                })
            })?;

        let sample = match props.get(band) {
            None | Some(serde_json::Value::Null) => VegetationSample::no_data(date),
            Some(value) => {
                let v = value.as_f64().ok_or_else(|| SourceError::Malformed {
                    message: format!("{band} on {date} is not a number: {value}"),
                })?;
                VegetationSample::new(date, v * scale_factor)
            }
        };
        samples.push(sample);
    }

    samples.sort_by_key(|s| s.date);
    Ok(samples)
}
