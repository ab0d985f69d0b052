//! NASA POWER daily point client.
//!
//! One `GET /api/temporal/daily/point` per region-year at the region's
//! centroid. The response carries one value per day keyed by `YYYYMMDD`
//! under `properties.parameter.<PARAM>`; days the service could not
//! compute are reported as the header's `fill_value` and dropped here.
//!
//! See <https://power.larc.nasa.gov/docs/services/api/temporal/daily/>

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use bloom_watch_config::PowerConfig;
use bloom_watch_geography_models::Region;
use bloom_watch_series_models::TemperatureSample;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::{SourceError, TemperatureSource, retry};

/// Fill value POWER uses when the header does not declare one.
pub const DEFAULT_FILL_VALUE: f64 = -999.0;

/// Raw POWER response, reduced to the fields we read.
#[derive(Debug, Deserialize)]
pub struct PowerResponse {
    properties: PowerProperties,
    #[serde(default)]
    header: Option<PowerHeader>,
}

#[derive(Debug, Deserialize)]
struct PowerProperties {
    parameter: BTreeMap<String, BTreeMap<String, Option<f64>>>,
}

#[derive(Debug, Deserialize)]
struct PowerHeader {
    #[serde(default)]
    fill_value: Option<f64>,
}

/// Temperature source backed by NASA POWER.
pub struct PowerTemperatureSource {
    client: reqwest::Client,
    config: PowerConfig,
}

impl PowerTemperatureSource {
    /// Creates a source using `client` for all requests.
    #[must_use]
    pub const fn new(client: reqwest::Client, config: PowerConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl TemperatureSource for PowerTemperatureSource {
    fn id(&self) -> &str {
        "nasa_power"
    }

    async fn fetch_temperature(
        &self,
        region: &Region,
        year: i32,
    ) -> Result<Vec<TemperatureSample>, SourceError> {
        let params = [
            ("start", format!("{year}0101")),
            ("end", format!("{year}1231")),
            ("latitude", region.centroid.latitude.to_string()),
            ("longitude", region.centroid.longitude.to_string()),
            ("parameters", self.config.parameter.clone()),
            ("format", "JSON".to_string()),
            ("community", self.config.community.clone()),
        ];
        let timeout = Duration::from_secs(self.config.timeout_secs);

        log::debug!(
            "{}: requesting {} for {year} at ({:.2}, {:.2})",
            region.key(),
            self.config.parameter,
            region.centroid.latitude,
            region.centroid.longitude,
        );

        let response: PowerResponse = retry::send_json(|| {
            self.client
                .get(&self.config.base_url)
                .query(&params)
                .timeout(timeout)
        })
        .await?;

        parse_power_response(response, &self.config.parameter)
    }
}

/// Extracts the daily series for `parameter`, dropping fill values and
/// nulls. Output is in ascending date order.
///
/// # Errors
///
/// Returns [`SourceError::Malformed`] if the parameter is missing or a
/// date key is not `YYYYMMDD`.
pub fn parse_power_response(
    response: PowerResponse,
    parameter: &str,
) -> Result<Vec<TemperatureSample>, SourceError> {
    let fill_value = response
        .header
        .and_then(|h| h.fill_value)
        .unwrap_or(DEFAULT_FILL_VALUE);

    let mut parameters = response.properties.parameter;
    let series = parameters
        .remove(parameter)
        .ok_or_else(|| SourceError::Malformed {
            message: format!("response has no {parameter} parameter"),
        })?;

    let mut samples = Vec::with_capacity(series.len());
    let mut dropped = 0usize;

    for (key, value) in series {
        let date = NaiveDate::parse_from_str(&key, "%Y%m%d").map_err(|e| {
            SourceError::Malformed {
                message: format!("invalid date key {key:?}: {e}"),
            }
        })?;

        match value {
            Some(v) if v.is_finite() && (v - fill_value).abs() > f64::EPSILON => {
                samples.push(TemperatureSample::new(date, v));
            }
            _ => dropped += 1,
        }
    }

    if dropped > 0 {
        log::warn!("Dropped {dropped} missing {parameter} values");
    }

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &serde_json::Value) -> Result<Vec<TemperatureSample>, SourceError> {
        let response: PowerResponse = serde_json::from_value(body.clone()).unwrap();
        parse_power_response(response, "T2M")
    }

    #[test]
    fn parses_daily_series() {
        let body = serde_json::json!({
            "type": "Feature",
            "properties": {"parameter": {"T2M": {
                "20240102": 7.25,
                "20240101": 3.5
            }}},
            "header": {"fill_value": -999.0}
        });
        let samples = parse(&body).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert!((samples[0].temperature - 3.5).abs() < 1e-12);
        assert!((samples[1].temperature - 7.25).abs() < 1e-12);
    }

    #[test]
    fn drops_fill_values_and_nulls() {
        let body = serde_json::json!({
            "properties": {"parameter": {"T2M": {
                "20240101": -999.0,
                "20240102": null,
                "20240103": 12.0
            }}}
        });
        let samples = parse(&body).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].date, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
    }

    #[test]
    fn missing_parameter_is_malformed() {
        let body = serde_json::json!({"properties": {"parameter": {"PRECTOTCORR": {}}}});
        assert!(matches!(parse(&body), Err(SourceError::Malformed { .. })));
    }

    #[test]
    fn bad_date_key_is_malformed() {
        let body = serde_json::json!({"properties": {"parameter": {"T2M": {"2024-01-01": 1.0}}}});
        assert!(matches!(parse(&body), Err(SourceError::Malformed { .. })));
    }
}
