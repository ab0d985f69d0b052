#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Time-series sources for vegetation index and temperature.
//!
//! Each external data provider implements [`VegetationSource`] or
//! [`TemperatureSource`]. The analysis core only ever sees the returned
//! sample vectors, so it can be exercised with synthetic data and no
//! network access.

pub mod imagery;
pub mod power;
pub mod progress;
pub mod retry;

use async_trait::async_trait;
use bloom_watch_geography_models::Region;
use bloom_watch_series_models::{TemperatureSample, VegetationSample};

/// Errors that can occur during data source operations.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The service answered with a non-success status.
    #[error("HTTP {status}")]
    Status {
        /// Response status.
        status: reqwest::StatusCode,
    },

    /// The region cannot be queried by this source (e.g. no polygon).
    #[error("Region {region} is not queryable: {message}")]
    Unqueryable {
        /// Region key.
        region: String,
        /// Why the region was rejected.
        message: String,
    },

    /// The response did not have the expected structure.
    #[error("Malformed response: {message}")]
    Malformed {
        /// Description of what went wrong.
        message: String,
    },
}

/// Supplier of per-region vegetation-index composites.
#[async_trait]
pub trait VegetationSource: Send + Sync {
    /// Returns a unique identifier for this source (e.g., `"imagery"`).
    fn id(&self) -> &str;

    /// Fetches every composite for `region` dated within `year`.
    ///
    /// Composites with no valid pixels are returned as
    /// [`VegetationSample::no_data`] rather than failing the region.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the request fails or the response is
    /// malformed.
    async fn fetch_vegetation(
        &self,
        region: &Region,
        year: i32,
    ) -> Result<Vec<VegetationSample>, SourceError>;
}

/// Supplier of per-region daily temperatures.
#[async_trait]
pub trait TemperatureSource: Send + Sync {
    /// Returns a unique identifier for this source (e.g., `"nasa_power"`).
    fn id(&self) -> &str;

    /// Fetches daily mean temperatures at the region's centroid for
    /// January 1 through December 31 of `year`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the request fails or the response is
    /// malformed.
    async fn fetch_temperature(
        &self,
        region: &Region,
        year: i32,
    ) -> Result<Vec<TemperatureSample>, SourceError>;
}
