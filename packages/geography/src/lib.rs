#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Administrative boundary loading.
//!
//! Regions are read from the GADM level-1 boundary dataset: one
//! `FeatureCollection` per country, one feature per first-level
//! subdivision. Each feature becomes a [`Region`] carrying its polygon and
//! the polygon's centroid.

pub mod gadm;

use async_trait::async_trait;
use bloom_watch_geography_models::{Country, Region};
use thiserror::Error;

/// Errors that can occur during geography operations.
#[derive(Debug, Error)]
pub enum GeographyError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The boundary dataset has no file for this country.
    #[error("No boundaries published for {iso3}")]
    NotFound {
        /// Country code that was requested.
        iso3: String,
    },

    /// The boundary service answered with a non-success status.
    #[error("Boundary request for {iso3} failed with HTTP {status}")]
    Status {
        /// Country code that was requested.
        iso3: String,
        /// Response status.
        status: reqwest::StatusCode,
    },

    /// Data conversion error.
    #[error("Conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// Supplier of first-level regions for a country.
#[async_trait]
pub trait BoundarySource: Send + Sync {
    /// Returns the country's regions in dataset order. An empty vector means
    /// the country has no level-1 subdivisions.
    ///
    /// # Errors
    ///
    /// Returns [`GeographyError`] if the boundaries cannot be fetched or
    /// parsed.
    async fn regions(&self, country: &Country) -> Result<Vec<Region>, GeographyError>;
}
