#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Country and region boundary types.
//!
//! A [`Region`] is a first-level administrative unit of a country. It
//! carries a representative coordinate for point-based temperature
//! queries and, when loaded from a boundary dataset, the polygon used for
//! area-averaged vegetation queries.

pub mod countries;

use geo::MultiPolygon;
use serde::{Deserialize, Serialize};

/// A country from the ISO 3166-1 registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Country {
    /// ISO short name (e.g. "Japan").
    pub name: String,
    /// ISO 3166-1 alpha-3 code (e.g. "JPN").
    pub iso3: String,
}

impl Country {
    /// Creates a country.
    #[must_use]
    pub fn new(name: impl Into<String>, iso3: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            iso3: iso3.into(),
        }
    }
}

/// All registry countries, in registry order.
#[must_use]
pub fn all_countries() -> Vec<Country> {
    countries::COUNTRIES
        .iter()
        .map(|(name, iso3)| Country::new(*name, *iso3))
        .collect()
}

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinate {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

/// A first-level administrative region.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    /// Country the region belongs to.
    pub country: Country,
    /// Administrative unit name (GADM `NAME_1`).
    pub unit: String,
    /// Point used for climate queries (the polygon centroid).
    pub centroid: Coordinate,
    /// Region outline used for area-averaged imagery queries.
    pub boundary: Option<MultiPolygon<f64>>,
}

impl Region {
    /// Filesystem-safe key identifying this region in persisted outputs.
    #[must_use]
    pub fn key(&self) -> String {
        region_key(&self.country.name, &self.unit)
    }
}

/// Builds the persisted region key `"{country}_{unit}"` with every `/` and
/// space replaced by `_`.
#[must_use]
pub fn region_key(country: &str, unit: &str) -> String {
    format!("{country}_{unit}").replace(['/', ' '], "_")
}
