#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Time-series record types shared across the bloom-watch pipeline.
//!
//! Raw samples come out of the fetchers as [`VegetationSample`] and
//! [`TemperatureSample`]. The aligner joins them into [`AlignedRecord`]s,
//! the degree-day accumulator turns those into [`MergedRecord`]s, and a
//! full calendar year of merged records for one region is a
//! [`RegionYearDataset`], the unit that gets persisted.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Value reported by the imagery source when a spatial reduction found no
/// valid pixels.
pub const NO_DATA_SENTINEL: f64 = -9999.0;

/// A single vegetation-index observation at the satellite's native cadence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VegetationSample {
    /// Composite date.
    pub date: NaiveDate,
    /// Spatial mean of the index on the unit scale (NDVI in `-1.0..=1.0`),
    /// or [`NO_DATA_SENTINEL`]. Slope thresholds and peak heights are
    /// expressed on the same scale.
    pub index_value: f64,
}

impl VegetationSample {
    /// Creates a sample with a measured value.
    #[must_use]
    pub const fn new(date: NaiveDate, index_value: f64) -> Self {
        Self { date, index_value }
    }

    /// Creates a sample marking a composite with no valid pixels.
    #[must_use]
    pub const fn no_data(date: NaiveDate) -> Self {
        Self {
            date,
            index_value: NO_DATA_SENTINEL,
        }
    }

    /// Returns `true` if this sample carries a usable measurement.
    ///
    /// Sentinel and non-finite values are never valid.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_valid(&self) -> bool {
        self.index_value.is_finite() && self.index_value != NO_DATA_SENTINEL
    }
}

/// A daily mean surface temperature from the climate point API.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemperatureSample {
    /// Calendar day.
    pub date: NaiveDate,
    /// Mean temperature at 2 m, degrees Celsius.
    pub temperature: f64,
}

impl TemperatureSample {
    /// Creates a new temperature sample.
    #[must_use]
    pub const fn new(date: NaiveDate, temperature: f64) -> Self {
        Self { date, temperature }
    }
}

/// A day on which both an interpolated vegetation value and a temperature
/// exist.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignedRecord {
    /// Calendar day.
    pub date: NaiveDate,
    /// Daily mean temperature.
    pub temperature: f64,
    /// Vegetation index interpolated to this day.
    pub vegetation_index: f64,
}

/// An aligned record annotated with degree-day values and the peak flag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedRecord {
    /// Calendar day.
    pub date: NaiveDate,
    /// Daily mean temperature.
    pub temperature: f64,
    /// Vegetation index interpolated to this day.
    pub vegetation_index: f64,
    /// `max(0, temperature - base_temperature)`.
    pub daily_degree_days: f64,
    /// Running sum of `daily_degree_days` from the first record of the
    /// region-year.
    pub cumulative_degree_days: f64,
    /// Whether this day is a detected local maximum of the vegetation curve.
    pub is_peak: bool,
}

/// All merged records for one region and one calendar year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionYearDataset {
    /// Region key (e.g. `"Japan_Tokyo"`).
    pub region: String,
    /// Calendar year.
    pub year: i32,
    /// Records in ascending date order.
    pub records: Vec<MergedRecord>,
}

impl RegionYearDataset {
    /// Returns `true` when the join produced no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Dates of all records flagged as peaks.
    #[must_use]
    pub fn peak_dates(&self) -> Vec<NaiveDate> {
        self.records
            .iter()
            .filter(|r| r.is_peak)
            .map(|r| r.date)
            .collect()
    }
}

/// One day of a synthesized future year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastRecord {
    /// Calendar day.
    pub date: NaiveDate,
    /// Climatological temperature plus the warming trend.
    pub temperature: f64,
    /// Degree days for the synthesized temperature.
    pub daily_degree_days: f64,
    /// Running degree-day sum from January 1 of the target year.
    pub cumulative_degree_days: f64,
    /// Vegetation index predicted by the regression model.
    pub predicted_index_value: f64,
    /// Set by peak detection on the predicted curve.
    pub is_peak: bool,
}

/// A predicted vegetation curve for a year with no observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastDataset {
    /// Region key.
    pub region: String,
    /// Target year.
    pub year: i32,
    /// Records in ascending date order.
    pub records: Vec<ForecastRecord>,
}

/// Thresholds for the threshold-crossing bloom query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BloomThresholds {
    /// Minimum cumulative degree days.
    pub gdd_threshold: f64,
    /// Minimum day-over-day increase of the vegetation index, unit scale.
    pub slope_threshold: f64,
}

impl BloomThresholds {
    /// Starting point offered for [`PlantPreset::Manual`].
    pub const MANUAL_DEFAULT: Self = Self::new(100.0, 0.001);

    /// Creates a threshold pair.
    #[must_use]
    pub const fn new(gdd_threshold: f64, slope_threshold: f64) -> Self {
        Self {
            gdd_threshold,
            slope_threshold,
        }
    }
}

/// Result of a bloom estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "date")]
pub enum BloomOutcome {
    /// A bloom date was found.
    BloomFound(NaiveDate),
    /// No date satisfied the criteria. A normal outcome.
    NoBloomFound,
}

impl BloomOutcome {
    /// Returns the bloom date, if any.
    #[must_use]
    pub const fn date(&self) -> Option<NaiveDate> {
        match self {
            Self::BloomFound(date) => Some(*date),
            Self::NoBloomFound => None,
        }
    }
}

impl From<Option<NaiveDate>> for BloomOutcome {
    fn from(value: Option<NaiveDate>) -> Self {
        value.map_or(Self::NoBloomFound, Self::BloomFound)
    }
}

/// Plant types with preset bloom thresholds.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum PlantPreset {
    /// Cherry blossom.
    Sakura,
    /// Magnolia.
    Magnolia,
    /// Plum.
    Plum,
    /// Camellia.
    Camellia,
    /// User supplies both thresholds.
    Manual,
}

impl PlantPreset {
    /// Every preset, in menu order.
    pub const ALL: &[Self] = &[
        Self::Sakura,
        Self::Magnolia,
        Self::Plum,
        Self::Camellia,
        Self::Manual,
    ];

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Sakura => "Sakura (Cherry Blossom)",
            Self::Magnolia => "Magnolia",
            Self::Plum => "Plum",
            Self::Camellia => "Camellia",
            Self::Manual => "Other (Manual Input)",
        }
    }

    /// Preset thresholds, or `None` for [`PlantPreset::Manual`].
    #[must_use]
    pub const fn thresholds(self) -> Option<BloomThresholds> {
        match self {
            Self::Sakura => Some(BloomThresholds::new(120.0, 0.0015)),
            Self::Magnolia => Some(BloomThresholds::new(100.0, 0.0002)),
            Self::Plum => Some(BloomThresholds::new(100.0, 0.0012)),
            Self::Camellia => Some(BloomThresholds::new(80.0, 0.0010)),
            Self::Manual => None,
        }
    }
}
