#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Network-free analysis core.
//!
//! Turns raw vegetation and temperature samples into a merged daily
//! dataset (alignment, degree-day accumulation, peak marking), answers
//! threshold-crossing bloom queries against it, and forecasts future
//! seasons from pooled history with a seeded random forest.

pub mod align;
pub mod bloom;
pub mod degree_days;
pub mod forecast;
pub mod forest;
pub mod peaks;
pub mod stats;

use bloom_watch_config::PipelineConfig;
use bloom_watch_series_models::{RegionYearDataset, TemperatureSample, VegetationSample};
use chrono::NaiveDate;
use thiserror::Error;

/// Errors that can occur during analysis.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Degree-day accumulation requires strictly ascending dates.
    #[error("Input is not strictly ascending by date: {current} follows {previous} at index {index}")]
    UnsortedInput {
        /// Index of the offending record.
        index: usize,
        /// Date of the record before it.
        previous: NaiveDate,
        /// Date of the offending record.
        current: NaiveDate,
    },

    /// No usable history to train a forecast on.
    #[error("Insufficient history to forecast {region}: {message}")]
    InsufficientHistory {
        /// Region key.
        region: String,
        /// What was missing.
        message: String,
    },

    /// Training data could not be used.
    #[error("Invalid training data: {message}")]
    InvalidTrainingData {
        /// Description of what went wrong.
        message: String,
    },
}

/// Builds the persisted dataset for one region-year from raw samples.
///
/// Aligns the two series, accumulates degree days from
/// `config.base_temperature` and marks vegetation peaks at or above
/// `config.min_peak_height`. An empty result means the two series had no
/// date in common.
///
/// # Errors
///
/// Returns [`AnalysisError::UnsortedInput`] if alignment produced
/// out-of-order dates, which would indicate a bug upstream.
pub fn build_dataset(
    region: &str,
    year: i32,
    vegetation: &[VegetationSample],
    temperature: &[TemperatureSample],
    config: &PipelineConfig,
) -> Result<RegionYearDataset, AnalysisError> {
    let aligned = align::align(vegetation, temperature);
    let mut records = degree_days::accumulate(&aligned, config.base_temperature)?;
    peaks::mark_peaks(&mut records, config.min_peak_height);

    log::debug!(
        "{region} {year}: {} vegetation, {} temperature samples -> {} merged records, {} peaks",
        vegetation.len(),
        temperature.len(),
        records.len(),
        records.iter().filter(|r| r.is_peak).count(),
    );

    Ok(RegionYearDataset {
        region: region.to_string(),
        year,
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, m, d).unwrap()
    }

    #[test]
    fn temperature_without_vegetation_yields_empty_dataset() {
        let temperature: Vec<TemperatureSample> = (1..=10)
            .map(|d| TemperatureSample::new(day(1, d), 12.0))
            .collect();
        let vegetation = vec![
            VegetationSample::no_data(day(1, 1)),
            VegetationSample::no_data(day(1, 17)),
        ];

        let dataset = build_dataset(
            "Japan_Tokyo",
            2023,
            &vegetation,
            &temperature,
            &PipelineConfig::default(),
        )
        .unwrap();

        assert!(dataset.is_empty());
        assert_eq!(dataset.region, "Japan_Tokyo");
    }

    #[test]
    fn builds_merged_dataset_with_peak() {
        let vegetation = vec![
            VegetationSample::new(day(3, 1), 0.2),
            VegetationSample::new(day(3, 5), 0.8),
            VegetationSample::new(day(3, 9), 0.2),
        ];
        let temperature: Vec<TemperatureSample> = (1..=9)
            .map(|d| TemperatureSample::new(day(3, d), 10.0))
            .collect();

        let dataset = build_dataset(
            "Japan_Tokyo",
            2023,
            &vegetation,
            &temperature,
            &PipelineConfig::default(),
        )
        .unwrap();

        assert_eq!(dataset.records.len(), 9);
        assert!((dataset.records[8].cumulative_degree_days - 45.0).abs() < 1e-9);
        assert_eq!(dataset.peak_dates(), vec![day(3, 5)]);
    }
}
