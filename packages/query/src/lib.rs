#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Bloom date estimation over stored datasets.
//!
//! Years up to the last observed year are answered from the stored
//! dataset with a threshold-crossing query. Later years are forecast from
//! the region's stored history.

pub mod interactive;

use std::fmt;
use std::path::Path;

use bloom_watch_analytics::AnalysisError;
use bloom_watch_analytics::bloom::first_threshold_crossing;
use bloom_watch_analytics::forecast::forecast;
use bloom_watch_config::PipelineConfig;
use bloom_watch_series_models::{
    BloomOutcome, BloomThresholds, ForecastRecord, MergedRecord, PlantPreset, RegionYearDataset,
};
use bloom_watch_store::{OutputStore, StoreError};
use chrono::NaiveDate;
use thiserror::Error;

/// Errors that can occur while answering a bloom query.
#[derive(Debug, Error)]
pub enum QueryError {
    /// No stored dataset for a historical region-year.
    #[error("Data not found for {region} in {year}")]
    DataNotFound {
        /// Region key.
        region: String,
        /// Requested year.
        year: i32,
    },

    /// Neither a preset nor both manual thresholds were given.
    #[error("Missing bloom thresholds: {message}")]
    MissingThresholds {
        /// What was missing.
        message: String,
    },

    /// The requested year has no March 1.
    #[error("Invalid year {0}")]
    InvalidYear(i32),

    /// Analysis or forecasting failed.
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// Reading stored datasets failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// How a query is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimationPath {
    /// A stored dataset for the year exists or is expected.
    Historical,
    /// The year lies past observed data and is forecast.
    Forecast,
}

impl EstimationPath {
    /// Chooses the path for `year`.
    #[must_use]
    pub const fn for_year(year: i32, config: &PipelineConfig) -> Self {
        if year <= config.last_history_year {
            Self::Historical
        } else {
            Self::Forecast
        }
    }
}

impl fmt::Display for EstimationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Historical => f.write_str("historical"),
            Self::Forecast => f.write_str("forecast"),
        }
    }
}

/// Vegetation curve behind an estimate, from the start date on.
#[derive(Debug, Clone, PartialEq)]
pub enum BloomCurve {
    /// Stored records of a historical year.
    Observed(Vec<MergedRecord>),
    /// Records of a forecast year with predicted index values.
    Predicted(Vec<ForecastRecord>),
}

/// One day of a [`BloomCurve`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvePoint {
    /// Calendar day.
    pub date: NaiveDate,
    /// Observed or predicted vegetation index.
    pub index_value: f64,
    /// Cumulative degree days.
    pub cumulative_degree_days: f64,
}

impl BloomCurve {
    /// Day-by-day points in ascending date order.
    #[must_use]
    pub fn points(&self) -> Vec<CurvePoint> {
        match self {
            Self::Observed(records) => records
                .iter()
                .map(|r| CurvePoint {
                    date: r.date,
                    index_value: r.vegetation_index,
                    cumulative_degree_days: r.cumulative_degree_days,
                })
                .collect(),
            Self::Predicted(records) => records
                .iter()
                .map(|r| CurvePoint {
                    date: r.date,
                    index_value: r.predicted_index_value,
                    cumulative_degree_days: r.cumulative_degree_days,
                })
                .collect(),
        }
    }

    /// Number of days on the curve.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Observed(records) => records.len(),
            Self::Predicted(records) => records.len(),
        }
    }

    /// Whether the curve has no days.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Answer to a bloom query.
#[derive(Debug, Clone, PartialEq)]
pub struct BloomEstimate {
    /// Region key.
    pub region: String,
    /// Requested year.
    pub year: i32,
    /// Earliest date considered.
    pub start: NaiveDate,
    /// Path the answer came from.
    pub path: EstimationPath,
    /// The estimated bloom.
    pub bloom: BloomOutcome,
    /// Years of stored history a forecast was trained on.
    pub training_years: Vec<i32>,
    /// Curve the bloom was read from.
    pub curve: BloomCurve,
}

impl BloomEstimate {
    /// Formats the curve as a fixed-width table, marking the bloom day.
    #[must_use]
    pub fn curve_table(&self) -> String {
        use std::fmt::Write as _;

        let bloom = self.bloom.date();
        let mut table = format!("{:<12}{:>10}{:>12}\n", "date", "index", "gdd");
        for point in self.curve.points() {
            let marker = if Some(point.date) == bloom { "  <- bloom" } else { "" };
            let _ = writeln!(
                table,
                "{:<12}{:>10.4}{:>12.1}{marker}",
                point.date.format("%Y-%m-%d").to_string(),
                point.index_value,
                point.cumulative_degree_days
            );
        }
        table
    }

    /// Renders the curve with a bloom marker as a PNG at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Plot`] if the image cannot be written.
    pub fn render_plot(&self, path: &Path) -> Result<(), StoreError> {
        let points: Vec<(NaiveDate, f64)> = self
            .curve
            .points()
            .iter()
            .map(|p| (p.date, p.index_value))
            .collect();
        bloom_watch_store::plot::render_curve(&points, self.bloom.date(), path)
    }
}

impl fmt::Display for BloomEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bloom {
            BloomOutcome::BloomFound(date) => write!(
                f,
                "Estimated bloom for {} in {}: {} ({})",
                self.region,
                self.year,
                date.format("%Y-%m-%d"),
                self.path
            )?,
            BloomOutcome::NoBloomFound => write!(
                f,
                "No bloom predicted for {} in {} after {} ({})",
                self.region, self.year, self.start, self.path
            )?,
        }
        if let (Some(first), Some(last)) = (self.training_years.first(), self.training_years.last())
        {
            write!(f, ", trained on {first}-{last}")?;
        }
        Ok(())
    }
}

/// March 1 of `year`, the default start of the search window.
///
/// # Errors
///
/// Returns [`QueryError::InvalidYear`] if the date is out of range.
pub fn default_start(year: i32) -> Result<NaiveDate, QueryError> {
    NaiveDate::from_ymd_opt(year, 3, 1).ok_or(QueryError::InvalidYear(year))
}

/// Resolves the thresholds for a query. Explicit `gdd` and `slope` values
/// override the preset's; [`PlantPreset::Manual`] or no preset requires
/// both.
///
/// # Errors
///
/// Returns [`QueryError::MissingThresholds`] if a value is unresolved.
pub fn resolve_thresholds(
    plant: Option<PlantPreset>,
    gdd: Option<f64>,
    slope: Option<f64>,
) -> Result<BloomThresholds, QueryError> {
    let preset = plant.and_then(PlantPreset::thresholds);

    let gdd_threshold = gdd
        .or_else(|| preset.map(|t| t.gdd_threshold))
        .ok_or_else(|| QueryError::MissingThresholds {
            message: "pass --plant or --gdd".to_string(),
        })?;
    let slope_threshold = slope
        .or_else(|| preset.map(|t| t.slope_threshold))
        .ok_or_else(|| QueryError::MissingThresholds {
            message: "pass --plant or --slope".to_string(),
        })?;

    Ok(BloomThresholds::new(gdd_threshold, slope_threshold))
}

/// Estimates the bloom date of `region` in `year`, searching from `start`.
///
/// `thresholds` only apply to the historical path. A forecast reports the
/// first peak of the predicted curve.
///
/// # Errors
///
/// * [`QueryError::DataNotFound`] if a historical year has no dataset
/// * [`QueryError::Analysis`] if a forecast has no usable history
/// * [`QueryError::Store`] if a stored dataset cannot be read
pub fn estimate_bloom(
    store: &dyn OutputStore,
    region: &str,
    year: i32,
    thresholds: BloomThresholds,
    start: NaiveDate,
    config: &PipelineConfig,
) -> Result<BloomEstimate, QueryError> {
    let path = EstimationPath::for_year(year, config);
    log::debug!("{region} {year}: {path} path from {start}");

    let (bloom, training_years, curve) = match path {
        EstimationPath::Historical => {
            let dataset = store
                .read(region, year)?
                .ok_or_else(|| QueryError::DataNotFound {
                    region: region.to_string(),
                    year,
                })?;
            let bloom = first_threshold_crossing(&dataset.records, start, thresholds);
            let observed = dataset
                .records
                .into_iter()
                .filter(|r| r.date >= start)
                .collect();
            (bloom, Vec::new(), BloomCurve::Observed(observed))
        }
        EstimationPath::Forecast => {
            let history = load_history(store, region, &config.training_years(year))?;
            let outcome = forecast(region, year, &history, start, config)?;
            let years = history.iter().map(|d| d.year).collect();
            (
                outcome.bloom,
                years,
                BloomCurve::Predicted(outcome.dataset.records),
            )
        }
    };

    Ok(BloomEstimate {
        region: region.to_string(),
        year,
        start,
        path,
        bloom,
        training_years,
        curve,
    })
}

/// Loads every stored dataset of `region` among `years`, skipping absent
/// ones.
fn load_history(
    store: &dyn OutputStore,
    region: &str,
    years: &[i32],
) -> Result<Vec<RegionYearDataset>, StoreError> {
    let mut history = Vec::with_capacity(years.len());
    for &year in years {
        match store.read(region, year)? {
            Some(dataset) => history.push(dataset),
            None => log::debug!("{region}: no stored dataset for {year}"),
        }
    }
    Ok(history)
}

/// Stored region keys, optionally filtered by a case-insensitive
/// substring.
///
/// # Errors
///
/// Returns [`QueryError::Store`] if the store cannot be listed.
pub fn search_regions(
    store: &dyn OutputStore,
    search: Option<&str>,
) -> Result<Vec<String>, QueryError> {
    let regions = store.list_regions()?;
    let Some(needle) = search.map(str::to_lowercase) else {
        return Ok(regions);
    };
    Ok(regions
        .into_iter()
        .filter(|r| r.to_lowercase().contains(&needle))
        .collect())
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;
    use std::path::PathBuf;

    use bloom_watch_series_models::MergedRecord;
    use bloom_watch_store::CsvOutputStore;
    use chrono::Datelike;

    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn seasonal_year(region: &str, year: i32) -> RegionYearDataset {
        let first = NaiveDate::from_ymd_opt(year, 1, 1).unwrap();
        let mut cumulative = 0.0;
        let records = first
            .iter_days()
            .take_while(|d| d.year() == year)
            .map(|date| {
                let phase = 2.0 * PI * (f64::from(date.ordinal()) - 15.0) / 365.0;
                let temperature = 12.0f64.mul_add(-phase.cos(), 15.0);
                let daily = (temperature - 5.0).max(0.0);
                cumulative += daily;
                let vegetation = 0.6f64.mul_add((-((cumulative - 1500.0) / 500.0).powi(2)).exp(), 0.2);
                MergedRecord {
                    date,
                    temperature,
                    vegetation_index: vegetation,
                    daily_degree_days: daily,
                    cumulative_degree_days: cumulative,
                    is_peak: false,
                }
            })
            .collect();
        RegionYearDataset {
            region: region.to_string(),
            year,
            records,
        }
    }

    fn stepped_year() -> RegionYearDataset {
        let first = NaiveDate::from_ymd_opt(2023, 3, 1).unwrap();
        let values = [0.20, 0.25, 0.30, 0.50, 0.55, 0.80, 0.70];
        let records = first
            .iter_days()
            .zip(values)
            .enumerate()
            .map(|(i, (date, v))| {
                let cumulative = 50.0 * f64::from(u32::try_from(i).unwrap());
                MergedRecord {
                    date,
                    temperature: 15.0,
                    vegetation_index: v,
                    daily_degree_days: 10.0,
                    cumulative_degree_days: cumulative,
                    is_peak: false,
                }
            })
            .collect();
        RegionYearDataset {
            region: "Japan_Tokyo".to_string(),
            year: 2023,
            records,
        }
    }

    #[test]
    fn path_follows_last_history_year() {
        let config = PipelineConfig::default();
        assert_eq!(EstimationPath::for_year(2024, &config), EstimationPath::Historical);
        assert_eq!(EstimationPath::for_year(2025, &config), EstimationPath::Forecast);
    }

    #[test]
    fn historical_query_returns_earliest_crossing() {
        let store = CsvOutputStore::new(scratch("bloom_watch_query_historical"));
        store.write(&stepped_year()).unwrap();
        let start = default_start(2023).unwrap();

        let estimate = estimate_bloom(
            &store,
            "Japan_Tokyo",
            2023,
            BloomThresholds::new(100.0, 0.15),
            start,
            &PipelineConfig::default(),
        )
        .unwrap();

        assert_eq!(estimate.path, EstimationPath::Historical);
        assert_eq!(
            estimate.bloom,
            BloomOutcome::BloomFound(NaiveDate::from_ymd_opt(2023, 3, 4).unwrap())
        );
        assert!(estimate.training_years.is_empty());

        let BloomCurve::Observed(records) = &estimate.curve else {
            panic!("expected observed curve, got {:?}", estimate.curve);
        };
        assert_eq!(records.len(), 7);
        assert_eq!(records[3].date, NaiveDate::from_ymd_opt(2023, 3, 4).unwrap());
        assert!((records[3].vegetation_index - 0.50).abs() < 1e-9);
    }

    #[test]
    fn historical_curve_starts_at_start_date() {
        let store = CsvOutputStore::new(scratch("bloom_watch_query_curve_start"));
        store.write(&stepped_year()).unwrap();
        let start = NaiveDate::from_ymd_opt(2023, 3, 5).unwrap();

        let estimate = estimate_bloom(
            &store,
            "Japan_Tokyo",
            2023,
            BloomThresholds::new(100.0, 0.15),
            start,
            &PipelineConfig::default(),
        )
        .unwrap();

        let points = estimate.curve.points();
        assert_eq!(points.len(), 3);
        assert!(points.iter().all(|p| p.date >= start));
        assert!((points[0].index_value - 0.55).abs() < 1e-9);

        let table = estimate.curve_table();
        assert_eq!(table.lines().count(), 4);
        assert!(table.lines().nth(2).unwrap().ends_with("<- bloom"));
    }

    #[test]
    fn historical_query_without_crossing_reports_no_bloom() {
        let store = CsvOutputStore::new(scratch("bloom_watch_query_no_bloom"));
        store.write(&stepped_year()).unwrap();

        let estimate = estimate_bloom(
            &store,
            "Japan_Tokyo",
            2023,
            BloomThresholds::new(1000.0, 0.15),
            default_start(2023).unwrap(),
            &PipelineConfig::default(),
        )
        .unwrap();

        assert_eq!(estimate.bloom, BloomOutcome::NoBloomFound);
        assert!(estimate.to_string().starts_with("No bloom predicted"));
    }

    #[test]
    fn missing_historical_dataset_is_data_not_found() {
        let store = CsvOutputStore::new(scratch("bloom_watch_query_missing"));
        let result = estimate_bloom(
            &store,
            "Japan_Tokyo",
            2022,
            BloomThresholds::new(100.0, 0.1),
            default_start(2022).unwrap(),
            &PipelineConfig::default(),
        );
        assert!(matches!(
            result,
            Err(QueryError::DataNotFound { year: 2022, .. })
        ));
    }

    #[test]
    fn forecast_without_history_is_insufficient() {
        let store = CsvOutputStore::new(scratch("bloom_watch_query_no_history"));
        let result = estimate_bloom(
            &store,
            "Japan_Tokyo",
            2026,
            BloomThresholds::new(100.0, 0.1),
            default_start(2026).unwrap(),
            &PipelineConfig::default(),
        );
        assert!(matches!(
            result,
            Err(QueryError::Analysis(AnalysisError::InsufficientHistory { .. }))
        ));
    }

    #[test]
    fn forecast_trains_on_stored_history() {
        let store = CsvOutputStore::new(scratch("bloom_watch_query_forecast"));
        for year in 2019..=2024 {
            store.write(&seasonal_year("Japan_Tokyo", year)).unwrap();
        }

        let estimate = estimate_bloom(
            &store,
            "Japan_Tokyo",
            2025,
            BloomThresholds::new(100.0, 0.1),
            default_start(2025).unwrap(),
            &PipelineConfig::default(),
        )
        .unwrap();

        assert_eq!(estimate.path, EstimationPath::Forecast);
        assert_eq!(estimate.training_years, (2019..=2024).collect::<Vec<_>>());
        let bloom = estimate.bloom.date().unwrap();
        assert!(bloom >= NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(), "{bloom}");
        assert!(bloom <= NaiveDate::from_ymd_opt(2025, 8, 31).unwrap(), "{bloom}");

        let BloomCurve::Predicted(records) = &estimate.curve else {
            panic!("expected predicted curve, got {:?}", estimate.curve);
        };
        assert_eq!(records.first().unwrap().date, default_start(2025).unwrap());
        assert_eq!(records.last().unwrap().date, NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
        assert!(records.iter().any(|r| r.date == bloom && r.is_peak));

        let plot = scratch("bloom_watch_query_forecast_plot").with_extension("png");
        estimate.render_plot(&plot).unwrap();
        assert!(plot.is_file());
    }

    #[test]
    fn thresholds_resolve_from_preset_or_flags() {
        let sakura = resolve_thresholds(Some(PlantPreset::Sakura), None, None).unwrap();
        assert_eq!(sakura, BloomThresholds::new(120.0, 0.0015));

        let overridden = resolve_thresholds(Some(PlantPreset::Plum), Some(90.0), None).unwrap();
        assert_eq!(overridden, BloomThresholds::new(90.0, 0.0012));

        let manual = resolve_thresholds(Some(PlantPreset::Manual), Some(80.0), Some(0.05)).unwrap();
        assert_eq!(manual, BloomThresholds::new(80.0, 0.05));

        assert!(matches!(
            resolve_thresholds(Some(PlantPreset::Manual), Some(80.0), None),
            Err(QueryError::MissingThresholds { .. })
        ));
        assert!(matches!(
            resolve_thresholds(None, None, None),
            Err(QueryError::MissingThresholds { .. })
        ));
    }

    #[test]
    fn searches_regions_case_insensitively() {
        let store = CsvOutputStore::new(scratch("bloom_watch_query_search"));
        store.write(&stepped_year()).unwrap();
        let mut spain = stepped_year();
        spain.region = "Spain_Madrid".to_string();
        store.write(&spain).unwrap();

        assert_eq!(search_regions(&store, None).unwrap().len(), 2);
        assert_eq!(
            search_regions(&store, Some("tokyo")).unwrap(),
            vec!["Japan_Tokyo".to_string()]
        );
        assert!(search_regions(&store, Some("lima")).unwrap().is_empty());
    }
}
