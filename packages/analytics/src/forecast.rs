//! Bloom forecasting for years without observed data.
//!
//! A random forest learns vegetation index from `(cumulative degree days,
//! temperature)` over the pooled history of a region. The target year's
//! temperature is synthesized from the day-of-year climatology of that
//! history plus a linear warming term, degree days are accumulated over it
//! and the forest predicts the vegetation curve. Peaks of the predicted
//! curve above a high percentile mark the forecast bloom.

use std::collections::BTreeMap;

use bloom_watch_config::PipelineConfig;
use bloom_watch_series_models::{
    BloomOutcome, ForecastDataset, ForecastRecord, MergedRecord, RegionYearDataset,
};
use chrono::{Datelike, NaiveDate};

use crate::forest::RandomForest;
use crate::{AnalysisError, degree_days, peaks, stats};

/// Result of a forecast run.
#[derive(Debug, Clone)]
pub struct ForecastOutcome {
    /// Predicted records on or after the query start date.
    pub dataset: ForecastDataset,
    /// First predicted peak, if any.
    pub bloom: BloomOutcome,
    /// Most recent year that contributed training rows.
    pub last_training_year: i32,
}

/// Forecasts the vegetation curve and bloom date of `region` for
/// `target_year` from `history`.
///
/// # Errors
///
/// Returns [`AnalysisError::InsufficientHistory`] if `history` holds no
/// usable rows, or another [`AnalysisError`] if training fails.
pub fn forecast(
    region: &str,
    target_year: i32,
    history: &[RegionYearDataset],
    start: NaiveDate,
    config: &PipelineConfig,
) -> Result<ForecastOutcome, AnalysisError> {
    let pool: Vec<(i32, &MergedRecord)> = history
        .iter()
        .flat_map(|d| d.records.iter().map(move |r| (d.year, r)))
        .filter(|(_, r)| {
            r.vegetation_index.is_finite()
                && r.temperature.is_finite()
                && r.cumulative_degree_days.is_finite()
        })
        .collect();

    let Some(last_training_year) = pool.iter().map(|(year, _)| *year).max() else {
        return Err(AnalysisError::InsufficientHistory {
            region: region.to_string(),
            message: format!("no usable records in {} historical dataset(s)", history.len()),
        });
    };

    log::info!(
        "{region}: training forecast for {target_year} on {} rows (last year {last_training_year})",
        pool.len()
    );

    let features: Vec<Vec<f64>> = pool
        .iter()
        .map(|(_, r)| vec![r.cumulative_degree_days, r.temperature])
        .collect();
    let targets: Vec<f64> = pool.iter().map(|(_, r)| r.vegetation_index).collect();
    let forest = RandomForest::fit(&features, &targets, &config.forest)?;

    let climatology = day_of_year_climatology(pool.iter().map(|(_, r)| *r));
    let warming = f64::from(target_year - last_training_year) * config.warming_rate;

    let trajectory = synthesize_year(target_year, &climatology, warming).ok_or_else(|| {
        AnalysisError::InsufficientHistory {
            region: region.to_string(),
            message: format!("cannot build a temperature trajectory for {target_year}"),
        }
    })?;
    let degree_days = degree_days::accumulate_series(&trajectory, config.base_temperature)?;

    let window: Vec<(NaiveDate, f64, degree_days::DegreeDays)> = trajectory
        .iter()
        .zip(degree_days)
        .filter(|((date, _), _)| *date >= start)
        .map(|(&(date, temperature), dd)| (date, temperature, dd))
        .collect();
    let rows: Vec<Vec<f64>> = window
        .iter()
        .map(|(_, temperature, dd)| vec![dd.cumulative, *temperature])
        .collect();
    let predictions = forest.predict(&rows)?;

    let mut records: Vec<ForecastRecord> = window
        .into_iter()
        .zip(predictions)
        .map(|((date, temperature, dd), predicted)| ForecastRecord {
            date,
            temperature,
            daily_degree_days: dd.daily,
            cumulative_degree_days: dd.cumulative,
            predicted_index_value: predicted,
            is_peak: false,
        })
        .collect();

    let predicted: Vec<f64> = records.iter().map(|r| r.predicted_index_value).collect();
    let bloom: BloomOutcome = match stats::percentile(&predicted, config.forecast_peak_percentile) {
        Some(height) => {
            let peak_indices = peaks::find_peaks(&predicted, height);
            for &i in &peak_indices {
                records[i].is_peak = true;
            }
            peak_indices.first().map(|&i| records[i].date).into()
        }
        None => BloomOutcome::NoBloomFound,
    };

    Ok(ForecastOutcome {
        dataset: ForecastDataset {
            region: region.to_string(),
            year: target_year,
            records,
        },
        bloom,
        last_training_year,
    })
}

/// Mean temperature per day of year (1-based ordinal).
fn day_of_year_climatology<'a>(
    records: impl Iterator<Item = &'a MergedRecord>,
) -> BTreeMap<u32, f64> {
    let mut by_day: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for record in records {
        by_day
            .entry(record.date.ordinal())
            .or_default()
            .push(record.temperature);
    }
    by_day
        .into_iter()
        .filter_map(|(day, temps)| stats::mean(&temps).map(|m| (day, m)))
        .collect()
}

/// Climatological temperature for `day`, falling back to the nearest
/// earlier day present, then the nearest later one.
fn temperature_for_day(climatology: &BTreeMap<u32, f64>, day: u32) -> Option<f64> {
    climatology
        .range(..=day)
        .next_back()
        .or_else(|| climatology.range(day..).next())
        .map(|(_, t)| *t)
}

/// Daily temperatures for January 1 through December 31 of `year`.
fn synthesize_year(
    year: i32,
    climatology: &BTreeMap<u32, f64>,
    warming: f64,
) -> Option<Vec<(NaiveDate, f64)>> {
    let first = NaiveDate::from_ymd_opt(year, 1, 1)?;
    first
        .iter_days()
        .take_while(|d| d.year() == year)
        .map(|date| temperature_for_day(climatology, date.ordinal()).map(|t| (date, t + warming)))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use super::*;

    fn seasonal_temperature(ordinal: u32) -> f64 {
        12.0f64.mul_add(-((2.0 * PI * (f64::from(ordinal) - 15.0)) / 365.0).cos(), 15.0)
    }

    fn vegetation(cumulative: f64) -> f64 {
        0.6f64.mul_add((-((cumulative - 1500.0) / 500.0).powi(2)).exp(), 0.2)
    }

    fn history_year(year: i32) -> RegionYearDataset {
        let first = NaiveDate::from_ymd_opt(year, 1, 1).unwrap();
        let mut cumulative = 0.0;
        let records = first
            .iter_days()
            .take_while(|d| d.year() == year)
            .map(|date| {
                let temperature = seasonal_temperature(date.ordinal());
                let daily = degree_days::daily_degree_days(temperature, 5.0);
                cumulative += daily;
                MergedRecord {
                    date,
                    temperature,
                    vegetation_index: vegetation(cumulative),
                    daily_degree_days: daily,
                    cumulative_degree_days: cumulative,
                    is_peak: false,
                }
            })
            .collect();
        RegionYearDataset {
            region: "Japan_Tokyo".to_string(),
            year,
            records,
        }
    }

    fn history() -> Vec<RegionYearDataset> {
        (2019..=2024).map(history_year).collect()
    }

    #[test]
    fn empty_history_is_insufficient() {
        let start = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let result = forecast("Japan_Tokyo", 2026, &[], start, &PipelineConfig::default());
        assert!(matches!(result, Err(AnalysisError::InsufficientHistory { .. })));
    }

    #[test]
    fn history_without_finite_rows_is_insufficient() {
        let mut dataset = history_year(2024);
        for record in &mut dataset.records {
            record.vegetation_index = f64::NAN;
        }
        let start = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let result = forecast("Japan_Tokyo", 2025, &[dataset], start, &PipelineConfig::default());
        assert!(matches!(result, Err(AnalysisError::InsufficientHistory { .. })));
    }

    #[test]
    fn forecasts_bloom_within_season() {
        let start = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let outcome =
            forecast("Japan_Tokyo", 2025, &history(), start, &PipelineConfig::default()).unwrap();

        assert_eq!(outcome.last_training_year, 2024);
        assert_eq!(outcome.dataset.records.first().unwrap().date, start);
        assert_eq!(
            outcome.dataset.records.last().unwrap().date,
            NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()
        );
        assert!(
            outcome
                .dataset
                .records
                .windows(2)
                .all(|w| w[1].cumulative_degree_days >= w[0].cumulative_degree_days)
        );

        let bloom = outcome.bloom.date().unwrap();
        assert!(bloom >= NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(), "{bloom}");
        assert!(bloom <= NaiveDate::from_ymd_opt(2025, 8, 31).unwrap(), "{bloom}");

        let first_peak = outcome.dataset.records.iter().find(|r| r.is_peak).unwrap();
        assert_eq!(first_peak.date, bloom);
    }

    #[test]
    fn forecast_is_deterministic() {
        let start = NaiveDate::from_ymd_opt(2027, 3, 1).unwrap();
        let config = PipelineConfig::default();
        let a = forecast("Japan_Tokyo", 2027, &history(), start, &config).unwrap();
        let b = forecast("Japan_Tokyo", 2027, &history(), start, &config).unwrap();
        assert_eq!(a.bloom, b.bloom);
        assert_eq!(a.dataset.records, b.dataset.records);
    }

    #[test]
    fn warming_is_added_per_year_ahead() {
        let start = NaiveDate::from_ymd_opt(2027, 1, 1).unwrap();
        let outcome =
            forecast("Japan_Tokyo", 2027, &history(), start, &PipelineConfig::default()).unwrap();
        let jan_first = &outcome.dataset.records[0];
        let expected = seasonal_temperature(1) + 3.0 * 3.0;
        assert!((jan_first.temperature - expected).abs() < 1e-9);
    }

    #[test]
    fn missing_day_of_year_uses_nearest_earlier_day() {
        let climatology: BTreeMap<u32, f64> = [(1, 2.0), (365, 8.0)].into_iter().collect();
        assert_eq!(temperature_for_day(&climatology, 366), Some(8.0));
        assert_eq!(temperature_for_day(&climatology, 200), Some(2.0));

        let late_only: BTreeMap<u32, f64> = [(10, 4.0)].into_iter().collect();
        assert_eq!(temperature_for_day(&late_only, 3), Some(4.0));
        assert_eq!(temperature_for_day(&BTreeMap::new(), 3), None);
    }

    #[test]
    fn synthesized_leap_year_has_366_days() {
        let climatology: BTreeMap<u32, f64> = (1..=365).map(|d| (d, f64::from(d))).collect();
        let year = synthesize_year(2028, &climatology, 0.0).unwrap();
        assert_eq!(year.len(), 366);
        assert!((year[365].1 - 365.0).abs() < f64::EPSILON);
    }
}
