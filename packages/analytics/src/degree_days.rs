//! Growing degree-day accumulation.

use bloom_watch_series_models::{AlignedRecord, MergedRecord};
use chrono::NaiveDate;

use crate::AnalysisError;

/// Default base temperature in degrees Celsius.
pub const DEFAULT_BASE_TEMPERATURE: f64 = 5.0;

/// Heat accumulated on one day above `base`.
#[must_use]
pub fn daily_degree_days(temperature: f64, base: f64) -> f64 {
    (temperature - base).max(0.0)
}

/// Daily and cumulative degree days for one day of a series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DegreeDays {
    /// `max(0, temperature - base)`.
    pub daily: f64,
    /// Running sum of `daily` up to and including this day.
    pub cumulative: f64,
}

/// Accumulates degree days over a date-ordered temperature series.
///
/// # Errors
///
/// Returns [`AnalysisError::UnsortedInput`] if dates are not strictly
/// ascending.
pub fn accumulate_series(
    series: &[(NaiveDate, f64)],
    base: f64,
) -> Result<Vec<DegreeDays>, AnalysisError> {
    ensure_ascending(series.iter().map(|(date, _)| *date))?;

    let mut cumulative = 0.0;
    Ok(series
        .iter()
        .map(|&(_, temperature)| {
            let daily = daily_degree_days(temperature, base);
            cumulative += daily;
            DegreeDays { daily, cumulative }
        })
        .collect())
}

/// Extends aligned records with degree days. Peak flags start cleared.
///
/// # Errors
///
/// Returns [`AnalysisError::UnsortedInput`] if dates are not strictly
/// ascending.
pub fn accumulate(records: &[AlignedRecord], base: f64) -> Result<Vec<MergedRecord>, AnalysisError> {
    let series: Vec<(NaiveDate, f64)> = records.iter().map(|r| (r.date, r.temperature)).collect();
    let degree_days = accumulate_series(&series, base)?;

    Ok(records
        .iter()
        .zip(degree_days)
        .map(|(r, dd)| MergedRecord {
            date: r.date,
            temperature: r.temperature,
            vegetation_index: r.vegetation_index,
            daily_degree_days: dd.daily,
            cumulative_degree_days: dd.cumulative,
            is_peak: false,
        })
        .collect())
}

fn ensure_ascending(dates: impl Iterator<Item = NaiveDate>) -> Result<(), AnalysisError> {
    let mut previous: Option<NaiveDate> = None;
    for (index, current) in dates.enumerate() {
        if let Some(previous) = previous
            && current <= previous
        {
            return Err(AnalysisError::UnsortedInput {
                index,
                previous,
                current,
            });
        }
        previous = Some(current);
    }
    Ok(())
}
