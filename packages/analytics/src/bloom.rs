//! Threshold-crossing bloom query over a historical dataset.

use bloom_watch_series_models::{BloomOutcome, BloomThresholds, MergedRecord};
use chrono::NaiveDate;

/// Returns the earliest date on or after `start` where accumulated heat
/// reaches `thresholds.gdd_threshold` and the day-over-day vegetation
/// slope reaches `thresholds.slope_threshold`.
///
/// The slope is the first difference between consecutive records that
/// survive the start-date filter, so the first of them never qualifies.
#[must_use]
pub fn first_threshold_crossing(
    records: &[MergedRecord],
    start: NaiveDate,
    thresholds: BloomThresholds,
) -> BloomOutcome {
    let remaining: Vec<&MergedRecord> = records.iter().filter(|r| r.date >= start).collect();

    remaining
        .windows(2)
        .find(|pair| {
            let slope = pair[1].vegetation_index - pair[0].vegetation_index;
            pair[1].cumulative_degree_days >= thresholds.gdd_threshold
                && slope >= thresholds.slope_threshold
        })
        .map(|pair| pair[1].date)
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(day: u32, cumulative: f64, vegetation: f64) -> MergedRecord {
        MergedRecord {
            date: NaiveDate::from_ymd_opt(2024, 4, day).unwrap(),
            temperature: 10.0,
            vegetation_index: vegetation,
            daily_degree_days: 5.0,
            cumulative_degree_days: cumulative,
            is_peak: false,
        }
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, day).unwrap()
    }

    #[test]
    fn returns_earliest_qualifying_date() {
        let records = vec![
            record(1, 90.0, 0.10),
            record(2, 110.0, 0.12),
            record(3, 125.0, 0.40),
            record(4, 130.0, 0.45),
            record(5, 140.0, 0.80),
        ];
        let outcome = first_threshold_crossing(&records, date(1), BloomThresholds::new(120.0, 0.2));
        assert_eq!(outcome, BloomOutcome::BloomFound(date(3)));
    }

    #[test]
    fn both_conditions_must_hold() {
        let records = vec![
            record(1, 50.0, 0.1),
            record(2, 60.0, 0.9),
            record(3, 200.0, 0.91),
        ];
        let outcome = first_threshold_crossing(&records, date(1), BloomThresholds::new(100.0, 0.5));
        assert_eq!(outcome, BloomOutcome::NoBloomFound);
    }

    #[test]
    fn first_record_after_start_has_no_slope() {
        let records = vec![
            record(1, 200.0, 0.1),
            record(2, 210.0, 0.9),
            record(3, 220.0, 0.9),
        ];
        // The jump into day 2 would qualify, but day 2 is the first
        // record on or after the start date.
        let outcome = first_threshold_crossing(&records, date(2), BloomThresholds::new(100.0, 0.5));
        assert_eq!(outcome, BloomOutcome::NoBloomFound);
    }

    #[test]
    fn empty_records_find_nothing() {
        let outcome = first_threshold_crossing(&[], date(1), BloomThresholds::new(0.0, 0.0));
        assert_eq!(outcome, BloomOutcome::NoBloomFound);
    }
}
