//! Daily resampling and date alignment of the two input series.

use std::collections::BTreeMap;

use bloom_watch_series_models::{AlignedRecord, TemperatureSample, VegetationSample};
use chrono::NaiveDate;

/// Resamples valid vegetation composites to a daily series.
///
/// No-data samples are dropped first and same-day duplicates averaged.
/// Days between two observations are filled by linear interpolation in
/// time; nothing is produced before the first or after the last valid
/// observation.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn resample_daily(samples: &[VegetationSample]) -> Vec<(NaiveDate, f64)> {
    let observed = daily_means(
        samples
            .iter()
            .filter(|s| s.is_valid())
            .map(|s| (s.date, s.index_value)),
    );

    let mut daily = Vec::new();
    let mut points = observed.into_iter().peekable();

    while let Some((date, value)) = points.next() {
        daily.push((date, value));

        let Some(&(next_date, next_value)) = points.peek() else {
            break;
        };
        let span = (next_date - date).num_days();
        for offset in 1..span {
            let t = offset as f64 / span as f64;
            daily.push((
                date + chrono::Days::new(offset.unsigned_abs()),
                (next_value - value).mul_add(t, value),
            ));
        }
    }

    daily
}

/// Inner-joins daily vegetation with temperature on exact date.
///
/// Output is ascending by date. An empty result is a valid "no data"
/// outcome.
#[must_use]
pub fn align(vegetation: &[VegetationSample], temperature: &[TemperatureSample]) -> Vec<AlignedRecord> {
    let temperature = daily_means(
        temperature
            .iter()
            .filter(|s| s.temperature.is_finite())
            .map(|s| (s.date, s.temperature)),
    );

    resample_daily(vegetation)
        .into_iter()
        .filter_map(|(date, vegetation_index)| {
            temperature.get(&date).map(|&temperature| AlignedRecord {
                date,
                temperature,
                vegetation_index,
            })
        })
        .collect()
}

fn daily_means(values: impl Iterator<Item = (NaiveDate, f64)>) -> BTreeMap<NaiveDate, f64> {
    let mut sums: BTreeMap<NaiveDate, (f64, u32)> = BTreeMap::new();
    for (date, value) in values {
        let entry = sums.entry(date).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(date, (sum, count))| (date, sum / f64::from(count)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    #[test]
    fn interpolates_interior_gaps() {
        let samples = vec![
            VegetationSample::new(day(1, 1), 0.2),
            VegetationSample::new(day(1, 5), 0.6),
        ];
        let daily = resample_daily(&samples);
        assert_eq!(daily.len(), 5);
        assert_eq!(daily[2].0, day(1, 3));
        assert!((daily[2].1 - 0.4).abs() < 1e-12);
        assert!((daily[4].1 - 0.6).abs() < 1e-12);
    }

    #[test]
    fn sentinels_are_removed_before_interpolation() {
        let samples = vec![
            VegetationSample::no_data(day(1, 1)),
            VegetationSample::new(day(1, 3), 0.3),
            VegetationSample::no_data(day(1, 4)),
            VegetationSample::new(day(1, 5), 0.5),
            VegetationSample::new(day(1, 9), f64::NAN),
        ];
        let daily = resample_daily(&samples);
        assert_eq!(daily.first().unwrap().0, day(1, 3));
        assert_eq!(daily.last().unwrap().0, day(1, 5));
        assert!((daily[1].1 - 0.4).abs() < 1e-12);
    }

    #[test]
    fn same_day_duplicates_are_averaged() {
        let samples = vec![
            VegetationSample::new(day(2, 1), 0.2),
            VegetationSample::new(day(2, 1), 0.4),
        ];
        let daily = resample_daily(&samples);
        assert_eq!(daily.len(), 1);
        assert!((daily[0].1 - 0.3).abs() < 1e-12);
    }

    #[test]
    fn join_keeps_only_common_dates() {
        let vegetation = vec![
            VegetationSample::new(day(3, 1), 0.2),
            VegetationSample::new(day(3, 4), 0.5),
        ];
        let temperature = vec![
            TemperatureSample::new(day(2, 28), 1.0),
            TemperatureSample::new(day(3, 2), 8.0),
            TemperatureSample::new(day(3, 4), 9.0),
            TemperatureSample::new(day(3, 10), 10.0),
        ];
        let aligned = align(&vegetation, &temperature);
        let dates: Vec<NaiveDate> = aligned.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![day(3, 2), day(3, 4)]);
        assert!((aligned[0].vegetation_index - 0.3).abs() < 1e-12);
        assert!((aligned[1].temperature - 9.0).abs() < 1e-12);
    }

    #[test]
    fn no_common_dates_is_empty() {
        let vegetation = vec![VegetationSample::new(day(6, 1), 0.7)];
        let temperature = vec![TemperatureSample::new(day(1, 1), 3.0)];
        assert!(align(&vegetation, &temperature).is_empty());
    }
}
