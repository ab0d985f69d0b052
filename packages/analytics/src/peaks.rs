//! Local-maximum detection on a vegetation-index curve.
//!
//! A run of equal values bordered on both sides by strictly lower values is
//! one peak, reported at the leftmost index of the run. Runs touching
//! either end of the series are never peaks, and non-finite values are
//! never peaks and break runs.

use bloom_watch_series_models::MergedRecord;

/// Default minimum vegetation index for a historical peak.
pub const DEFAULT_MIN_PEAK_HEIGHT: f64 = 0.5;

/// Returns the indices of local maxima whose value is at least
/// `min_height`, in ascending order.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn find_peaks(values: &[f64], min_height: f64) -> Vec<usize> {
    let mut peaks = Vec::new();
    if values.len() < 3 {
        return peaks;
    }

    let mut i = 1;
    let last = values.len() - 1;

    while i < last {
        let value = values[i];
        let previous = values[i - 1];

        if !value.is_finite() || !previous.is_finite() || previous >= value {
            i += 1;
            continue;
        }

        // Rising edge into `i`; find where the run of equal values ends.
        let mut end = i;
        while end < last && values[end + 1] == value {
            end += 1;
        }

        if end < last && values[end + 1].is_finite() && values[end + 1] < value && value >= min_height {
            peaks.push(i);
        }

        i = end + 1;
    }

    peaks
}

/// Sets `is_peak` on every record at a local maximum of the vegetation
/// index with a value at or above `min_height`, clearing it elsewhere.
pub fn mark_peaks(records: &mut [MergedRecord], min_height: f64) {
    let values: Vec<f64> = records.iter().map(|r| r.vegetation_index).collect();
    let peaks = find_peaks(&values, min_height);

    for record in records.iter_mut() {
        record.is_peak = false;
    }
    for index in peaks {
        records[index].is_peak = true;
    }
}
