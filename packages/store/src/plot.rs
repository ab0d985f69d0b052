//! Vegetation curve rendering.
//!
//! Two stacked panels over day of year: the vegetation index with peaks
//! circled, and cumulative degree days below it. Nothing textual is
//! drawn, so no font backend is needed.

use std::path::Path;

use bloom_watch_series_models::RegionYearDataset;
use chrono::{Datelike, NaiveDate};
use plotters::prelude::*;

use crate::StoreError;

/// Image size in pixels.
pub const PLOT_SIZE: (u32, u32) = (1200, 800);

const VEGETATION_COLOR: RGBColor = RGBColor(34, 139, 34);
const PEAK_COLOR: RGBColor = RGBColor(220, 20, 60);
const HEAT_COLOR: RGBColor = RGBColor(255, 140, 0);
const BLOOM_COLOR: RGBColor = RGBColor(199, 21, 133);

/// Renders `dataset` as a PNG at `path`.
///
/// # Errors
///
/// Returns [`StoreError::Plot`] if the image cannot be drawn or encoded.
pub fn render(dataset: &RegionYearDataset, path: &Path) -> Result<(), StoreError> {
    draw(dataset, path).map_err(|e| StoreError::Plot {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn draw(dataset: &RegionYearDataset, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let points: Vec<(f64, f64, f64, bool)> = dataset
        .records
        .iter()
        .map(|r| {
            (
                f64::from(r.date.ordinal()),
                r.vegetation_index,
                r.cumulative_degree_days,
                r.is_peak,
            )
        })
        .collect();

    let x_range = padded_range(points.iter().map(|p| p.0), 1.0);
    let vegetation_range = padded_range(points.iter().map(|p| p.1), 0.05);
    let heat_range = padded_range(points.iter().map(|p| p.2), 10.0);

    let root = BitMapBackend::new(path, PLOT_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((2, 1));

    let mut vegetation_chart = ChartBuilder::on(&panels[0])
        .margin(16)
        .build_cartesian_2d(x_range.clone(), vegetation_range)?;

    vegetation_chart.draw_series(LineSeries::new(
        points.iter().map(|p| (p.0, p.1)),
        VEGETATION_COLOR.stroke_width(2),
    ))?;
    vegetation_chart.draw_series(
        points
            .iter()
            .filter(|p| p.3)
            .map(|p| Circle::new((p.0, p.1), 6, PEAK_COLOR.filled())),
    )?;

    let mut heat_chart = ChartBuilder::on(&panels[1])
        .margin(16)
        .build_cartesian_2d(x_range, heat_range)?;

    heat_chart.draw_series(LineSeries::new(
        points.iter().map(|p| (p.0, p.2)),
        HEAT_COLOR.stroke_width(2),
    ))?;

    root.present()?;
    Ok(())
}

/// Renders a bloom query curve as a PNG at `path`: the vegetation index
/// over `points` with a vertical marker on `bloom`.
///
/// # Errors
///
/// Returns [`StoreError::Plot`] if the image cannot be drawn or encoded.
pub fn render_curve(
    points: &[(NaiveDate, f64)],
    bloom: Option<NaiveDate>,
    path: &Path,
) -> Result<(), StoreError> {
    draw_curve(points, bloom, path).map_err(|e| StoreError::Plot {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn draw_curve(
    points: &[(NaiveDate, f64)],
    bloom: Option<NaiveDate>,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let series: Vec<(f64, f64)> = points
        .iter()
        .map(|(date, value)| (f64::from(date.ordinal()), *value))
        .collect();

    let x_range = padded_range(series.iter().map(|p| p.0), 1.0);
    let y_range = padded_range(series.iter().map(|p| p.1), 0.05);

    let root = BitMapBackend::new(path, PLOT_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(16)
        .build_cartesian_2d(x_range, y_range.clone())?;

    chart.draw_series(LineSeries::new(
        series.iter().copied(),
        VEGETATION_COLOR.stroke_width(2),
    ))?;

    let marker = bloom.and_then(|date| points.iter().position(|(d, _)| *d == date));
    if let Some(i) = marker {
        let (x, y) = series[i];
        chart.draw_series(std::iter::once(PathElement::new(
            vec![(x, y_range.start), (x, y_range.end)],
            BLOOM_COLOR.stroke_width(2),
        )))?;
        chart.draw_series(std::iter::once(Circle::new((x, y), 8, BLOOM_COLOR.filled())))?;
    }

    root.present()?;
    Ok(())
}

/// Finite min/max of `values` widened by `pad`, or `0..1` when empty.
fn padded_range(values: impl Iterator<Item = f64>, pad: f64) -> std::ops::Range<f64> {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if min > max {
        return 0.0..1.0;
    }
    (min - pad)..(max + pad)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_is_padded() {
        let range = padded_range([0.2, 0.8, f64::NAN].into_iter(), 0.1);
        assert!((range.start - 0.1).abs() < 1e-12);
        assert!((range.end - 0.9).abs() < 1e-12);
    }

    #[test]
    fn curve_with_bloom_marker_is_written() {
        let dir = std::env::temp_dir().join("bloom_watch_plot_curve");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("curve.png");

        let first = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let points: Vec<(NaiveDate, f64)> = first
            .iter_days()
            .take(30)
            .zip(0..)
            .map(|(date, i)| (date, 0.01f64.mul_add(f64::from(i), 0.2)))
            .collect();

        render_curve(&points, Some(points[12].0), &path).unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn empty_range_falls_back() {
        assert_eq!(padded_range(std::iter::empty(), 1.0), 0.0..1.0);
    }
}
