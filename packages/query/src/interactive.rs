//! Interactive bloom query.
//!
//! Walks region search and selection, plant preset, year, start date and
//! manual thresholds with `dialoguer` prompts, then offers the curve as a
//! table or an image.

use std::path::Path;

use bloom_watch_cli_utils::{prompt_date, prompt_f64, prompt_year};
use bloom_watch_config::PipelineConfig;
use bloom_watch_series_models::{BloomThresholds, PlantPreset};
use bloom_watch_store::OutputStore;
use chrono::{Datelike, Local};
use dialoguer::{Confirm, FuzzySelect, Input, Select};

use crate::{BloomEstimate, QueryError, default_start, estimate_bloom, search_regions};

/// Runs interactive queries until the user stops.
///
/// # Errors
///
/// Returns an error if a prompt fails or a stored dataset is unreadable.
pub fn run(store: &dyn OutputStore, config: &PipelineConfig) -> Result<(), Box<dyn std::error::Error>> {
    let regions = search_regions(store, None)?;
    if regions.is_empty() {
        println!("No stored datasets found in {}.", config.output_dir.display());
        return Ok(());
    }

    loop {
        let idx = FuzzySelect::new()
            .with_prompt("Region (type to search)")
            .items(&regions)
            .default(0)
            .max_length(15)
            .interact()?;
        let region = &regions[idx];

        let thresholds = prompt_thresholds()?;
        let year = prompt_year("Year", Local::now().year())?;
        let start = prompt_date("Start date", default_start(year)?)?;

        match estimate_bloom(store, region, year, thresholds, start, config) {
            Ok(estimate) => {
                println!("{estimate}");
                offer_curve(&estimate, config)?;
            }
            Err(e @ (QueryError::DataNotFound { .. } | QueryError::Analysis(_))) => {
                println!("{e}");
            }
            Err(e) => return Err(e.into()),
        }

        let again = Confirm::new()
            .with_prompt("Run another query?")
            .default(false)
            .interact()?;
        if !again {
            return Ok(());
        }
    }
}

fn offer_curve(
    estimate: &BloomEstimate,
    config: &PipelineConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    if estimate.curve.is_empty() {
        return Ok(());
    }

    let show = Confirm::new()
        .with_prompt("Show the vegetation curve?")
        .default(false)
        .interact()?;
    if show {
        print!("{}", estimate.curve_table());
    }

    let save = Confirm::new()
        .with_prompt("Save a plot of the curve?")
        .default(false)
        .interact()?;
    if save {
        let default = config
            .output_dir
            .join(format!("{}_{}_bloom.png", estimate.region, estimate.year));
        let path: String = Input::new()
            .with_prompt("Plot file")
            .default(default.display().to_string())
            .interact_text()?;
        match estimate.render_plot(Path::new(&path)) {
            Ok(()) => println!("Curve written to {path}"),
            Err(e) => println!("{e}"),
        }
    }
    Ok(())
}

fn prompt_thresholds() -> Result<BloomThresholds, dialoguer::Error> {
    let labels: Vec<&str> = PlantPreset::ALL.iter().map(|p| p.label()).collect();
    let idx = Select::new()
        .with_prompt("Plant type")
        .items(&labels)
        .default(0)
        .interact()?;

    if let Some(thresholds) = PlantPreset::ALL[idx].thresholds() {
        return Ok(thresholds);
    }

    let defaults = BloomThresholds::MANUAL_DEFAULT;
    let gdd = prompt_f64("Cumulative degree-day threshold", defaults.gdd_threshold)?;
    let slope = prompt_f64("Vegetation slope threshold (NDVI per day)", defaults.slope_threshold)?;
    Ok(BloomThresholds::new(gdd, slope))
}
