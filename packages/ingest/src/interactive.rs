//! Interactive mode for the dataset builder.
//!
//! Menu-driven `dialoguer` prompts for running a batch without
//! remembering CLI flags.

use std::path::PathBuf;

use bloom_watch_cli_utils::{IndicatifProgress, MultiProgress, prompt_year};
use bloom_watch_config::PipelineConfig;
use bloom_watch_geography_models::{Country, all_countries};
use bloom_watch_store::CsvOutputStore;
use dialoguer::{Confirm, Input, MultiSelect, Select};

use crate::{LiveSources, run_batch};

/// Top-level actions available in the interactive menu.
enum IngestAction {
    BuildDatasets,
    ListCountries,
}

impl IngestAction {
    const ALL: &[Self] = &[Self::BuildDatasets, Self::ListCountries];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::BuildDatasets => "Build datasets for a year",
            Self::ListCountries => "List countries",
        }
    }
}

/// Runs the interactive menu.
///
/// # Errors
///
/// Returns an error if a prompt fails or the HTTP client cannot be built.
pub async fn run(
    config: &PipelineConfig,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    let labels: Vec<&str> = IngestAction::ALL.iter().map(IngestAction::label).collect();

    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    match IngestAction::ALL[idx] {
        IngestAction::BuildDatasets => build_datasets(config.clone(), multi).await?,
        IngestAction::ListCountries => list_countries(),
    }

    Ok(())
}

async fn build_datasets(
    mut config: PipelineConfig,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    let year = prompt_year("Year to process", config.last_history_year)?;
    let countries = prompt_countries()?;
    if countries.is_empty() {
        println!("No countries selected.");
        return Ok(());
    }

    config.regions_per_country = Input::new()
        .with_prompt("Regions per country")
        .default(config.regions_per_country)
        .validate_with(|n: &usize| if *n > 0 { Ok(()) } else { Err("must be at least 1") })
        .interact_text()?;

    let output_dir: String = Input::new()
        .with_prompt("Output directory")
        .default(config.output_dir.display().to_string())
        .interact_text()?;
    config.output_dir = PathBuf::from(output_dir);

    let proceed = Confirm::new()
        .with_prompt(format!(
            "Process {year} for {} country(ies), {} region(s) each?",
            countries.len(),
            config.regions_per_country
        ))
        .default(true)
        .interact()?;
    if !proceed {
        return Ok(());
    }

    let live = LiveSources::new(&config)?;
    let store = CsvOutputStore::new(&config.output_dir);
    let progress = IndicatifProgress::batch_bar(multi, "Countries");

    let report = run_batch(
        &countries,
        year,
        &live.sources(),
        &store,
        &config,
        progress.as_ref(),
    )
    .await;

    println!(
        "Processed {}, skipped {}, no data {}, failed {}",
        report.processed, report.skipped, report.no_data, report.failed
    );

    Ok(())
}

/// Prompts for countries via checkboxes. Selecting nothing means every
/// country.
fn prompt_countries() -> Result<Vec<Country>, dialoguer::Error> {
    let all = all_countries();
    let labels: Vec<String> = all
        .iter()
        .map(|c| format!("{} ({})", c.name, c.iso3))
        .collect();

    let selected = MultiSelect::new()
        .with_prompt("Select countries (space=toggle, a=all, enter=confirm; none selects all)")
        .items(&labels)
        .max_length(20)
        .interact()?;

    if selected.is_empty() {
        return Ok(all);
    }

    Ok(selected.into_iter().map(|i| all[i].clone()).collect())
}

fn list_countries() {
    println!("{:<6} NAME", "ISO3");
    println!("{}", "-".repeat(50));
    for country in all_countries() {
        println!("{:<6} {}", country.iso3, country.name);
    }
}
