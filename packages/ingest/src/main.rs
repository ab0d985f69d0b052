#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the bloom-watch dataset builder.

use std::path::PathBuf;

use bloom_watch_cli_utils::IndicatifProgress;
use bloom_watch_config::PipelineConfig;
use bloom_watch_geography_models::all_countries;
use bloom_watch_ingest::{LiveSources, run_batch, select_countries};
use bloom_watch_store::CsvOutputStore;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "bloom_watch_ingest", about = "Vegetation and degree-day dataset builder")]
struct Cli {
    /// Path to a TOML config file (defaults to `BLOOM_WATCH_CONFIG`)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build datasets for one year across the country registry
    Run {
        /// Year to process
        #[arg(long)]
        year: i32,
        /// Comma-separated ISO alpha-3 codes or names (overrides `BLOOM_WATCH_COUNTRIES`)
        #[arg(long)]
        countries: Option<String>,
        /// Number of level-1 regions to process per country
        #[arg(long)]
        regions_per_country: Option<usize>,
        /// Output directory (overrides the config file)
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// List the country registry
    Countries,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = bloom_watch_cli_utils::init_logger();
    let cli = Cli::parse();
    let mut config = PipelineConfig::load(cli.config.as_deref())?;

    let Some(command) = cli.command else {
        return bloom_watch_ingest::interactive::run(&config, &multi).await;
    };

    match command {
        Commands::Countries => {
            println!("{:<6} NAME", "ISO3");
            println!("{}", "-".repeat(50));
            for country in all_countries() {
                println!("{:<6} {}", country.iso3, country.name);
            }
        }
        Commands::Run {
            year,
            countries,
            regions_per_country,
            output_dir,
        } => {
            if let Some(n) = regions_per_country {
                config.regions_per_country = n.max(1);
            }
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }

            let countries = select_countries(countries);
            log::info!(
                "Building {year} datasets for {} country(ies) into {}",
                countries.len(),
                config.output_dir.display()
            );

            let live = LiveSources::new(&config)?;
            let store = CsvOutputStore::new(&config.output_dir);
            let progress = IndicatifProgress::batch_bar(&multi, "Countries");

            let report = run_batch(
                &countries,
                year,
                &live.sources(),
                &store,
                &config,
                progress.as_ref(),
            )
            .await;

            if report.failed > 0 {
                log::warn!("{} region-year(s) failed; rerun to retry them", report.failed);
            }
        }
    }

    Ok(())
}
