#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for bloom date queries.

use std::path::PathBuf;
use std::str::FromStr;

use bloom_watch_config::PipelineConfig;
use bloom_watch_query::{
    QueryError, default_start, estimate_bloom, resolve_thresholds, search_regions,
};
use bloom_watch_series_models::PlantPreset;
use bloom_watch_store::CsvOutputStore;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "bloom_watch_query", about = "Bloom date estimation from stored datasets")]
struct Cli {
    /// Path to a TOML config file (defaults to `BLOOM_WATCH_CONFIG`)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Dataset directory (overrides the config file)
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate the bloom date of a region
    Bloom {
        /// Region key, e.g. `Japan_Tokyo`
        #[arg(long)]
        region: String,
        /// Year to estimate
        #[arg(long)]
        year: i32,
        /// Plant preset (sakura, magnolia, plum, camellia, manual)
        #[arg(long, value_parser = parse_plant)]
        plant: Option<PlantPreset>,
        /// Cumulative degree-day threshold
        #[arg(long)]
        gdd: Option<f64>,
        /// Vegetation slope threshold
        #[arg(long)]
        slope: Option<f64>,
        /// First date considered, `YYYY-MM-DD` (defaults to March 1)
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Print the vegetation curve behind the estimate
        #[arg(long)]
        show_data: bool,
        /// Write a PNG of the curve with the bloom marked
        #[arg(long)]
        plot: Option<PathBuf>,
    },
    /// List regions with stored datasets
    Regions {
        /// Case-insensitive substring filter
        #[arg(long)]
        search: Option<String>,
    },
}

fn parse_plant(s: &str) -> Result<PlantPreset, String> {
    PlantPreset::from_str(s).map_err(|_| {
        let names: Vec<String> = PlantPreset::ALL.iter().map(ToString::to_string).collect();
        format!("unknown plant '{s}', expected one of: {}", names.join(", "))
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _multi = bloom_watch_cli_utils::init_logger();
    let cli = Cli::parse();
    let mut config = PipelineConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }
    let store = CsvOutputStore::new(&config.output_dir);

    let Some(command) = cli.command else {
        return bloom_watch_query::interactive::run(&store, &config);
    };

    match command {
        Commands::Bloom {
            region,
            year,
            plant,
            gdd,
            slope,
            start,
            show_data,
            plot,
        } => {
            let thresholds = resolve_thresholds(plant, gdd, slope)?;
            let start = match start {
                Some(date) => date,
                None => default_start(year)?,
            };

            match estimate_bloom(&store, &region, year, thresholds, start, &config) {
                Ok(estimate) => {
                    println!("{estimate}");
                    if show_data {
                        print!("{}", estimate.curve_table());
                    }
                    if let Some(path) = plot {
                        estimate.render_plot(&path)?;
                        println!("Curve written to {}", path.display());
                    }
                }
                Err(e @ QueryError::DataNotFound { .. }) => println!("{e}"),
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Regions { search } => {
            let regions = search_regions(&store, search.as_deref())?;
            if regions.is_empty() {
                println!("No regions found in {}", config.output_dir.display());
            }
            for region in regions {
                println!("{region}");
            }
        }
    }

    Ok(())
}
