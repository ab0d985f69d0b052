#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Batch builder for per-region vegetation and degree-day datasets.
//!
//! Walks the country registry in order, loads each country's first-level
//! regions, and for every region-year not already stored fetches both
//! series, merges them and persists the result. Failures are logged and
//! confined to the region-year they happened in.

pub mod interactive;

use std::time::Instant;

use bloom_watch_analytics::AnalysisError;
use bloom_watch_config::PipelineConfig;
use bloom_watch_geography::gadm::GadmBoundarySource;
use bloom_watch_geography::{BoundarySource, GeographyError};
use bloom_watch_geography_models::{Country, Region, all_countries};
use bloom_watch_source::imagery::ImageryVegetationSource;
use bloom_watch_source::power::PowerTemperatureSource;
use bloom_watch_source::progress::ProgressCallback;
use bloom_watch_source::{SourceError, TemperatureSource, VegetationSource};
use bloom_watch_store::{OutputStore, StoreError};
use thiserror::Error;

/// Environment variable holding a default country filter.
pub const COUNTRIES_ENV_VAR: &str = "BLOOM_WATCH_COUNTRIES";

/// Errors that fail a single region-year.
#[derive(Debug, Error)]
pub enum IngestError {
    /// A time-series fetch failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Merging the series failed.
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// Persisting the dataset failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// External collaborators of a batch run.
pub struct Sources<'a> {
    /// Level-1 boundary supplier.
    pub boundaries: &'a dyn BoundarySource,
    /// Vegetation-index supplier.
    pub vegetation: &'a dyn VegetationSource,
    /// Temperature supplier.
    pub temperature: &'a dyn TemperatureSource,
}

/// The production collaborators: GADM boundaries, the imagery reduction
/// service and NASA POWER, sharing one HTTP client.
pub struct LiveSources {
    boundaries: GadmBoundarySource,
    vegetation: ImageryVegetationSource,
    temperature: PowerTemperatureSource,
}

impl LiveSources {
    /// Builds the live sources from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &PipelineConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("bloom-watch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            boundaries: GadmBoundarySource::new(client.clone(), config.boundaries.clone()),
            vegetation: ImageryVegetationSource::new(client.clone(), config.imagery.clone()),
            temperature: PowerTemperatureSource::new(client, config.power.clone()),
        })
    }

    /// Borrows the collaborators for a run.
    #[must_use]
    pub fn sources(&self) -> Sources<'_> {
        Sources {
            boundaries: &self.boundaries,
            vegetation: &self.vegetation,
            temperature: &self.temperature,
        }
    }
}

/// What happened to one region-year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionOutcome {
    /// A dataset was written.
    Processed {
        /// Merged rows written.
        rows: usize,
        /// Rows flagged as peaks.
        peaks: usize,
    },
    /// Output already existed; nothing was fetched.
    Skipped,
    /// The two series shared no dates; nothing was written.
    NoData,
}

/// Tally of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Region-years written.
    pub processed: usize,
    /// Region-years already present.
    pub skipped: usize,
    /// Region-years with no overlapping data.
    pub no_data: usize,
    /// Region-years or countries that failed.
    pub failed: usize,
}

impl BatchReport {
    fn record(&mut self, outcome: &RegionOutcome) {
        match outcome {
            RegionOutcome::Processed { .. } => self.processed += 1,
            RegionOutcome::Skipped => self.skipped += 1,
            RegionOutcome::NoData => self.no_data += 1,
        }
    }
}

/// Returns the countries to process, filtered by a comma-separated list of
/// ISO alpha-3 codes or names from `cli_filter` or the
/// [`COUNTRIES_ENV_VAR`] environment variable. Without a filter every
/// registry country is returned.
#[must_use]
pub fn select_countries(cli_filter: Option<String>) -> Vec<Country> {
    let filter = cli_filter.or_else(|| std::env::var(COUNTRIES_ENV_VAR).ok());
    let all = all_countries();

    let Some(filter_str) = filter else {
        return all;
    };

    let wanted: Vec<String> = filter_str
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();

    let filtered: Vec<Country> = all
        .into_iter()
        .filter(|c| {
            wanted
                .iter()
                .any(|w| *w == c.iso3.to_lowercase() || *w == c.name.to_lowercase())
        })
        .collect();

    if filtered.is_empty() {
        log::warn!("No countries match filter {wanted:?}");
    }

    filtered
}

/// Fetches, merges and stores one region-year unless it already exists.
///
/// # Errors
///
/// Returns [`IngestError`] if a fetch, the merge or the write fails.
pub async fn process_region(
    region: &Region,
    year: i32,
    sources: &Sources<'_>,
    store: &dyn OutputStore,
    config: &PipelineConfig,
) -> Result<RegionOutcome, IngestError> {
    let key = region.key();

    if store.exists(&key, year) {
        log::info!("Skipping {key} {year} (already processed)");
        return Ok(RegionOutcome::Skipped);
    }

    log::info!(
        "Processing {key} {year} at ({:.2}, {:.2})",
        region.centroid.latitude,
        region.centroid.longitude
    );

    let vegetation = sources.vegetation.fetch_vegetation(region, year).await?;
    let temperature = sources.temperature.fetch_temperature(region, year).await?;
    log::debug!(
        "{key}: {} samples from {}, {} from {}",
        vegetation.len(),
        sources.vegetation.id(),
        temperature.len(),
        sources.temperature.id(),
    );

    let dataset =
        bloom_watch_analytics::build_dataset(&key, year, &vegetation, &temperature, config)?;

    if dataset.is_empty() {
        log::warn!("{key} {year}: no overlapping vegetation and temperature data");
        return Ok(RegionOutcome::NoData);
    }

    store.write(&dataset)?;

    Ok(RegionOutcome::Processed {
        rows: dataset.records.len(),
        peaks: dataset.records.iter().filter(|r| r.is_peak).count(),
    })
}

/// Processes the first `config.regions_per_country` regions of every
/// country in `countries`, one at a time.
///
/// Each failure is logged and counted; the batch always runs to the end.
/// After every region that was not skipped the runner pauses for
/// `config.rate_limit_delay`.
pub async fn run_batch(
    countries: &[Country],
    year: i32,
    sources: &Sources<'_>,
    store: &dyn OutputStore,
    config: &PipelineConfig,
    progress: &dyn ProgressCallback,
) -> BatchReport {
    let start = Instant::now();
    let mut report = BatchReport::default();
    progress.set_total(countries.len() as u64);

    for country in countries {
        progress.set_message(format!("{} ({})", country.name, country.iso3));

        let regions = match sources.boundaries.regions(country).await {
            Ok(regions) => regions,
            Err(GeographyError::NotFound { .. }) => {
                log::warn!("No boundaries for {}, skipping", country.name);
                progress.inc(1);
                continue;
            }
            Err(e) => {
                log::error!("Failed to load boundaries for {}: {e}", country.name);
                report.failed += 1;
                progress.inc(1);
                continue;
            }
        };

        if regions.is_empty() {
            log::warn!("No level-1 regions for {}, skipping", country.name);
        }

        for region in regions.iter().take(config.regions_per_country) {
            match process_region(region, year, sources, store, config).await {
                Ok(outcome) => {
                    report.record(&outcome);
                    if outcome == RegionOutcome::Skipped {
                        continue;
                    }
                }
                Err(e) => {
                    log::error!("Error processing {} {year}: {e}", region.key());
                    report.failed += 1;
                }
            }
            tokio::time::sleep(config.rate_limit_delay()).await;
        }

        progress.inc(1);
    }

    let elapsed = start.elapsed();
    let summary = format!(
        "{year}: {} processed, {} skipped, {} no data, {} failed in {:.1}s",
        report.processed,
        report.skipped,
        report.no_data,
        report.failed,
        elapsed.as_secs_f64()
    );
    log::info!("Batch complete: {summary}");
    progress.finish(summary);

    report
}
