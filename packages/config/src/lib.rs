#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Pipeline configuration.
//!
//! Every tunable of the batch runner and the bloom query lives in
//! [`PipelineConfig`]. It is deserialized from a TOML file whose fields are
//! all optional; anything left out falls back to the documented default.
//!
//! The file is located by an explicit path (the `--config` flag) or the
//! `BLOOM_WATCH_CONFIG` environment variable. With neither set the
//! defaults are used as-is.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV_VAR: &str = "BLOOM_WATCH_CONFIG";

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Io {
        /// File that failed to load.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`PipelineConfig`].
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is outside its allowed range.
    #[error("Invalid config value for {field}: {message}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },
}

/// Top-level configuration for the pipeline.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Base temperature for degree-day accumulation, degrees Celsius.
    pub base_temperature: f64,
    /// Number of historical years pooled to train the forecast model.
    pub lookback_years: u32,
    /// Most recent year with observed data. Queries for later years take
    /// the forecast path.
    pub last_history_year: i32,
    /// Linear warming trend added per year beyond the training data.
    pub warming_rate: f64,
    /// Pause between regions, in seconds.
    pub rate_limit_delay: f64,
    /// Absolute minimum vegetation index for historical peaks.
    pub min_peak_height: f64,
    /// Percentile of the predicted curve used as the forecast peak height.
    pub forecast_peak_percentile: f64,
    /// Number of level-1 units processed per country.
    pub regions_per_country: usize,
    /// Directory holding persisted region-year outputs.
    pub output_dir: PathBuf,
    /// Random forest settings.
    pub forest: ForestConfig,
    /// NASA POWER climate API settings.
    pub power: PowerConfig,
    /// Imagery reduction service settings.
    pub imagery: ImageryConfig,
    /// GADM boundary source settings.
    pub boundaries: BoundaryConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_temperature: 5.0,
            lookback_years: 6,
            last_history_year: 2024,
            warming_rate: 3.0,
            rate_limit_delay: 1.0,
            min_peak_height: 0.5,
            forecast_peak_percentile: 90.0,
            regions_per_country: 1,
            output_dir: PathBuf::from("world"),
            forest: ForestConfig::default(),
            power: PowerConfig::default(),
            imagery: ImageryConfig::default(),
            boundaries: BoundaryConfig::default(),
        }
    }
}

/// Random forest hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForestConfig {
    /// Number of trees.
    pub n_estimators: usize,
    /// Maximum tree depth.
    pub max_depth: usize,
    /// Minimum samples required to split a node.
    pub min_samples_split: usize,
    /// RNG seed for bootstrap sampling.
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 50,
            max_depth: 5,
            min_samples_split: 2,
            seed: 42,
        }
    }
}

/// NASA POWER daily point API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PowerConfig {
    /// Endpoint URL.
    pub base_url: String,
    /// Parameter to request.
    pub parameter: String,
    /// User community.
    pub community: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://power.larc.nasa.gov/api/temporal/daily/point".to_string(),
            parameter: "T2M".to_string(),
            community: "AG".to_string(),
            timeout_secs: 30,
        }
    }
}

/// An imagery collection and the last year it applies to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectionEntry {
    /// Collection identifier.
    pub id: String,
    /// Last year served by this collection. `None` means open-ended.
    #[serde(default)]
    pub until_year: Option<i32>,
}

/// Imagery reduction service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageryConfig {
    /// Endpoint accepting reduction requests.
    pub base_url: String,
    /// Band to reduce.
    pub band: String,
    /// Ground sampling distance in meters.
    pub scale_meters: f64,
    /// Pixel cap for a single reduction.
    pub max_pixels: f64,
    /// Multiplier from stored band values to unit-scale index values.
    /// MODIS stores NDVI as integers times 10^4.
    pub scale_factor: f64,
    /// Collections in ascending `until_year` order.
    pub collections: Vec<CollectionEntry>,
    /// Environment variable holding a bearer token, if the service needs one.
    pub token_env: Option<String>,
}

impl Default for ImageryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8765/reduce".to_string(),
            band: "NDVI".to_string(),
            scale_meters: 250.0,
            max_pixels: 1e13,
            scale_factor: 0.0001,
            collections: vec![
                CollectionEntry {
                    id: "MODIS/006/MOD13Q1".to_string(),
                    until_year: Some(2023),
                },
                CollectionEntry {
                    id: "MODIS/061/MOD13Q1".to_string(),
                    until_year: None,
                },
            ],
            token_env: Some("BLOOM_WATCH_IMAGERY_TOKEN".to_string()),
        }
    }
}

impl ImageryConfig {
    /// Returns the collection serving `year`: the first entry whose
    /// `until_year` is at or after it, else the last entry.
    #[must_use]
    pub fn collection_for_year(&self, year: i32) -> Option<&str> {
        self.collections
            .iter()
            .find(|c| c.until_year.is_none_or(|until| year <= until))
            .or_else(|| self.collections.last())
            .map(|c| c.id.as_str())
    }
}

/// GADM level-1 boundary source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BoundaryConfig {
    /// URL with an `{iso3}` placeholder.
    pub url_template: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            url_template: "https://geodata.ucdavis.edu/gadm/gadm4.1/json/gadm41_{iso3}_1.json"
                .to_string(),
            timeout_secs: 30,
        }
    }
}

impl BoundaryConfig {
    /// Expands the template for one country.
    #[must_use]
    pub fn url_for(&self, iso3: &str) -> String {
        self.url_template.replace("{iso3}", iso3)
    }
}

impl PipelineConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the document is malformed or a value is
    /// out of range.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::de::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from `path`, falling back to the
    /// [`CONFIG_ENV_VAR`] environment variable and then to the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from));

        let Some(path) = path else {
            log::debug!("No config file given, using defaults");
            return Ok(Self::default());
        };

        log::info!("Loading config from {}", path.display());
        let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Pause inserted between regions.
    #[must_use]
    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_secs_f64(self.rate_limit_delay)
    }

    /// Years pooled to train a forecast for `target_year`, oldest first.
    ///
    /// The window ends at the last history year or the year before the
    /// target, whichever is earlier.
    #[must_use]
    pub fn training_years(&self, target_year: i32) -> Vec<i32> {
        let end = self.last_history_year.min(target_year - 1);
        let span = i32::try_from(self.lookback_years).unwrap_or(i32::MAX);
        let start = end.saturating_sub(span.saturating_sub(1));
        (start..=end).collect()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.base_temperature.is_finite() {
            return Err(ConfigError::Invalid {
                field: "base_temperature",
                message: "must be finite".to_string(),
            });
        }
        if !self.warming_rate.is_finite() {
            return Err(ConfigError::Invalid {
                field: "warming_rate",
                message: "must be finite".to_string(),
            });
        }
        if !self.rate_limit_delay.is_finite() || self.rate_limit_delay < 0.0 {
            return Err(ConfigError::Invalid {
                field: "rate_limit_delay",
                message: format!("must be a non-negative number of seconds, got {}", self.rate_limit_delay),
            });
        }
        if self.lookback_years == 0 {
            return Err(ConfigError::Invalid {
                field: "lookback_years",
                message: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=100.0).contains(&self.forecast_peak_percentile) {
            return Err(ConfigError::Invalid {
                field: "forecast_peak_percentile",
                message: format!("must be within 0..=100, got {}", self.forecast_peak_percentile),
            });
        }
        if self.regions_per_country == 0 {
            return Err(ConfigError::Invalid {
                field: "regions_per_country",
                message: "must be at least 1".to_string(),
            });
        }
        if self.forest.n_estimators == 0 || self.forest.max_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "forest",
                message: "n_estimators and max_depth must be at least 1".to_string(),
            });
        }
        if !self.imagery.scale_factor.is_finite() || self.imagery.scale_factor <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "imagery.scale_factor",
                message: format!("must be positive, got {}", self.imagery.scale_factor),
            });
        }
        if self.imagery.collections.is_empty() {
            return Err(ConfigError::Invalid {
                field: "imagery.collections",
                message: "at least one collection is required".to_string(),
            });
        }
        Ok(())
    }
}
