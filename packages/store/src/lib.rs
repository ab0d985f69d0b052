#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Persistence of per-region-year datasets.
//!
//! [`OutputStore`] is the capability the batch runner and the query front
//! end share. [`CsvOutputStore`] keeps one CSV table and one PNG curve per
//! region-year in a flat directory. The CSV is always renamed into place
//! last, so its presence marks a completed unit and drives skip-on-exists.

pub mod csv_store;
pub mod paths;
pub mod plot;

use std::path::PathBuf;

use bloom_watch_series_models::RegionYearDataset;
use thiserror::Error;

pub use csv_store::CsvOutputStore;

/// Errors that can occur while reading or writing outputs.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// CSV encoding or decoding failed.
    #[error("CSV error in {path}: {source}")]
    Csv {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        source: csv::Error,
    },

    /// The CSV header is missing required columns.
    #[error("{path} is missing columns: {}", missing.join(", "))]
    Schema {
        /// File involved.
        path: PathBuf,
        /// Columns that were expected but absent.
        missing: Vec<String>,
    },

    /// A cell held a value outside its domain.
    #[error("Invalid value in {path} at row {row}: {message}")]
    InvalidValue {
        /// File involved.
        path: PathBuf,
        /// 1-based data row.
        row: usize,
        /// Description of what went wrong.
        message: String,
    },

    /// Rendering the curve image failed.
    #[error("Plot error for {path}: {message}")]
    Plot {
        /// Image path.
        path: PathBuf,
        /// Description of what went wrong.
        message: String,
    },
}

/// Storage for merged region-year datasets.
pub trait OutputStore: Send + Sync {
    /// Whether a completed dataset exists for `region` and `year`.
    fn exists(&self, region: &str, year: i32) -> bool;

    /// Persists `dataset` under its region key and year, replacing any
    /// previous output.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if any output cannot be written. A failed
    /// write never leaves a dataset that [`Self::exists`] reports.
    fn write(&self, dataset: &RegionYearDataset) -> Result<(), StoreError>;

    /// Loads the dataset for `region` and `year`, or `None` if it was never
    /// written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the stored table is unreadable or
    /// malformed.
    fn read(&self, region: &str, year: i32) -> Result<Option<RegionYearDataset>, StoreError>;

    /// Region keys with at least one stored year, sorted and deduplicated.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be listed.
    fn list_regions(&self) -> Result<Vec<String>, StoreError>;
}
