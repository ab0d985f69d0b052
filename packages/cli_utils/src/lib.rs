#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared CLI utilities for the bloom-watch binaries.
//!
//! Provides an `indicatif`-backed [`ProgressCallback`], [`init_logger`]
//! which routes `log` output through `indicatif-log-bridge` so log lines do
//! not tear progress bars, and a few `dialoguer` prompts shared by the
//! interactive modes.

use std::sync::Arc;
use std::time::Duration;

use bloom_watch_source::progress::ProgressCallback;
use chrono::NaiveDate;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};

pub use indicatif::MultiProgress;

/// An `indicatif` [`ProgressBar`] that implements [`ProgressCallback`].
pub struct IndicatifProgress {
    bar: ProgressBar,
    /// Style to switch to once `set_total()` provides a known length.
    bar_style: ProgressStyle,
}

impl IndicatifProgress {
    /// Creates a bar for the country loop of a batch run. Starts as a
    /// spinner and becomes a bar with ETA once the total is set.
    #[must_use]
    pub fn batch_bar(multi: &MultiProgress, message: &str) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message.to_string());

        let bar_style = ProgressStyle::with_template(
            "{msg} {wide_bar:.green/dim} {pos}/{len} {percent}% [{elapsed_precise} / {eta}]",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

        Arc::new(Self { bar, bar_style })
    }
}

impl ProgressCallback for IndicatifProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_style(self.bar_style.clone());
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }
}

/// Initializes the global logger wrapped in `indicatif-log-bridge` so that
/// `log::info!` and friends are suspended while progress bars redraw.
///
/// Returns the [`MultiProgress`] that all progress bars must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok(); // already set in tests

    log::set_max_level(level);

    multi
}

/// Prompts for a calendar year.
///
/// # Errors
///
/// Returns an error if the terminal cannot be read.
pub fn prompt_year(prompt: &str, default: i32) -> Result<i32, dialoguer::Error> {
    Input::new()
        .with_prompt(prompt)
        .default(default)
        .validate_with(|year: &i32| {
            if (1900..=2200).contains(year) {
                Ok(())
            } else {
                Err("year must be between 1900 and 2200")
            }
        })
        .interact_text()
}

/// Prompts for a `YYYY-MM-DD` date.
///
/// # Errors
///
/// Returns an error if the terminal cannot be read.
pub fn prompt_date(prompt: &str, default: NaiveDate) -> Result<NaiveDate, dialoguer::Error> {
    let text: String = Input::new()
        .with_prompt(format!("{prompt} (YYYY-MM-DD)"))
        .default(default.format("%Y-%m-%d").to_string())
        .validate_with(|s: &String| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map(|_| ())
                .map_err(|e| e.to_string())
        })
        .interact_text()?;
    Ok(NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").unwrap_or(default))
}

/// Prompts for a number.
///
/// # Errors
///
/// Returns an error if the terminal cannot be read.
pub fn prompt_f64(prompt: &str, default: f64) -> Result<f64, dialoguer::Error> {
    Input::new()
        .with_prompt(prompt)
        .default(default)
        .validate_with(|v: &f64| {
            if v.is_finite() {
                Ok(())
            } else {
                Err("value must be a finite number")
            }
        })
        .interact_text()
}
