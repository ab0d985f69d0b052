//! Progress reporting for the batch runner.
//!
//! The runner reports one unit of work per country; rendering is left to
//! the caller (an `indicatif` bar in the binaries, nothing in tests).

/// Receives progress updates from a long-running batch.
pub trait ProgressCallback: Send + Sync {
    /// Sets the total number of units (countries) in the batch.
    fn set_total(&self, total: u64);

    /// Advances by `delta` units.
    fn inc(&self, delta: u64);

    /// Replaces the message shown next to the indicator.
    fn set_message(&self, msg: String);

    /// Marks the batch as complete.
    fn finish(&self, msg: String);
}

/// Ignores every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}
