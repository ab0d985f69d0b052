//! Seeded random-forest regressor.
//!
//! Thin wrapper over `smartcore`'s [`RandomForestRegressor`] that takes its
//! hyperparameters from [`ForestConfig`], validates training rows up
//! front and considers every feature at each split. The same seed and
//! training data always produce the same forest.

use bloom_watch_config::ForestConfig;
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;

use crate::AnalysisError;

type Regressor = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// A trained forest.
pub struct RandomForest {
    model: Regressor,
    n_trees: usize,
    n_features: usize,
}

impl RandomForest {
    /// Fits a forest to `features` (one row per sample) and `targets`.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::InvalidTrainingData`] if there are no rows,
    /// the row and target counts differ, rows have differing widths, any
    /// value is non-finite, or the regressor rejects the data.
    pub fn fit(
        features: &[Vec<f64>],
        targets: &[f64],
        config: &ForestConfig,
    ) -> Result<Self, AnalysisError> {
        let n_features = validate(features, targets)?;
        let n_trees = config.n_estimators.max(1);

        let parameters = RandomForestRegressorParameters::default()
            .with_n_trees(n_trees)
            .with_max_depth(u16::try_from(config.max_depth).unwrap_or(u16::MAX))
            .with_min_samples_split(config.min_samples_split.max(2))
            .with_m(n_features)
            .with_seed(config.seed);

        let x = matrix(features)?;
        let y = targets.to_vec();
        let model = Regressor::fit(&x, &y, parameters).map_err(training_error)?;

        log::debug!(
            "Fitted random forest: {n_trees} trees on {} rows x {n_features} features",
            features.len()
        );

        Ok(Self {
            model,
            n_trees,
            n_features,
        })
    }

    /// Predicts the target for each row of `rows`, in order.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::InvalidTrainingData`] if a row does not
    /// have the training width or the regressor fails.
    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, AnalysisError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(row) = rows.iter().find(|r| r.len() != self.n_features) {
            return Err(AnalysisError::InvalidTrainingData {
                message: format!("expected {} features, got {}", self.n_features, row.len()),
            });
        }
        self.model.predict(&matrix(rows)?).map_err(training_error)
    }

    /// Number of trees in the forest.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.n_trees
    }

    /// Whether the forest has no trees. Never true for a fitted forest.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.n_trees == 0
    }
}

fn matrix(rows: &[Vec<f64>]) -> Result<DenseMatrix<f64>, AnalysisError> {
    DenseMatrix::from_2d_vec(&rows.to_vec()).map_err(training_error)
}

#[allow(clippy::needless_pass_by_value)]
fn training_error(e: smartcore::error::Failed) -> AnalysisError {
    AnalysisError::InvalidTrainingData {
        message: e.to_string(),
    }
}

fn validate(features: &[Vec<f64>], targets: &[f64]) -> Result<usize, AnalysisError> {
    let Some(first) = features.first() else {
        return Err(AnalysisError::InvalidTrainingData {
            message: "no training rows".to_string(),
        });
    };
    if features.len() != targets.len() {
        return Err(AnalysisError::InvalidTrainingData {
            message: format!("{} rows but {} targets", features.len(), targets.len()),
        });
    }
    let width = first.len();
    if width == 0 {
        return Err(AnalysisError::InvalidTrainingData {
            message: "rows have no features".to_string(),
        });
    }
    if let Some(row) = features.iter().position(|r| r.len() != width) {
        return Err(AnalysisError::InvalidTrainingData {
            message: format!("row {row} has {} features, expected {width}", features[row].len()),
        });
    }
    let all_finite = features.iter().flatten().chain(targets).all(|v| v.is_finite());
    if !all_finite {
        return Err(AnalysisError::InvalidTrainingData {
            message: "non-finite value in training data".to_string(),
        });
    }
    Ok(width)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ForestConfig {
        ForestConfig::default()
    }

    /// Smooth deterministic target over a 2-feature grid.
    fn target(x0: f64, x1: f64) -> f64 {
        0.08f64.mul_add(x0, 0.02 * x1)
    }

    fn grid() -> (Vec<Vec<f64>>, Vec<f64>) {
        let mut features = Vec::new();
        let mut targets = Vec::new();
        for a in 0..20 {
            for b in 0..5 {
                let (x0, x1) = (f64::from(a), f64::from(b) * 2.0);
                features.push(vec![x0, x1]);
                targets.push(target(x0, x1));
            }
        }
        (features, targets)
    }

    #[test]
    fn predicts_held_out_points_closely() {
        let (features, targets) = grid();
        let forest = RandomForest::fit(&features, &targets, &config()).unwrap();
        assert_eq!(forest.len(), 50);

        let held_out: Vec<Vec<f64>> = (1..19).map(|a| vec![f64::from(a) + 0.5, 3.0]).collect();
        let predictions = forest.predict(&held_out).unwrap();
        assert_eq!(predictions.len(), held_out.len());

        let mut total_error = 0.0;
        for (row, predicted) in held_out.iter().zip(&predictions) {
            let error = (predicted - target(row[0], row[1])).abs();
            assert!(error < 0.2, "error {error} at x0={}", row[0]);
            total_error += error;
        }
        assert!(total_error / 18.0 < 0.1);
    }

    #[test]
    fn same_seed_same_predictions() {
        let (features, targets) = grid();
        let a = RandomForest::fit(&features, &targets, &config()).unwrap();
        let b = RandomForest::fit(&features, &targets, &config()).unwrap();
        let rows: Vec<Vec<f64>> = [0.0, 3.3, 7.9, 15.2].iter().map(|&x0| vec![x0, 4.0]).collect();
        let pa = a.predict(&rows).unwrap();
        let pb = b.predict(&rows).unwrap();
        for (x, y) in pa.iter().zip(&pb) {
            assert!((x - y).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn constant_target_predicts_constant() {
        let features = vec![vec![1.0], vec![2.0], vec![3.0]];
        let targets = vec![0.4, 0.4, 0.4];
        let forest = RandomForest::fit(&features, &targets, &config()).unwrap();
        let predicted = forest.predict(&[vec![10.0]]).unwrap();
        assert!((predicted[0] - 0.4).abs() < 1e-9);
    }

    #[test]
    fn rejects_rows_of_the_wrong_width() {
        let (features, targets) = grid();
        let forest = RandomForest::fit(&features, &targets, &config()).unwrap();
        assert!(forest.predict(&[vec![1.0]]).is_err());
        assert!(forest.predict(&[]).unwrap().is_empty());
    }

    #[test]
    fn rejects_bad_training_data() {
        let cfg = config();
        assert!(RandomForest::fit(&[], &[], &cfg).is_err());
        assert!(RandomForest::fit(&[vec![1.0]], &[1.0, 2.0], &cfg).is_err());
        assert!(RandomForest::fit(&[vec![1.0], vec![1.0, 2.0]], &[1.0, 2.0], &cfg).is_err());
        assert!(RandomForest::fit(&[vec![f64::NAN]], &[1.0], &cfg).is_err());
    }
}
