#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Bagged regression-tree ensemble.
//!
//! [`RandomForestRegressor`] fits each tree on a bootstrap resample of the
//! training rows and averages their outputs. Every tree considers every
//! feature at every split, so the only randomness is the resampling, which
//! is driven by a single seed. The same rows, targets, and
//! [`ForestConfig`] always produce the same forest.
//!
//! A fitted forest can be written to and read back from disk as
//! `MessagePack` via [`persist`].

pub mod persist;
pub mod tree;

use std::time::Instant;

use crime_rate_prediction_models::Regressor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tree::{RegressionTree, TreeParams};

/// Errors that can occur while fitting, saving, or loading a forest.
#[derive(Debug, Error)]
pub enum ForestError {
    /// No training rows were supplied.
    #[error("Cannot fit a forest on an empty dataset")]
    EmptyDataset,

    /// Rows and targets disagree in length.
    #[error("Got {rows} feature rows but {targets} targets")]
    LengthMismatch {
        /// Number of feature rows.
        rows: usize,
        /// Number of targets.
        targets: usize,
    },

    /// A row has a different width than the first row.
    #[error("Row {row} has {actual} features, expected {expected}")]
    RaggedRows {
        /// Offending row index.
        row: usize,
        /// Width of the first row.
        expected: usize,
        /// Width of the offending row.
        actual: usize,
    },

    /// A feature or target is NaN or infinite.
    #[error("Row {row} contains a non-finite value")]
    NonFinite {
        /// Offending row index.
        row: usize,
    },

    /// The forest configuration is unusable.
    #[error("Invalid forest config: {message}")]
    InvalidConfig {
        /// Description of what went wrong.
        message: String,
    },

    /// A persisted model decoded but is structurally unusable.
    #[error("Invalid persisted model: {message}")]
    InvalidModel {
        /// Description of what went wrong.
        message: String,
    },

    /// Filesystem operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization failed.
    #[error("Encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// Deserialization failed.
    #[error("Decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

/// Hyperparameters for [`RandomForestRegressor::fit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    /// Number of trees.
    pub n_estimators: usize,
    /// Maximum tree depth. Unlimited when `None`.
    pub max_depth: Option<usize>,
    /// Minimum rows a node needs before it may split.
    pub min_samples_split: usize,
    /// Minimum rows on each side of a split.
    pub min_samples_leaf: usize,
    /// Seed for the bootstrap resampling.
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: Some(10),
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: 42,
        }
    }
}

impl ForestConfig {
    /// Checks the hyperparameters.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::InvalidConfig`] for zero trees, a zero depth
    /// limit, `min_samples_split < 2`, or `min_samples_leaf < 1`.
    pub fn validate(&self) -> Result<(), ForestError> {
        let message = if self.n_estimators == 0 {
            "n_estimators must be at least 1"
        } else if self.max_depth == Some(0) {
            "max_depth must be at least 1"
        } else if self.min_samples_split < 2 {
            "min_samples_split must be at least 2"
        } else if self.min_samples_leaf < 1 {
            "min_samples_leaf must be at least 1"
        } else {
            return Ok(());
        };

        Err(ForestError::InvalidConfig {
            message: message.to_string(),
        })
    }

    const fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
        }
    }
}

/// An averaged ensemble of bootstrap-fitted regression trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    trees: Vec<RegressionTree>,
    feature_count: usize,
    importances: Vec<f64>,
}

impl RandomForestRegressor {
    /// Fits a forest.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError`] if the config is invalid, there are no rows,
    /// rows and targets differ in length, rows differ in width, or any value
    /// is non-finite.
    pub fn fit<R: AsRef<[f64]>>(
        rows: &[R],
        targets: &[f64],
        config: &ForestConfig,
    ) -> Result<Self, ForestError> {
        config.validate()?;
        let columns = to_columns(rows, targets)?;
        let feature_count = columns.len();
        let n = targets.len();

        let start = Instant::now();
        let mut seeder = StdRng::seed_from_u64(config.seed);
        let mut summed_importances = vec![0.0; feature_count];

        let trees: Vec<RegressionTree> = (0..config.n_estimators)
            .map(|_| {
                let mut rng = StdRng::seed_from_u64(seeder.r#gen());
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                let (tree, importances) =
                    RegressionTree::fit(&columns, targets, sample, config.tree_params());

                let total: f64 = importances.iter().sum();
                if total > 0.0 {
                    for (acc, value) in summed_importances.iter_mut().zip(&importances) {
                        *acc += value / total;
                    }
                }

                tree
            })
            .collect();

        let total: f64 = summed_importances.iter().sum();
        let importances = if total > 0.0 {
            summed_importances.iter().map(|v| v / total).collect()
        } else {
            summed_importances
        };

        log::info!(
            "Fitted {} trees on {n} samples x {feature_count} features in {:.2?}",
            trees.len(),
            start.elapsed()
        );

        Ok(Self {
            trees,
            feature_count,
            importances,
        })
    }

    /// Number of trees in the ensemble.
    #[must_use]
    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    /// Borrows the individual trees.
    #[must_use]
    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    /// Mean impurity decrease per feature, normalized to sum to 1 (all zero
    /// if no tree ever split).
    #[must_use]
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }

    /// Structural checks applied to models read from disk.
    fn validate_structure(&self) -> Result<(), ForestError> {
        let invalid = |message: String| Err(ForestError::InvalidModel { message });

        if self.trees.is_empty() {
            return invalid("model has no trees".to_string());
        }
        if self.importances.len() != self.feature_count {
            return invalid(format!(
                "{} importances for {} features",
                self.importances.len(),
                self.feature_count
            ));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            if !tree.is_well_formed() {
                return invalid(format!("tree {i} has dangling node references"));
            }
            if tree.max_feature().is_some_and(|f| f >= self.feature_count) {
                return invalid(format!("tree {i} reads a feature outside the model"));
            }
        }
        Ok(())
    }
}

impl Regressor for RandomForestRegressor {
    #[allow(clippy::cast_precision_loss)]
    fn predict(&self, features: &[f64]) -> f64 {
        let sum: f64 = self.trees.iter().map(|tree| tree.predict(features)).sum();
        sum / self.trees.len() as f64
    }

    fn feature_count(&self) -> usize {
        self.feature_count
    }
}

/// Validates the inputs and transposes rows into columns.
fn to_columns<R: AsRef<[f64]>>(rows: &[R], targets: &[f64]) -> Result<Vec<Vec<f64>>, ForestError> {
    if rows.is_empty() {
        return Err(ForestError::EmptyDataset);
    }
    if rows.len() != targets.len() {
        return Err(ForestError::LengthMismatch {
            rows: rows.len(),
            targets: targets.len(),
        });
    }

    let width = rows[0].as_ref().len();
    let mut columns = vec![Vec::with_capacity(rows.len()); width];
    for (i, (row, target)) in rows.iter().zip(targets).enumerate() {
        let row = row.as_ref();
        if row.len() != width {
            return Err(ForestError::RaggedRows {
                row: i,
                expected: width,
                actual: row.len(),
            });
        }
        if !target.is_finite() || row.iter().any(|v| !v.is_finite()) {
            return Err(ForestError::NonFinite { row: i });
        }
        for (column, value) in columns.iter_mut().zip(row) {
            column.push(*value);
        }
    }

    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn linear_data() -> (Vec<[f64; 2]>, Vec<f64>) {
        let rows: Vec<[f64; 2]> = (0..200)
            .map(|i| [f64::from(i % 20), f64::from(i % 7)])
            .collect();
        let targets = rows.iter().map(|r| 3.0 * r[0] + 1.0).collect();
        (rows, targets)
    }

    fn small_config() -> ForestConfig {
        ForestConfig {
            n_estimators: 10,
            max_depth: Some(8),
            ..ForestConfig::default()
        }
    }

    #[test]
    fn fits_a_simple_trend() {
        let (rows, targets) = linear_data();
        let forest = RandomForestRegressor::fit(&rows, &targets, &small_config()).unwrap();

        assert_eq!(forest.tree_count(), 10);
        assert_eq!(forest.feature_count(), 2);
        assert!((forest.predict(&[2.0, 0.0]) - 7.0).abs() < 3.0);
        assert!((forest.predict(&[18.0, 0.0]) - 55.0).abs() < 3.0);
        assert!(forest.predict(&[18.0, 0.0]) > forest.predict(&[2.0, 0.0]));
    }

    #[test]
    fn importance_favors_the_informative_feature() {
        let (rows, targets) = linear_data();
        let forest = RandomForestRegressor::fit(&rows, &targets, &small_config()).unwrap();
        let importances = forest.feature_importances();

        assert_relative_eq!(importances.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        assert!(importances[0] > 0.9, "importances {importances:?}");
    }

    #[test]
    fn same_seed_same_forest() {
        let (rows, targets) = linear_data();
        let a = RandomForestRegressor::fit(&rows, &targets, &small_config()).unwrap();
        let b = RandomForestRegressor::fit(&rows, &targets, &small_config()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn predictions_stay_within_target_range() {
        let (rows, targets) = linear_data();
        let forest = RandomForestRegressor::fit(&rows, &targets, &small_config()).unwrap();
        for probe in [[-100.0, 0.0], [5.5, 3.0], [1000.0, 9.0]] {
            let y = forest.predict(&probe);
            assert!((1.0..=58.0).contains(&y), "prediction {y} for {probe:?}");
        }
    }

    #[test]
    fn rejects_bad_inputs() {
        let config = small_config();
        let empty: Vec<[f64; 2]> = Vec::new();
        assert!(matches!(
            RandomForestRegressor::fit(&empty, &[], &config),
            Err(ForestError::EmptyDataset)
        ));
        assert!(matches!(
            RandomForestRegressor::fit(&[[1.0, 2.0]], &[1.0, 2.0], &config),
            Err(ForestError::LengthMismatch { rows: 1, targets: 2 })
        ));
        assert!(matches!(
            RandomForestRegressor::fit(&[vec![1.0, 2.0], vec![1.0]], &[1.0, 2.0], &config),
            Err(ForestError::RaggedRows { row: 1, .. })
        ));
        assert!(matches!(
            RandomForestRegressor::fit(&[[1.0, f64::NAN]], &[1.0], &config),
            Err(ForestError::NonFinite { row: 0 })
        ));
    }

    #[test]
    fn rejects_bad_configs() {
        for config in [
            ForestConfig {
                n_estimators: 0,
                ..ForestConfig::default()
            },
            ForestConfig {
                max_depth: Some(0),
                ..ForestConfig::default()
            },
            ForestConfig {
                min_samples_split: 1,
                ..ForestConfig::default()
            },
            ForestConfig {
                min_samples_leaf: 0,
                ..ForestConfig::default()
            },
        ] {
            assert!(
                matches!(config.validate(), Err(ForestError::InvalidConfig { .. })),
                "{config:?} should be rejected"
            );
        }
        assert!(ForestConfig::default().validate().is_ok());
    }

    #[test]
    fn single_row_forest_predicts_its_target() {
        let forest = RandomForestRegressor::fit(&[[1.0, 1.0]], &[3.5], &small_config()).unwrap();
        assert_relative_eq!(forest.predict(&[0.0, 0.0]), 3.5);
        assert!(forest.feature_importances().iter().all(|v| *v == 0.0));
    }
}
