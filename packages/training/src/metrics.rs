//! Goodness-of-fit metrics for a fitted regressor.

use crime_rate_prediction_models::Regressor;
use serde::Serialize;

use crate::TrainingSet;

/// In-sample fit quality.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FitMetrics {
    /// Root mean squared error.
    pub rmse: f64,
    /// Mean absolute error.
    pub mae: f64,
    /// Coefficient of determination.
    pub r_squared: f64,
}

/// Scores `model` against every sample in `set`.
///
/// R² follows the usual convention for a constant target: `1.0` for a
/// perfect fit, `0.0` otherwise.
///
/// Returns `None` for an empty set.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn evaluate(model: &dyn Regressor, set: &TrainingSet) -> Option<FitMetrics> {
    if set.is_empty() {
        return None;
    }

    let n = set.len() as f64;
    let targets = set.targets();
    let predictions: Vec<f64> = set
        .features()
        .iter()
        .map(|row| model.predict(row.as_slice()))
        .collect();

    let mean = targets.iter().sum::<f64>() / n;
    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    let mut abs_err = 0.0;
    for (y, y_hat) in targets.iter().zip(&predictions) {
        let residual = y - y_hat;
        ss_res += residual * residual;
        ss_tot += (y - mean) * (y - mean);
        abs_err += residual.abs();
    }

    let r_squared = if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else if ss_res == 0.0 {
        1.0
    } else {
        0.0
    };

    Some(FitMetrics {
        rmse: (ss_res / n).sqrt(),
        mae: abs_err / n,
        r_squared,
    })
}
