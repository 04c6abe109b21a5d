#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Synthetic training data for the crime rate model.
//!
//! [`generate`] draws feature rows from fixed distributions and labels them
//! with the closed-form formula in
//! [`crime_rate_prediction_models::coefficients`] plus Gaussian noise. The
//! output is a pure function of the [`GeneratorConfig`], seed included, so
//! rebuilding a model from the same config always sees the same data.
//!
//! [`metrics::evaluate`] scores a fitted regressor against a generated set.

pub mod metrics;

use crime_rate_prediction_models::coefficients::{self, clip_rate};
use crime_rate_prediction_models::{AreaType, EncodedFeatures, FeatureVector, TimeOfDay};
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mean of the population density distribution.
pub const DENSITY_MEAN: f64 = 5000.0;
/// Standard deviation of the population density distribution.
pub const DENSITY_STD_DEV: f64 = 3000.0;
/// Sampled densities are clipped to at least this.
pub const MIN_DENSITY: f64 = 100.0;
/// Sampled densities are clipped to at most this.
pub const MAX_DENSITY: f64 = 20_000.0;
/// Standard deviation of the label noise.
pub const NOISE_STD_DEV: f64 = 0.5;

/// Errors that can occur while generating training data.
#[derive(Debug, Error)]
pub enum TrainingError {
    /// The generator configuration is unusable.
    #[error("Invalid generator config: {message}")]
    InvalidConfig {
        /// Description of what went wrong.
        message: String,
    },

    /// A sampling distribution could not be constructed.
    #[error("Distribution error: {message}")]
    Distribution {
        /// Description of what went wrong.
        message: String,
    },
}

/// Settings for [`generate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Number of samples to draw.
    pub samples: usize,
    /// RNG seed.
    pub seed: u64,
    /// Relative weights for urban, suburban, rural. Uniform when `None`.
    pub area_type_weights: Option<Vec<f64>>,
    /// Relative weights for day, night. Uniform when `None`.
    pub time_of_day_weights: Option<Vec<f64>>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            samples: 1000,
            seed: 42,
            area_type_weights: None,
            time_of_day_weights: None,
        }
    }
}

impl GeneratorConfig {
    /// Checks that the config can produce a non-empty dataset.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::InvalidConfig`] if `samples` is zero or a
    /// weight vector has the wrong length, a negative or non-finite entry,
    /// or sums to zero.
    pub fn validate(&self) -> Result<(), TrainingError> {
        if self.samples == 0 {
            return Err(TrainingError::InvalidConfig {
                message: "samples must be greater than zero".to_string(),
            });
        }
        if let Some(weights) = &self.area_type_weights {
            validate_weights("area_type_weights", weights, AreaType::all().len())?;
        }
        if let Some(weights) = &self.time_of_day_weights {
            validate_weights("time_of_day_weights", weights, TimeOfDay::all().len())?;
        }
        Ok(())
    }
}

fn validate_weights(name: &str, weights: &[f64], expected: usize) -> Result<(), TrainingError> {
    if weights.len() != expected {
        return Err(TrainingError::InvalidConfig {
            message: format!(
                "{name} has {} entries, expected {expected}",
                weights.len()
            ),
        });
    }
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(TrainingError::InvalidConfig {
            message: format!("{name} must be finite and non-negative: {weights:?}"),
        });
    }
    if weights.iter().sum::<f64>() <= 0.0 {
        return Err(TrainingError::InvalidConfig {
            message: format!("{name} must not all be zero"),
        });
    }
    Ok(())
}

/// One labelled row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    /// Inputs.
    pub features: FeatureVector,
    /// Label, within the clip range.
    pub crime_rate: f64,
}

/// A generated dataset.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrainingSet {
    samples: Vec<TrainingSample>,
}

impl TrainingSet {
    /// Borrows the samples.
    #[must_use]
    pub fn samples(&self) -> &[TrainingSample] {
        &self.samples
    }

    /// Encoded feature rows in sample order.
    #[must_use]
    pub fn features(&self) -> Vec<EncodedFeatures> {
        self.samples.iter().map(|s| s.features.encode()).collect()
    }

    /// Labels in sample order.
    #[must_use]
    pub fn targets(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.crime_rate).collect()
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the set has no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Smallest and largest label, or `None` when empty.
    #[must_use]
    pub fn target_range(&self) -> Option<(f64, f64)> {
        self.samples.iter().map(|s| s.crime_rate).fold(None, |acc, y| {
            Some(acc.map_or((y, y), |(lo, hi): (f64, f64)| (lo.min(y), hi.max(y))))
        })
    }
}

impl FromIterator<TrainingSample> for TrainingSet {
    fn from_iter<I: IntoIterator<Item = TrainingSample>>(iter: I) -> Self {
        Self {
            samples: iter.into_iter().collect(),
        }
    }
}

/// Picks a category index uniformly or by weight.
enum CategorySampler {
    Uniform(u8),
    Weighted(WeightedIndex<f64>),
}

impl CategorySampler {
    fn new(weights: Option<&[f64]>, count: u8) -> Result<Self, TrainingError> {
        weights.map_or(Ok(Self::Uniform(count)), |w| {
            WeightedIndex::new(w)
                .map(Self::Weighted)
                .map_err(|e| TrainingError::Distribution {
                    message: e.to_string(),
                })
        })
    }

    #[allow(clippy::cast_possible_truncation)]
    fn sample(&self, rng: &mut StdRng) -> u8 {
        match self {
            Self::Uniform(count) => rng.gen_range(0..*count),
            Self::Weighted(index) => index.sample(rng) as u8,
        }
    }
}

/// Generates `config.samples` labelled rows.
///
/// # Errors
///
/// Returns [`TrainingError`] if the config fails validation.
#[allow(clippy::cast_possible_truncation)]
pub fn generate(config: &GeneratorConfig) -> Result<TrainingSet, TrainingError> {
    config.validate()?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let area_sampler =
        CategorySampler::new(config.area_type_weights.as_deref(), AreaType::all().len() as u8)?;
    let time_sampler = CategorySampler::new(
        config.time_of_day_weights.as_deref(),
        TimeOfDay::all().len() as u8,
    )?;
    let density = Normal::new(DENSITY_MEAN, DENSITY_STD_DEV).map_err(|e| {
        TrainingError::Distribution {
            message: e.to_string(),
        }
    })?;
    let noise = Normal::new(0.0, NOISE_STD_DEV).map_err(|e| TrainingError::Distribution {
        message: e.to_string(),
    })?;

    let samples: Vec<TrainingSample> = (0..config.samples)
        .map(|_| {
            let area_code = area_sampler.sample(&mut rng);
            let population_density = density.sample(&mut rng).clamp(MIN_DENSITY, MAX_DENSITY);
            let time_code = time_sampler.sample(&mut rng);
            let month: i64 = rng.gen_range(1..=12);
            let day_of_week: i64 = rng.gen_range(1..=7);

            let features = FeatureVector {
                area_type: AreaType::from_encoded(area_code).unwrap_or_default(),
                population_density,
                time_of_day: TimeOfDay::from_encoded(time_code).unwrap_or_default(),
                month,
                day_of_week,
            };
            let crime_rate = clip_rate(formula(&features) + noise.sample(&mut rng));

            TrainingSample {
                features,
                crime_rate,
            }
        })
        .collect();

    log::debug!(
        "Generated {} training samples (seed {})",
        samples.len(),
        config.seed
    );

    Ok(TrainingSet { samples })
}

/// Noise-free label for a feature vector.
#[must_use]
pub fn formula(features: &FeatureVector) -> f64 {
    coefficients::INTERCEPT
        + coefficients::area_type_term(features.area_type.encoded())
        + coefficients::density_term(features.population_density)
        + coefficients::time_term(features.time_of_day.encoded())
        + coefficients::seasonal_term(features.month)
        + coefficients::weekend_term(features.day_of_week)
}
