#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Crime rate prediction engine.
//!
//! [`PredictionEngine`] owns a fitted [`Regressor`] and a [`CityTable`].
//! Each prediction encodes the request, asks the model for a base rate,
//! shifts it by the city's adjustment, clamps the sum into the valid range,
//! and attaches a factor decomposition.
//!
//! The factor decomposition restates the generative formula for the given
//! inputs. Only `city_impact` takes part in the blended rate; the other
//! factors explain the inputs and are not derived from the fitted model, so
//! they will not sum to the predicted rate.
//!
//! The engine is immutable after construction and can be shared across
//! threads without locking.

pub mod cities;
pub mod profiles;

use std::path::Path;
use std::sync::Arc;

use crime_rate_forest::{ForestError, RandomForestRegressor};
use crime_rate_prediction_models::coefficients::{
    area_type_term, city_term, clip_rate, density_term, seasonal_term, time_term, weekend_term,
};
use crime_rate_prediction_models::{
    AreaType, FEATURE_COUNT, FeatureVector, Factors, NumericInput, PredictionInput,
    PredictionResult, Regressor, TimeOfDay, round2,
};
use crime_rate_training::{TrainingError, TrainingSet};
use thiserror::Error;

pub use crate::cities::{CityMatch, CityTable};
pub use crate::profiles::TrainingProfile;

/// Errors that reject a single prediction.
#[derive(Debug, Error)]
pub enum PredictError {
    /// No usable model is resident.
    #[error("Model unavailable: {message}")]
    ModelUnavailable {
        /// Description of what went wrong.
        message: String,
    },

    /// A numeric field could not be coerced.
    #[error("Invalid {field}: {message}")]
    InvalidInput {
        /// Request field name.
        field: &'static str,
        /// Description of what went wrong.
        message: String,
    },
}

/// Errors that prevent an engine from being built.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Training data generation failed.
    #[error(transparent)]
    Training(#[from] TrainingError),

    /// Fitting or loading the forest failed.
    #[error(transparent)]
    Forest(#[from] ForestError),

    /// The supplied model cannot serve predictions.
    #[error(transparent)]
    Model(#[from] PredictError),
}

/// Serves crime rate predictions from an immutable model and city table.
#[derive(Clone)]
pub struct PredictionEngine {
    model: Arc<dyn Regressor>,
    cities: CityTable,
}

impl std::fmt::Debug for PredictionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictionEngine")
            .field("feature_count", &self.model.feature_count())
            .field("cities", &self.cities.len())
            .finish()
    }
}

impl PredictionEngine {
    /// Wraps an already fitted model.
    ///
    /// # Errors
    ///
    /// Returns [`PredictError::ModelUnavailable`] if the model was not
    /// fitted on the five-column feature layout.
    pub fn new(model: Arc<dyn Regressor>, cities: CityTable) -> Result<Self, PredictError> {
        if model.feature_count() != FEATURE_COUNT {
            return Err(PredictError::ModelUnavailable {
                message: format!(
                    "model expects {} features, engine supplies {FEATURE_COUNT}",
                    model.feature_count()
                ),
            });
        }

        Ok(Self { model, cities })
    }

    /// Generates training data for `profile` and fits a fresh forest.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if data generation or fitting fails.
    pub fn train(profile: &TrainingProfile, cities: CityTable) -> Result<Self, EngineError> {
        let (forest, _) = fit(profile)?;
        Ok(Self::new(Arc::new(forest), cities)?)
    }

    /// Loads the forest at `path`, or fits one from `profile` and saves it
    /// there when the file is missing or unreadable.
    ///
    /// A failed save is logged and does not prevent the engine from being
    /// built.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if fitting fails or the resulting model
    /// cannot serve predictions.
    pub fn load_or_train(
        path: &Path,
        profile: &TrainingProfile,
        cities: CityTable,
    ) -> Result<Self, EngineError> {
        if path.exists() {
            match RandomForestRegressor::load(path) {
                Ok(forest) => match Self::new(Arc::new(forest), cities.clone()) {
                    Ok(engine) => return Ok(engine),
                    Err(e) => log::warn!("Ignoring model at {}: {e}", path.display()),
                },
                Err(e) => log::warn!("Failed to load model from {}: {e}", path.display()),
            }
        } else {
            log::info!("No model at {}, training '{}'", path.display(), profile.name);
        }

        let (forest, _) = fit(profile)?;
        if let Err(e) = forest.save(path) {
            log::warn!("Failed to save model to {}: {e}", path.display());
        }

        Ok(Self::new(Arc::new(forest), cities)?)
    }

    /// Predicts the crime rate for `input`.
    ///
    /// # Errors
    ///
    /// Returns [`PredictError::InvalidInput`] if a numeric field cannot be
    /// coerced, or [`PredictError::ModelUnavailable`] if the model returns a
    /// non-finite value.
    pub fn predict(&self, input: &PredictionInput) -> Result<PredictionResult, PredictError> {
        let features = encode(input)?;

        let base_rate = self.model.predict(features.encode().as_slice());
        if !base_rate.is_finite() {
            return Err(PredictError::ModelUnavailable {
                message: format!("model returned {base_rate}"),
            });
        }

        let city_base_rate = self.cities.base_rate(input.city.as_deref());
        let city_impact = city_term(city_base_rate);
        let crime_rate = clip_rate(base_rate + city_impact);

        log::debug!(
            "Predicted {crime_rate:.3} (base {base_rate:.3}, city {city_base_rate}) \
             for {features:?}"
        );

        Ok(PredictionResult {
            crime_rate,
            base_rate,
            city_base_rate,
            factors: factors(&features, city_impact),
        })
    }

    /// Base rate multiplier for a city name.
    #[must_use]
    pub fn city_base_rate(&self, city: Option<&str>) -> f64 {
        self.cities.base_rate(city)
    }

    /// Borrows the city table.
    #[must_use]
    pub const fn cities(&self) -> &CityTable {
        &self.cities
    }

    /// Borrows the model.
    #[must_use]
    pub fn model(&self) -> &dyn Regressor {
        self.model.as_ref()
    }
}

/// Generates the profile's dataset and fits a forest on it.
///
/// The dataset is returned alongside the forest so callers can score the
/// fit.
///
/// # Errors
///
/// Returns [`EngineError`] if data generation or fitting fails.
pub fn fit(profile: &TrainingProfile) -> Result<(RandomForestRegressor, TrainingSet), EngineError> {
    log::info!(
        "Training profile '{}': {} samples, {} trees",
        profile.name,
        profile.generator.samples,
        profile.forest.n_estimators
    );

    let set = crime_rate_training::generate(&profile.generator)?;
    let forest = RandomForestRegressor::fit(&set.features(), &set.targets(), &profile.forest)?;

    Ok((forest, set))
}

/// Coerces a raw request into a [`FeatureVector`].
///
/// Unrecognized category names fall back to urban and day.
///
/// # Errors
///
/// Returns [`PredictError::InvalidInput`] if population density is not a
/// finite non-negative number, or month or day of week is not an integer.
pub fn encode(input: &PredictionInput) -> Result<FeatureVector, PredictError> {
    let population_density = input
        .population_density
        .to_f64()
        .ok_or_else(|| not_numeric("population_density", &input.population_density))?;
    if population_density < 0.0 {
        return Err(PredictError::InvalidInput {
            field: "population_density",
            message: format!("must not be negative, got {population_density}"),
        });
    }

    let month = input
        .month
        .to_i64()
        .ok_or_else(|| not_numeric("month", &input.month))?;
    let day_of_week = input
        .day_of_week
        .to_i64()
        .ok_or_else(|| not_numeric("day_of_week", &input.day_of_week))?;

    Ok(FeatureVector {
        area_type: AreaType::from_lenient(&input.area_type),
        population_density,
        time_of_day: TimeOfDay::from_lenient(&input.time_of_day),
        month,
        day_of_week,
    })
}

fn not_numeric(field: &'static str, value: &NumericInput) -> PredictError {
    let shown = match value {
        NumericInput::Number(n) => n.to_string(),
        NumericInput::Text(t) => format!("{t:?}"),
    };
    PredictError::InvalidInput {
        field,
        message: format!("{shown} is not a valid number"),
    }
}

/// Illustrative factor decomposition, each rounded to 2 decimals.
#[must_use]
pub fn factors(features: &FeatureVector, city_impact: f64) -> Factors {
    Factors {
        city_impact: round2(city_impact),
        area_type_impact: round2(area_type_term(features.area_type.encoded())),
        population_impact: round2(density_term(features.population_density)),
        time_impact: round2(time_term(features.time_of_day.encoded())),
        seasonal_impact: round2(seasonal_term(features.month)),
        weekend_impact: round2(weekend_term(features.day_of_week)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crime_rate_forest::ForestConfig;
    use crime_rate_training::GeneratorConfig;
    use std::sync::OnceLock;

    /// Returns the same base rate for every row.
    struct Constant(f64);

    impl Regressor for Constant {
        fn predict(&self, _features: &[f64]) -> f64 {
            self.0
        }

        fn feature_count(&self) -> usize {
            FEATURE_COUNT
        }
    }

    fn constant_engine(base: f64) -> PredictionEngine {
        PredictionEngine::new(Arc::new(Constant(base)), CityTable::builtin()).unwrap()
    }

    fn small_profile() -> TrainingProfile {
        TrainingProfile {
            name: "test".to_string(),
            description: "small forest for tests".to_string(),
            generator: GeneratorConfig {
                samples: 400,
                ..GeneratorConfig::default()
            },
            forest: ForestConfig {
                n_estimators: 15,
                max_depth: Some(8),
                ..ForestConfig::default()
            },
        }
    }

    fn trained_engine() -> &'static PredictionEngine {
        static ENGINE: OnceLock<PredictionEngine> = OnceLock::new();
        ENGINE.get_or_init(|| {
            PredictionEngine::train(&small_profile(), CityTable::builtin()).unwrap()
        })
    }

    fn input(
        city: &str,
        area: &str,
        density: f64,
        time: &str,
        month: i64,
        day: i64,
    ) -> PredictionInput {
        PredictionInput {
            city: Some(city.to_string()),
            area_type: area.to_string(),
            population_density: density.into(),
            time_of_day: time.to_string(),
            month: month.into(),
            day_of_week: day.into(),
        }
    }

    #[test]
    fn san_jose_example() {
        let engine = trained_engine();
        let result = engine
            .predict(&input("San Jose", "urban", 5000.0, "day", 6, 1))
            .unwrap();

        assert_relative_eq!(result.city_base_rate, 0.9);
        assert_relative_eq!(result.factors.city_impact, -0.08);
        assert_relative_eq!(result.factors.area_type_impact, 0.0);
        assert_relative_eq!(result.factors.weekend_impact, 0.0);
        assert_relative_eq!(result.factors.seasonal_impact, 0.25);
        assert_relative_eq!(result.factors.population_impact, 1.25);
        assert_relative_eq!(result.factors.time_impact, 0.0);
        assert!((0.5..=8.0).contains(&result.crime_rate));
    }

    #[test]
    fn blended_rate_is_base_plus_city_impact_clipped() {
        let engine = trained_engine();
        for city in ["", "Detroit", "San Jose", "Springfield", "Austin"] {
            let result = engine
                .predict(&input(city, "suburban", 7000.0, "night", 3, 6))
                .unwrap();
            let expected = clip_rate(result.base_rate + city_term(result.city_base_rate));
            assert_eq!(result.crime_rate.to_bits(), expected.to_bits(), "city {city:?}");
            assert_relative_eq!(
                result.factors.city_impact,
                round2(city_term(result.city_base_rate))
            );
        }
    }

    #[test]
    fn rural_weekend_factors() {
        let engine = trained_engine();
        let result = engine
            .predict(&PredictionInput {
                area_type: "rural".to_string(),
                day_of_week: 7_i64.into(),
                ..PredictionInput::default()
            })
            .unwrap();
        assert_relative_eq!(result.factors.area_type_impact, 3.0);
        assert_relative_eq!(result.factors.weekend_impact, 0.8);
        assert_relative_eq!(result.factors.city_impact, 0.0);
    }

    #[test]
    fn area_type_impact_per_category() {
        let engine = constant_engine(3.0);
        for (area, expected) in [("urban", 0.0), ("Suburban", 1.5), ("RURAL", 3.0), ("mars", 0.0)] {
            let result = engine
                .predict(&input("", area, 5000.0, "day", 6, 1))
                .unwrap();
            assert_relative_eq!(result.factors.area_type_impact, expected);
        }
    }

    #[test]
    fn weekend_impact_only_on_weekend() {
        let engine = constant_engine(3.0);
        for day in 1..=7 {
            let result = engine
                .predict(&input("", "urban", 5000.0, "day", 6, day))
                .unwrap();
            let expected = if day >= 6 { 0.8 } else { 0.0 };
            assert_relative_eq!(result.factors.weekend_impact, expected);
        }
    }

    #[test]
    fn time_impact_for_night() {
        let engine = constant_engine(3.0);
        let night = engine
            .predict(&input("", "urban", 5000.0, "Night", 6, 1))
            .unwrap();
        let dusk = engine
            .predict(&input("", "urban", 5000.0, "dusk", 6, 1))
            .unwrap();
        assert_relative_eq!(night.factors.time_impact, 1.2);
        assert_relative_eq!(dusk.factors.time_impact, 0.0);
    }

    #[test]
    fn crime_rate_is_clipped() {
        let high = constant_engine(7.9)
            .predict(&input("Detroit", "rural", 20000.0, "night", 4, 7));
        assert_relative_eq!(high.unwrap().crime_rate, 8.0);

        let low = constant_engine(0.5)
            .predict(&input("San Jose", "urban", 100.0, "day", 10, 1));
        assert_relative_eq!(low.unwrap().crime_rate, 0.5);

        let mid = constant_engine(3.0)
            .predict(&input("New York", "urban", 100.0, "day", 10, 1));
        assert_relative_eq!(mid.unwrap().crime_rate, 3.0 + 0.64, epsilon = 1e-12);
    }

    #[test]
    fn crime_rate_always_in_range_for_trained_model() {
        let engine = trained_engine();
        for area in ["urban", "suburban", "rural"] {
            for time in ["day", "night"] {
                for density in [0.0, 100.0, 5000.0, 20000.0, 1e6] {
                    for city in ["", "Detroit", "San Jose", "Nowhere"] {
                        let result = engine
                            .predict(&input(city, area, density, time, 12, 7))
                            .unwrap();
                        assert!(
                            (0.5..=8.0).contains(&result.crime_rate),
                            "{} out of range",
                            result.crime_rate
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn repeated_predictions_are_identical() {
        let engine = trained_engine();
        let request = input("Gotham", "suburban", 3210.0, "night", 11, 5);
        let first = engine.predict(&request).unwrap();
        let second = engine.predict(&request).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn city_base_rate_lookup() {
        let engine = constant_engine(3.0);
        assert_relative_eq!(engine.city_base_rate(None), 1.0);
        assert_relative_eq!(engine.city_base_rate(Some("")), 1.0);
        assert_relative_eq!(engine.city_base_rate(Some("  NEW YORK  ")), 1.8);
        assert_eq!(
            engine.city_base_rate(Some("Gotham")).to_bits(),
            engine.city_base_rate(Some("gotham")).to_bits()
        );
    }

    #[test]
    fn numeric_strings_are_coerced() {
        let engine = constant_engine(3.0);
        let result = engine
            .predict(&PredictionInput {
                population_density: "4000".into(),
                month: " 1 ".into(),
                day_of_week: 6.7.into(),
                ..PredictionInput::default()
            })
            .unwrap();
        assert_relative_eq!(result.factors.population_impact, 1.0);
        assert_relative_eq!(result.factors.seasonal_impact, 0.0);
        assert_relative_eq!(result.factors.weekend_impact, 0.8);
    }

    #[test]
    fn malformed_numbers_are_invalid_input() {
        let engine = constant_engine(3.0);
        let cases = [
            PredictionInput {
                month: "June".into(),
                ..PredictionInput::default()
            },
            PredictionInput {
                day_of_week: f64::NAN.into(),
                ..PredictionInput::default()
            },
            PredictionInput {
                population_density: "dense".into(),
                ..PredictionInput::default()
            },
            PredictionInput {
                population_density: (-5.0).into(),
                ..PredictionInput::default()
            },
        ];
        for case in &cases {
            assert!(
                matches!(engine.predict(case), Err(PredictError::InvalidInput { .. })),
                "{case:?} should be rejected"
            );
        }
    }

    #[test]
    fn extreme_months_are_accepted() {
        let engine = constant_engine(3.0);
        let months = [
            NumericInput::from("-9223372036854775808"),
            NumericInput::Number(-(2.0_f64.powi(63))),
            NumericInput::from("9223372036854775807"),
            NumericInput::from(-40_i64),
        ];
        for month in months {
            let request = PredictionInput {
                month: month.clone(),
                ..PredictionInput::default()
            };
            let result = engine.predict(&request).unwrap();
            assert!(
                result.factors.seasonal_impact.abs() <= 0.5,
                "{month:?} gave {}",
                result.factors.seasonal_impact
            );
            assert!((0.5..=8.0).contains(&result.crime_rate));
        }
    }

    #[test]
    fn model_with_wrong_width_is_unavailable() {
        struct Narrow;
        impl Regressor for Narrow {
            fn predict(&self, _features: &[f64]) -> f64 {
                0.0
            }
            fn feature_count(&self) -> usize {
                2
            }
        }

        let result = PredictionEngine::new(Arc::new(Narrow), CityTable::builtin());
        assert!(matches!(result, Err(PredictError::ModelUnavailable { .. })));
    }

    #[test]
    fn non_finite_model_output_is_unavailable() {
        let engine = constant_engine(f64::NAN);
        assert!(matches!(
            engine.predict(&PredictionInput::default()),
            Err(PredictError::ModelUnavailable { .. })
        ));
    }

    #[test]
    fn trained_model_tracks_the_generative_trend() {
        let engine = trained_engine();
        let quiet = engine
            .predict(&input("", "urban", 1000.0, "day", 10, 2))
            .unwrap();
        let busy = engine
            .predict(&input("", "rural", 9000.0, "night", 4, 6))
            .unwrap();
        assert!(
            busy.base_rate > quiet.base_rate + 2.0,
            "busy {} vs quiet {}",
            busy.base_rate,
            quiet.base_rate
        );
    }

    #[test]
    fn load_or_train_persists_and_reloads() {
        let dir = std::env::temp_dir().join(format!("crime_rate_engine_{}", std::process::id()));
        let path = dir.join("model.msgpack");
        std::fs::remove_file(&path).ok();

        let profile = TrainingProfile {
            forest: ForestConfig {
                n_estimators: 3,
                ..small_profile().forest
            },
            ..small_profile()
        };

        let trained =
            PredictionEngine::load_or_train(&path, &profile, CityTable::builtin()).unwrap();
        assert!(path.exists());

        let loaded =
            PredictionEngine::load_or_train(&path, &profile, CityTable::builtin()).unwrap();
        let request = input("Chicago", "suburban", 2500.0, "night", 8, 3);
        assert_eq!(trained.predict(&request).unwrap(), loaded.predict(&request).unwrap());

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn load_or_train_replaces_corrupt_model() {
        let dir = std::env::temp_dir()
            .join(format!("crime_rate_engine_corrupt_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("model.msgpack");
        std::fs::write(&path, b"garbage").unwrap();

        let profile = TrainingProfile {
            forest: ForestConfig {
                n_estimators: 2,
                ..small_profile().forest
            },
            ..small_profile()
        };
        let engine =
            PredictionEngine::load_or_train(&path, &profile, CityTable::builtin()).unwrap();
        assert!(engine.predict(&PredictionInput::default()).is_ok());
        assert!(crime_rate_forest::RandomForestRegressor::load(&path).is_ok());

        std::fs::remove_file(&path).ok();
    }
}
