//! Compile-time registry of training profiles.
//!
//! A profile pairs a [`GeneratorConfig`] with a [`ForestConfig`]. Each one is
//! defined in a TOML file under `profiles/` and embedded at compile time.

use crime_rate_forest::ForestConfig;
use crime_rate_training::GeneratorConfig;
use serde::Deserialize;

/// Name of the profile used when none is requested.
pub const DEFAULT_PROFILE: &str = "default";

/// A named generator + forest configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrainingProfile {
    /// Unique identifier (e.g., `"default"`).
    pub name: String,
    /// One-line summary.
    pub description: String,
    /// Synthetic data settings.
    #[serde(default)]
    pub generator: GeneratorConfig,
    /// Forest hyperparameters.
    #[serde(default)]
    pub forest: ForestConfig,
}

// ── Compile-time embedded TOML files ────────────────────────────────

const PROFILE_TOMLS: &[(&str, &str)] = &[
    ("default", include_str!("../profiles/default.toml")),
    ("retrain", include_str!("../profiles/retrain.toml")),
];

/// Returns every embedded profile in declaration order.
///
/// # Panics
///
/// Panics if any TOML config is malformed (this is a compile-time guarantee
/// since the configs are embedded).
#[must_use]
pub fn all_profiles() -> Vec<TrainingProfile> {
    PROFILE_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            toml::de::from_str(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse training profile '{name}': {e}"))
        })
        .collect()
}

/// Looks up a profile by name.
#[must_use]
pub fn profile(name: &str) -> Option<TrainingProfile> {
    all_profiles().into_iter().find(|p| p.name == name)
}

/// Returns the [`DEFAULT_PROFILE`].
///
/// # Panics
///
/// Panics if the default profile is missing from the registry.
#[must_use]
pub fn default_profile() -> TrainingProfile {
    profile(DEFAULT_PROFILE)
        .unwrap_or_else(|| panic!("Training profile '{DEFAULT_PROFILE}' is not registered"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn loads_all_profiles() {
        assert_eq!(all_profiles().len(), PROFILE_TOMLS.len());
    }

    #[test]
    fn profile_names_match_registry_keys() {
        for ((key, _), profile) in PROFILE_TOMLS.iter().zip(all_profiles()) {
            assert_eq!(*key, profile.name);
        }
    }

    #[test]
    fn profile_names_are_unique() {
        let mut seen = BTreeSet::new();
        for p in all_profiles() {
            assert!(seen.insert(p.name.clone()), "Duplicate profile: {}", p.name);
        }
    }

    #[test]
    fn all_profiles_validate() {
        for p in all_profiles() {
            assert!(p.generator.validate().is_ok(), "{} generator invalid", p.name);
            assert!(p.forest.validate().is_ok(), "{} forest invalid", p.name);
        }
    }

    #[test]
    fn default_profile_settings() {
        let p = default_profile();
        assert_eq!(p.generator.samples, 1000);
        assert_eq!(p.generator.seed, 42);
        assert_eq!(p.generator.area_type_weights, None);
        assert_eq!(p.forest.n_estimators, 100);
        assert_eq!(p.forest.max_depth, Some(10));
    }

    #[test]
    fn retrain_profile_settings() {
        let p = profile("retrain").unwrap();
        assert_eq!(p.generator.samples, 2000);
        assert_eq!(p.generator.area_type_weights, Some(vec![0.4, 0.4, 0.2]));
        assert_eq!(p.generator.time_of_day_weights, Some(vec![0.6, 0.4]));
        assert_eq!(p.forest.n_estimators, 200);
        assert_eq!(p.forest.max_depth, Some(15));
        assert_eq!(p.forest.min_samples_split, 5);
        assert_eq!(p.forest.min_samples_leaf, 2);
    }

    #[test]
    fn unknown_profile_is_none() {
        assert!(profile("does-not-exist").is_none());
    }
}
