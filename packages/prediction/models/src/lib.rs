#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Feature, factor, and prediction result types for the crime rate engine.
//!
//! This crate defines the categorical inputs ([`AreaType`], [`TimeOfDay`]),
//! the five-column feature layout the regressor is trained on, and the
//! [`PredictionResult`] returned to callers. The generative coefficients in
//! [`coefficients`] are shared by the synthetic data generator and the
//! engine's factor decomposition so the two cannot drift apart.

pub mod coefficients;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Number of columns in an encoded feature row.
pub const FEATURE_COUNT: usize = 5;

/// Column names of an encoded feature row, in column order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "area_type",
    "population_density",
    "time_of_day",
    "month",
    "day_of_week",
];

/// Density classification of a location.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AreaType {
    /// Dense city core. Also the fallback for unrecognized input.
    #[default]
    Urban,
    /// Residential outskirts.
    Suburban,
    /// Sparse countryside.
    Rural,
}

impl AreaType {
    /// Parses an area type case-insensitively, falling back to
    /// [`AreaType::Urban`] for anything unrecognized.
    #[must_use]
    pub fn from_lenient(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }

    /// Returns the numeric code used in the feature row.
    #[must_use]
    pub const fn encoded(self) -> u8 {
        match self {
            Self::Urban => 0,
            Self::Suburban => 1,
            Self::Rural => 2,
        }
    }

    /// Inverse of [`AreaType::encoded`].
    #[must_use]
    pub const fn from_encoded(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Urban),
            1 => Some(Self::Suburban),
            2 => Some(Self::Rural),
            _ => None,
        }
    }

    /// Returns all variants of this enum, ordered by their encoded value.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Urban, Self::Suburban, Self::Rural]
    }
}

/// Coarse time-of-day bucket.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TimeOfDay {
    /// Daylight hours. Also the fallback for unrecognized input.
    #[default]
    Day,
    /// Night hours.
    Night,
}

impl TimeOfDay {
    /// Parses a time of day case-insensitively, falling back to
    /// [`TimeOfDay::Day`] for anything unrecognized.
    #[must_use]
    pub fn from_lenient(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }

    /// Returns the numeric code used in the feature row.
    #[must_use]
    pub const fn encoded(self) -> u8 {
        match self {
            Self::Day => 0,
            Self::Night => 1,
        }
    }

    /// Inverse of [`TimeOfDay::encoded`].
    #[must_use]
    pub const fn from_encoded(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Day),
            1 => Some(Self::Night),
            _ => None,
        }
    }

    /// Returns all variants of this enum, ordered by their encoded value.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Day, Self::Night]
    }
}

/// A numeric field as received from a caller, before coercion.
///
/// JSON clients may send numbers or numeric strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericInput {
    /// A JSON number.
    Number(f64),
    /// Anything else that arrived as a string.
    Text(String),
}

impl NumericInput {
    /// Coerces to a finite float. Strings are trimmed before parsing.
    #[must_use]
    pub fn to_f64(&self) -> Option<f64> {
        let value: Option<f64> = match self {
            Self::Number(value) => Some(*value),
            Self::Text(text) => text.trim().parse().ok(),
        };
        value.filter(|v| v.is_finite())
    }

    /// Coerces to an integer. Numbers truncate toward zero; strings must be
    /// integer literals.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            Self::Number(value) if value.is_finite() => {
                let truncated = value.trunc();
                #[allow(clippy::cast_precision_loss)]
                let in_range = truncated >= i64::MIN as f64 && truncated < i64::MAX as f64;
                in_range.then_some(truncated as i64)
            }
            Self::Number(_) => None,
            Self::Text(text) => text.trim().parse().ok(),
        }
    }
}

impl From<f64> for NumericInput {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for NumericInput {
    #[allow(clippy::cast_precision_loss)]
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<&str> for NumericInput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Raw prediction request, before encoding.
///
/// Defaults mirror the public API: no city, urban, density 5000, daytime,
/// June, Monday.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionInput {
    /// City name, matched against the base-rate table.
    pub city: Option<String>,
    /// Area type name. Unrecognized values mean urban.
    pub area_type: String,
    /// Residents per square kilometre.
    pub population_density: NumericInput,
    /// Time of day name. Unrecognized values mean day.
    pub time_of_day: String,
    /// Month of year.
    pub month: NumericInput,
    /// Day of week, Monday = 1.
    pub day_of_week: NumericInput,
}

impl Default for PredictionInput {
    fn default() -> Self {
        Self {
            city: None,
            area_type: AreaType::Urban.to_string(),
            population_density: NumericInput::Number(5000.0),
            time_of_day: TimeOfDay::Day.to_string(),
            month: NumericInput::Number(6.0),
            day_of_week: NumericInput::Number(1.0),
        }
    }
}

/// A fully coerced set of model inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Density classification.
    pub area_type: AreaType,
    /// Residents per square kilometre. Never negative.
    pub population_density: f64,
    /// Day or night.
    pub time_of_day: TimeOfDay,
    /// Month of year, nominally 1-12.
    pub month: i64,
    /// Day of week, nominally 1-7 with Monday = 1.
    pub day_of_week: i64,
}

impl FeatureVector {
    /// Returns the numeric row the regressor consumes.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn encode(&self) -> EncodedFeatures {
        EncodedFeatures([
            f64::from(self.area_type.encoded()),
            self.population_density,
            f64::from(self.time_of_day.encoded()),
            self.month as f64,
            self.day_of_week as f64,
        ])
    }
}

/// A feature row laid out as described by [`FEATURE_NAMES`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EncodedFeatures(pub [f64; FEATURE_COUNT]);

impl EncodedFeatures {
    /// Borrows the row as a slice.
    #[must_use]
    pub const fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

impl AsRef<[f64]> for EncodedFeatures {
    fn as_ref(&self) -> &[f64] {
        &self.0
    }
}

/// A fitted model mapping an encoded feature row to a crime rate estimate.
///
/// Implementations must be immutable once constructed so a single instance
/// can serve concurrent callers.
pub trait Regressor: Send + Sync {
    /// Predicts a single row laid out as described by [`FEATURE_NAMES`].
    fn predict(&self, features: &[f64]) -> f64;

    /// Number of columns the model was fitted on.
    fn feature_count(&self) -> usize;
}

/// Per-feature contributions shown alongside a prediction.
///
/// Only `city_impact` is part of the blended rate arithmetic. The other
/// fields restate the generative formula for the given inputs and are not a
/// breakdown of what the fitted model actually computed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Factors {
    /// Shift applied for the city's baseline.
    pub city_impact: f64,
    /// Contribution of the area type.
    pub area_type_impact: f64,
    /// Contribution of population density.
    pub population_impact: f64,
    /// Contribution of night-time.
    pub time_impact: f64,
    /// Seasonal swing for the month.
    pub seasonal_impact: f64,
    /// Contribution of Saturday/Sunday.
    pub weekend_impact: f64,
}

/// Output of a single prediction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Blended crime rate, always within
    /// [`coefficients::MIN_CRIME_RATE`]..=[`coefficients::MAX_CRIME_RATE`].
    pub crime_rate: f64,
    /// Raw regressor output before the city adjustment.
    pub base_rate: f64,
    /// City multiplier the adjustment was derived from.
    pub city_base_rate: f64,
    /// Illustrative factor decomposition, each rounded to 2 decimals.
    pub factors: Factors,
}

/// User-facing risk bucket for a crime rate.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum RiskLevel {
    /// Below 2.0
    Low,
    /// 2.0 up to (not including) 4.0
    Medium,
    /// 4.0 and above
    High,
}

impl RiskLevel {
    /// Buckets a crime rate.
    #[must_use]
    pub fn from_crime_rate(crime_rate: f64) -> Self {
        if crime_rate < 2.0 {
            Self::Low
        } else if crime_rate < 4.0 {
            Self::Medium
        } else {
            Self::High
        }
    }

    /// Hex colour the frontend uses for this bucket.
    #[must_use]
    pub const fn color(self) -> &'static str {
        match self {
            Self::Low => "#4CAF50",
            Self::Medium => "#FF9800",
            Self::High => "#F44336",
        }
    }
}

/// Rounds to two decimal places, ties to even.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}
