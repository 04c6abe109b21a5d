#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the crime rate server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the engine types so the wire contract can evolve independently.
//! Field names stay `snake_case` on the wire.

use crime_rate_prediction_models::{
    AreaType, Factors, NumericInput, PredictionInput, PredictionResult, RiskLevel, TimeOfDay,
    round2,
};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/predict`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiPredictRequest {
    /// City name.
    pub city: Option<String>,
    /// `urban`, `suburban` or `rural`.
    pub area_type: Option<String>,
    /// Residents per square kilometre.
    pub population_density: Option<NumericInput>,
    /// `day` or `night`.
    pub time_of_day: Option<String>,
    /// Month of year, 1-12.
    pub month: Option<NumericInput>,
    /// Day of week, Monday = 1.
    pub day_of_week: Option<NumericInput>,
}

impl ApiPredictRequest {
    /// The city echoed back in the response (`""` when omitted).
    #[must_use]
    pub fn city_or_empty(&self) -> &str {
        self.city.as_deref().unwrap_or_default()
    }

    /// A fully populated request, used as the usage example.
    #[must_use]
    pub fn example() -> Self {
        Self {
            city: Some("San Francisco".to_string()),
            area_type: Some(AreaType::Urban.to_string()),
            population_density: Some(NumericInput::Number(8000.0)),
            time_of_day: Some(TimeOfDay::Night.to_string()),
            month: Some(NumericInput::Number(7.0)),
            day_of_week: Some(NumericInput::Number(6.0)),
        }
    }
}

impl From<ApiPredictRequest> for PredictionInput {
    fn from(req: ApiPredictRequest) -> Self {
        let defaults = Self::default();
        Self {
            city: req.city.or(defaults.city),
            area_type: req.area_type.unwrap_or(defaults.area_type),
            population_density: req
                .population_density
                .unwrap_or(defaults.population_density),
            time_of_day: req.time_of_day.unwrap_or(defaults.time_of_day),
            month: req.month.unwrap_or(defaults.month),
            day_of_week: req.day_of_week.unwrap_or(defaults.day_of_week),
        }
    }
}

/// Successful prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiPredictResponse {
    /// Always `true`.
    pub success: bool,
    /// City as supplied by the caller.
    pub city: String,
    /// Predicted crime rate, rounded to 2 decimals.
    pub crime_rate: f64,
    /// Risk bucket of the unrounded rate.
    pub risk_level: RiskLevel,
    /// Display color for the risk bucket.
    pub risk_color: String,
    /// Factor decomposition.
    pub factors: Factors,
}

impl ApiPredictResponse {
    /// Builds a response from an engine result.
    #[must_use]
    pub fn new(city: impl Into<String>, result: &PredictionResult) -> Self {
        let risk_level = RiskLevel::from_crime_rate(result.crime_rate);
        Self {
            success: true,
            city: city.into(),
            crime_rate: round2(result.crime_rate),
            risk_level,
            risk_color: risk_level.color().to_string(),
            factors: result.factors,
        }
    }
}

/// Failure envelope shared by every endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Always `false`.
    pub success: bool,
    /// Human-readable message.
    pub error: String,
}

impl ApiError {
    /// Wraps a message.
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

/// `GET /api/predict` usage hint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiPredictUsage {
    /// How to call the endpoint.
    pub message: String,
    /// Example request body.
    pub example: ApiPredictRequest,
}

/// Health check response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Whether a model is loaded.
    pub predictor_ready: bool,
    /// Service version.
    pub version: String,
}

/// `GET /` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiStatus {
    /// Service banner.
    pub message: String,
    /// Always `"running"`.
    pub status: String,
    /// Whether a model is loaded.
    pub predictor_ready: bool,
}

/// `GET /api/cities` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiCities {
    /// Always `true`.
    pub success: bool,
    /// Suggested city names.
    pub cities: Vec<String>,
}
