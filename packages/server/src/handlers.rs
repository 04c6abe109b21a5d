//! HTTP handler functions for the crime rate API.

use actix_web::{HttpRequest, HttpResponse, web};
use crime_rate_engine::PredictError;
use crime_rate_prediction_models::PredictionInput;
use crime_rate_server_models::{
    ApiCities, ApiError, ApiHealth, ApiPredictRequest, ApiPredictResponse, ApiPredictUsage,
    ApiStatus,
};

use crate::AppState;

/// `GET /`
pub async fn index(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ApiStatus {
        message: "Crime Rate Prediction API".to_string(),
        status: "running".to_string(),
        predictor_ready: state.predictor_ready(),
    })
}

/// `GET /api/health`
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        predictor_ready: state.predictor_ready(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/predict`
///
/// Describes how to call the POST endpoint.
pub async fn predict_usage() -> HttpResponse {
    HttpResponse::Ok().json(ApiPredictUsage {
        message: "Send a POST request with a JSON body to get a crime rate prediction"
            .to_string(),
        example: ApiPredictRequest::example(),
    })
}

/// `POST /api/predict`
///
/// Missing fields take their defaults. Bad numeric values answer 400; a
/// missing or broken model answers 500.
pub async fn predict(
    state: web::Data<AppState>,
    body: web::Json<ApiPredictRequest>,
) -> HttpResponse {
    let Some(engine) = state.engine.as_ref() else {
        log::error!("Prediction requested but no predictor is loaded");
        return HttpResponse::InternalServerError()
            .json(ApiError::new("Predictor not initialized"));
    };

    let request = body.into_inner();
    let city = request.city_or_empty().to_string();
    let input = PredictionInput::from(request);

    match engine.predict(&input) {
        Ok(result) => HttpResponse::Ok().json(ApiPredictResponse::new(city, &result)),
        Err(e @ PredictError::InvalidInput { .. }) => {
            log::warn!("Rejected prediction request: {e}");
            HttpResponse::BadRequest().json(ApiError::new(e.to_string()))
        }
        Err(e @ PredictError::ModelUnavailable { .. }) => {
            log::error!("Prediction failed: {e}");
            HttpResponse::InternalServerError().json(ApiError::new(e.to_string()))
        }
    }
}

/// `GET /api/cities`
///
/// Returns the suggested city names in table order.
pub async fn cities(state: web::Data<AppState>) -> HttpResponse {
    let cities = state
        .cities
        .sample_labels()
        .into_iter()
        .map(str::to_string)
        .collect();

    HttpResponse::Ok().json(ApiCities {
        success: true,
        cities,
    })
}

/// Fallback for paths no route matches.
pub async fn not_found(req: HttpRequest) -> HttpResponse {
    HttpResponse::NotFound().json(ApiError::new(format!("Not found: {}", req.path())))
}

/// Fallback for a known path called with an unsupported method.
pub async fn method_not_allowed(req: HttpRequest) -> HttpResponse {
    HttpResponse::MethodNotAllowed().json(ApiError::new(format!(
        "Method {} not allowed for {}",
        req.method(),
        req.path()
    )))
}
