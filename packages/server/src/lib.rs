#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for crime rate predictions.
//!
//! The prediction engine is built once before the server binds and shared
//! read-only across workers. If no model can be acquired the server still
//! starts, reports `predictor_ready: false`, and answers predictions with
//! a 500.

mod handlers;

use std::path::PathBuf;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpResponse, HttpServer, Resource, error::InternalError, middleware, web};
use crime_rate_engine::profiles::{self, DEFAULT_PROFILE, TrainingProfile};
use crime_rate_engine::{CityTable, PredictionEngine};
use crime_rate_server_models::ApiError;

/// Where the persisted model lives when `CRIME_RATE_MODEL_PATH` is unset.
pub const DEFAULT_MODEL_PATH: &str = "data/crime_model.msgpack";

/// Shared application state.
pub struct AppState {
    /// Prediction engine, if one could be built.
    pub engine: Option<Arc<PredictionEngine>>,
    /// City table, available even without an engine.
    pub cities: CityTable,
}

impl AppState {
    /// Wraps a ready engine.
    #[must_use]
    pub fn with_engine(engine: PredictionEngine) -> Self {
        Self {
            cities: engine.cities().clone(),
            engine: Some(Arc::new(engine)),
        }
    }

    /// State for a server that has no model.
    #[must_use]
    pub fn without_engine() -> Self {
        Self {
            engine: None,
            cities: CityTable::builtin(),
        }
    }

    /// Whether predictions can be served.
    #[must_use]
    pub const fn predictor_ready(&self) -> bool {
        self.engine.is_some()
    }
}

/// Model settings read from the environment.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Persisted model location (`CRIME_RATE_MODEL_PATH`).
    pub model_path: PathBuf,
    /// Profile used when the model has to be trained (`CRIME_RATE_PROFILE`).
    pub profile: TrainingProfile,
}

impl ModelConfig {
    /// Reads `CRIME_RATE_MODEL_PATH` and `CRIME_RATE_PROFILE`.
    ///
    /// An unknown profile name is logged and replaced by the default one.
    #[must_use]
    pub fn from_env() -> Self {
        let model_path = std::env::var("CRIME_RATE_MODEL_PATH")
            .map_or_else(|_| PathBuf::from(DEFAULT_MODEL_PATH), PathBuf::from);

        let name =
            std::env::var("CRIME_RATE_PROFILE").unwrap_or_else(|_| DEFAULT_PROFILE.to_string());
        let profile = profiles::profile(&name).unwrap_or_else(|| {
            log::warn!("Unknown training profile '{name}', using '{DEFAULT_PROFILE}'");
            profiles::default_profile()
        });

        Self {
            model_path,
            profile,
        }
    }

    /// Loads or trains the model and builds the application state.
    ///
    /// Failures are logged and yield a state without an engine.
    #[must_use]
    pub fn build_state(&self) -> AppState {
        log::info!("Initializing predictor from {}", self.model_path.display());
        let cities = CityTable::builtin();
        match PredictionEngine::load_or_train(&self.model_path, &self.profile, cities) {
            Ok(engine) => {
                log::info!("Predictor ready");
                AppState::with_engine(engine)
            }
            Err(e) => {
                log::error!("Failed to initialize predictor: {e}");
                AppState::without_engine()
            }
        }
    }
}

/// Registers every route, the JSON error handler, and the fallbacks that
/// answer unknown paths (404) and unsupported methods (405) with an
/// [`ApiError`] body.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        let response = HttpResponse::BadRequest().json(ApiError::new(err.to_string()));
        InternalError::from_response(err, response).into()
    }))
    .service(resource("/").route(web::get().to(handlers::index)))
    .service(
        web::scope("/api")
            .service(resource("/health").route(web::get().to(handlers::health)))
            .service(
                resource("/predict")
                    .route(web::get().to(handlers::predict_usage))
                    .route(web::post().to(handlers::predict)),
            )
            .service(resource("/cities").route(web::get().to(handlers::cities))),
    )
    .default_service(web::to(handlers::not_found));
}

fn resource(path: &str) -> Resource {
    web::resource(path).default_service(web::to(handlers::method_not_allowed))
}

/// Starts the crime rate API server.
///
/// Builds the predictor from [`ModelConfig::from_env`] on a blocking thread,
/// then binds to `BIND_ADDR`:`PORT` (default `127.0.0.1:5000`). The caller
/// is responsible for providing the async runtime (e.g. via
/// `#[actix_web::main]`) and for initializing logging.
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind or
/// encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    let config = ModelConfig::from_env();
    let state = actix_rt::task::spawn_blocking(move || config.build_state())
        .await
        .map_err(std::io::Error::other)?;
    let state = web::Data::new(state);

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(5000);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
