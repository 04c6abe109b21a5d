#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI for the crime rate toolchain.
//!
//! ```text
//! cargo crime-rate train [--profile default] [--output data/crime_model.msgpack]
//! cargo crime-rate predict [--city "San Jose"] [--area-type urban] [--month 6] ...
//! cargo crime-rate serve
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use crime_rate_engine::profiles::{self, DEFAULT_PROFILE};
use crime_rate_engine::{CityTable, PredictionEngine};
use crime_rate_prediction_models::{FEATURE_NAMES, NumericInput, PredictionInput};
use crime_rate_server::DEFAULT_MODEL_PATH;
use crime_rate_server_models::{ApiPredictRequest, ApiPredictResponse};

#[derive(Parser)]
#[command(name = "crime_rate_cli", about = "Train, query, and serve the crime rate model")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate synthetic data, fit a forest, and save it
    Train {
        /// Training profile name
        #[arg(long, default_value = DEFAULT_PROFILE)]
        profile: String,
        /// Where to write the fitted model
        #[arg(long, default_value = DEFAULT_MODEL_PATH)]
        output: PathBuf,
    },
    /// Predict a crime rate and print the JSON response
    Predict {
        /// City name
        #[arg(long)]
        city: Option<String>,
        /// urban, suburban or rural
        #[arg(long)]
        area_type: Option<String>,
        /// Residents per square kilometre
        #[arg(long)]
        population_density: Option<f64>,
        /// day or night
        #[arg(long)]
        time_of_day: Option<String>,
        /// Month of year (1-12)
        #[arg(long)]
        month: Option<i64>,
        /// Day of week (1 = Monday)
        #[arg(long)]
        day_of_week: Option<i64>,
        /// Model file; trained with the default profile if missing
        #[arg(long, default_value = DEFAULT_MODEL_PATH)]
        model: PathBuf,
    },
    /// Run the HTTP API server
    Serve,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let cli = Cli::parse();

    match cli.command {
        Commands::Train { profile, output } => train(&profile, &output)?,
        Commands::Predict {
            city,
            area_type,
            population_density,
            time_of_day,
            month,
            day_of_week,
            model,
        } => {
            let request = ApiPredictRequest {
                city,
                area_type,
                population_density: population_density.map(NumericInput::from),
                time_of_day,
                month: month.map(NumericInput::from),
                day_of_week: day_of_week.map(NumericInput::from),
            };
            let engine = PredictionEngine::load_or_train(
                &model,
                &profiles::default_profile(),
                CityTable::builtin(),
            )?;

            let city = request.city_or_empty().to_string();
            let result = engine.predict(&PredictionInput::from(request))?;
            let json = serde_json::to_string_pretty(&ApiPredictResponse::new(city, &result))?;
            println!("{json}");
        }
        Commands::Serve => {
            // The server uses actix-web's runtime, so we need to run it
            // in a blocking task to avoid nesting tokio runtimes.
            tokio::task::spawn_blocking(|| {
                actix_web::rt::System::new().block_on(crime_rate_server::run_server())
            })
            .await??;
        }
    }

    Ok(())
}

fn train(profile_name: &str, output: &std::path::Path) -> Result<(), Box<dyn std::error::Error>> {
    let profile = profiles::profile(profile_name).ok_or_else(|| {
        let known: Vec<String> = profiles::all_profiles().into_iter().map(|p| p.name).collect();
        format!(
            "Unknown profile '{profile_name}' (available: {})",
            known.join(", ")
        )
    })?;

    println!("Profile: {} ({})", profile.name, profile.description);

    let (forest, set) = crime_rate_engine::fit(&profile)?;

    if let Some((min, max)) = set.target_range() {
        println!("Generated {} samples, crime rate {min:.2} - {max:.2}", set.len());
    }

    if let Some(metrics) = crime_rate_training::metrics::evaluate(&forest, &set) {
        println!("RMSE: {:.3}", metrics.rmse);
        println!("MAE:  {:.3}", metrics.mae);
        println!("R²:   {:.3}", metrics.r_squared);
    }

    let mut importances: Vec<(&str, f64)> = FEATURE_NAMES
        .iter()
        .copied()
        .zip(forest.feature_importances().iter().copied())
        .collect();
    importances.sort_by(|a, b| b.1.total_cmp(&a.1));

    println!("\nFeature importances:");
    for (name, importance) in importances {
        println!("  {name:<20} {importance:.3}");
    }

    forest.save(output)?;
    println!("\nSaved model to {}", output.display());

    Ok(())
}
