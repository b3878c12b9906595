// src/main.rs
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use grade_lib::api::{ApiResponse, PredictionService, Route};
use grade_lib::features::FeatureSchema;
use grade_lib::models::ModelRegistry;
use grade_lib::utils::config::ServiceConfig;
use grade_lib::utils::env::load_env;
use grade_lib::utils::logging::init_logging;
use log::{debug, info, warn};
use serde_json::Value as JsonValue;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Parser, Debug)]
#[command(name = "predictor", version, about = "Final-grade prediction service")]
struct Cli {
    /// Directory holding the trained model artifacts (overrides MODELS_DIR)
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// Feedback CSV path (overrides FEEDBACK_PATH)
    #[arg(long)]
    feedback_path: Option<PathBuf>,

    /// Mirror logs into this file (overrides LOG_FILE)
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Answer newline-delimited JSON requests from stdin, one response per line
    Serve,
    /// Predict the final grade for one JSON request (file or stdin)
    Predict {
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Append one JSON feedback submission to the dataset (file or stdin)
    Feedback {
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// List the loaded models and the feature schema in use
    Models,
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_file = load_env();
    let cli = Cli::parse();

    let mut config = ServiceConfig::from_env();
    if let Some(dir) = cli.models_dir {
        config.models_dir = dir;
    }
    if let Some(path) = cli.feedback_path {
        config.feedback_path = path;
    }
    if cli.log_file.is_some() {
        config.log_file = cli.log_file;
    }

    init_logging(config.log_file.as_deref())?;
    match env_file {
        Some(path) => info!("Loaded environment from {}", path.display()),
        None => debug!("No .env file found"),
    }
    config.log_config();

    match cli.command {
        Command::Models => report_models(&config),
        Command::Predict { input } => run_once(&config, Route::Predict, input.as_deref()),
        Command::Feedback { input } => run_once(&config, Route::NewData, input.as_deref()),
        Command::Serve => serve(&config).await,
    }
}

fn report_models(config: &ServiceConfig) -> Result<()> {
    let registry = ModelRegistry::load(&config.models_dir)?;
    let base = FeatureSchema::base();
    let extended = FeatureSchema::extended();

    println!(
        "Feature schema v{}: base {} features ({}), extended {} features ({})",
        base.version(),
        base.len(),
        base.short_fingerprint(),
        extended.len(),
        extended.short_fingerprint()
    );
    println!(
        "Models loaded at {} from {}:",
        registry.loaded_at().to_rfc3339(),
        config.models_dir.display()
    );
    if registry.is_empty() {
        println!("  (none)");
    }
    for key in registry.keys() {
        if let Some(model) = registry.get(key) {
            println!(
                "  {:<16} {:<14} {} features",
                key.to_string(),
                model.kind(),
                model.feature_count()
            );
        }
    }
    Ok(())
}

fn read_request(input: Option<&Path>) -> Result<JsonValue> {
    let text = match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read request from {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read request from stdin")?;
            buffer
        }
    };
    serde_json::from_str(&text).context("Request is not valid JSON")
}

fn run_once(config: &ServiceConfig, route: Route, input: Option<&Path>) -> Result<()> {
    let service = PredictionService::from_config(config)?;
    let body = read_request(input)?;
    let response = service.handle(route.as_str(), &body);
    println!("{}", serde_json::to_string_pretty(&response)?);
    if !response.is_success() {
        bail!(
            "{} request {} failed with status {}",
            route.as_str(),
            response.request_id,
            response.status
        );
    }
    Ok(())
}

async fn serve(config: &ServiceConfig) -> Result<()> {
    let service = Arc::new(PredictionService::from_config(config)?);
    info!(
        "Serving requests on stdin with {} model(s) loaded",
        service.predictor().registry().len()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut handled = 0usize;
    let started = Instant::now();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read request line")?,
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, shutting down");
                break;
            }
        };
        let Some(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let worker = Arc::clone(&service);
        let response: ApiResponse =
            tokio::task::spawn_blocking(move || worker.handle_line(&line))
                .await
                .context("Request handler panicked")?;

        let mut encoded = serde_json::to_vec(&response)?;
        encoded.push(b'\n');
        stdout.write_all(&encoded).await?;
        stdout.flush().await?;
        handled += 1;
    }

    info!(
        "Handled {} request(s) in {:.2?}",
        handled,
        started.elapsed()
    );
    Ok(())
}
