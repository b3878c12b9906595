// src/api.rs
//! Request boundary: JSON in, status and JSON payload out.
//!
//! The routing layer (HTTP, sessions, auth) lives elsewhere and calls into
//! `PredictionService`; every failure is converted into an `{"error": ...}`
//! payload here and never escapes as a panic or process exit.

use anyhow::{Context, Result};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::PredictionError;
use crate::feedback::FeedbackRecorder;
use crate::features::RawInput;
use crate::models::ModelRegistry;
use crate::prediction::GradePredictor;
use crate::utils::config::ServiceConfig;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub request_id: Uuid,
    pub status: u16,
    pub body: JsonValue,
}

impl ApiResponse {
    fn new(request_id: Uuid, status: u16, body: JsonValue) -> Self {
        Self {
            request_id,
            status,
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One line of the `serve` protocol.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestEnvelope {
    pub route: String,
    #[serde(default)]
    pub body: JsonValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Predict,
    NewData,
}

impl Route {
    /// Accepts `predict`, `/predict` and `/api/predict` style paths.
    pub fn parse(path: &str) -> Option<Self> {
        let trimmed = path.trim().trim_start_matches('/');
        let trimmed = trimmed.strip_prefix("api/").unwrap_or(trimmed);
        match trimmed {
            "predict" => Some(Route::Predict),
            "new-data" => Some(Route::NewData),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Predict => "/api/predict",
            Route::NewData => "/api/new-data",
        }
    }
}

pub struct PredictionService {
    predictor: GradePredictor,
    recorder: Option<FeedbackRecorder>,
}

impl PredictionService {
    pub fn new(predictor: GradePredictor, recorder: Option<FeedbackRecorder>) -> Self {
        Self {
            predictor,
            recorder,
        }
    }

    /// Loads the registry once and wires the recorder per `config`.
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        let registry = ModelRegistry::load(&config.models_dir)
            .context("Failed to build model registry")?;
        let predictor = GradePredictor::new(Arc::new(registry));
        let recorder = config
            .feedback_enabled
            .then(|| FeedbackRecorder::new(config.feedback_path.clone()));
        Ok(Self::new(predictor, recorder))
    }

    pub fn predictor(&self) -> &GradePredictor {
        &self.predictor
    }

    /// Handles one serialized envelope.
    pub fn handle_line(&self, line: &str) -> ApiResponse {
        match serde_json::from_str::<RequestEnvelope>(line) {
            Ok(envelope) => self.handle(&envelope.route, &envelope.body),
            Err(e) => {
                let request_id = Uuid::new_v4();
                warn!("Request {}: malformed envelope: {}", request_id, e);
                ApiResponse::new(
                    request_id,
                    400,
                    json!({ "error": "Request must be a JSON object with 'route' and 'body'" }),
                )
            }
        }
    }

    pub fn handle(&self, path: &str, body: &JsonValue) -> ApiResponse {
        let request_id = Uuid::new_v4();
        match Route::parse(path) {
            Some(Route::Predict) => self.predict(request_id, body),
            Some(Route::NewData) => self.new_data(request_id, body),
            None => {
                warn!("Request {}: unknown route {}", request_id, path);
                ApiResponse::new(
                    request_id,
                    404,
                    json!({ "error": format!("Unknown route: {}", path) }),
                )
            }
        }
    }

    pub fn predict(&self, request_id: Uuid, body: &JsonValue) -> ApiResponse {
        info!("Request {}: POST {} {}", request_id, Route::Predict.as_str(), body);
        let outcome = RawInput::from_json(body).and_then(|raw| self.predictor.predict(&raw));
        match outcome {
            Ok(prediction) => ApiResponse::new(
                request_id,
                200,
                json!({ "predictions": prediction }),
            ),
            Err(err) => error_response(request_id, "Prediction", &err),
        }
    }

    pub fn new_data(&self, request_id: Uuid, body: &JsonValue) -> ApiResponse {
        info!("Request {}: POST {} {}", request_id, Route::NewData.as_str(), body);
        let Some(recorder) = &self.recorder else {
            warn!("Request {}: feedback recording is disabled", request_id);
            return ApiResponse::new(
                request_id,
                503,
                json!({ "error": "Feedback recording is disabled" }),
            );
        };
        let outcome = RawInput::from_json(body).and_then(|raw| recorder.record_request(&raw));
        match outcome {
            Ok(_) => ApiResponse::new(
                request_id,
                200,
                json!({ "message": "Data saved successfully" }),
            ),
            Err(err) => error_response(request_id, "New data submission", &err),
        }
    }
}

fn error_response(request_id: Uuid, operation: &str, err: &PredictionError) -> ApiResponse {
    let status = err.status_code();
    if status >= 500 {
        error!("Request {}: {} failed: {}", request_id, operation, err);
    } else {
        warn!("Request {}: {} rejected: {}", request_id, operation, err);
    }
    ApiResponse::new(request_id, status, json!({ "error": err.to_string() }))
}
