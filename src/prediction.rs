// src/prediction.rs
//! Final-grade prediction: validate, normalize, assemble, dispatch.

use anyhow::anyhow;
use log::{debug, info};
use serde::Serialize;
use std::sync::Arc;

use crate::error::PredictionError;
use crate::features::{normalize, FeatureVector, RawInput};
use crate::models::{Gender, ModelKey, ModelRegistry, Period, Subject};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    #[serde(skip)]
    pub key: ModelKey,
    /// Not clamped to the grading scale.
    #[serde(rename = "G3")]
    pub final_grade: f64,
}

/// Stateless predictor over a registry injected at construction.
#[derive(Debug, Clone)]
pub struct GradePredictor {
    registry: Arc<ModelRegistry>,
}

impl GradePredictor {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Predicts the final grade for one request.
    ///
    /// `subject` and `gender` are required and validated before any model
    /// lookup. Missing or blank G1/G2 default to 0.0; present but
    /// non-numeric grades are rejected.
    pub fn predict(&self, raw: &RawInput) -> Result<Prediction, PredictionError> {
        let (subject, gender) = resolve_subject_and_gender(raw)?;
        let (period1, period2) = resolve_prior_grades(raw)?;

        let features = self.assemble(raw, period1, period2)?;
        let key = ModelKey::new(subject, gender, Period::Final);
        let model = self
            .registry
            .get(&key)
            .ok_or(PredictionError::ModelNotFound(key))?;

        let final_grade = model
            .predict(features.as_slice())
            .map_err(|e| PredictionError::Internal(e.context(format!("Model {} failed", key))))?;
        if !final_grade.is_finite() {
            return Err(PredictionError::Internal(anyhow!(
                "Model {} produced a non-finite prediction",
                key
            )));
        }

        info!("Final G3 prediction with {}: {:.2}", key, final_grade);
        Ok(Prediction { key, final_grade })
    }

    /// Extended-schema vector with the supplied prior grades injected.
    fn assemble(
        &self,
        raw: &RawInput,
        period1: f64,
        period2: f64,
    ) -> Result<FeatureVector, PredictionError> {
        let base = normalize(raw)?;
        let extended = base
            .with_prior_grades(period1, period2)
            .map_err(PredictionError::Internal)?;
        debug!(
            "Assembled {} features for the {} schema (fingerprint {})",
            extended.len(),
            extended.schema().label(),
            extended.schema().short_fingerprint()
        );
        Ok(extended)
    }
}

fn resolve_subject_and_gender(raw: &RawInput) -> Result<(Subject, Gender), PredictionError> {
    let subject = match raw.text("subject") {
        None => return Err(PredictionError::validation("Missing required field: subject")),
        Some(value) => Subject::from_request(value).ok_or_else(|| {
            PredictionError::validation(format!(
                "Unsupported subject '{}': expected mathematics or portuguese",
                value
            ))
        })?,
    };
    let gender = match raw.text("gender") {
        None => return Err(PredictionError::validation("Missing required field: gender")),
        Some(value) => Gender::from_request(value).ok_or_else(|| {
            PredictionError::validation(format!(
                "Unsupported gender '{}': expected male or female",
                value
            ))
        })?,
    };
    Ok((subject, gender))
}

fn resolve_prior_grades(raw: &RawInput) -> Result<(f64, f64), PredictionError> {
    let mut grades = [0.0; 2];
    for (slot, field) in grades.iter_mut().zip(["G1", "G2"]) {
        match raw.optional_grade(field)? {
            Some(value) => *slot = value,
            None => info!("{} not provided, using default value 0.0", field),
        }
    }
    Ok((grades[0], grades[1]))
}
