// src/error.rs
use std::fmt;

use crate::models::key::ModelKey;

/// Failure kinds surfaced by the prediction and feedback paths.
///
/// Every variant is converted into a user-visible payload at the request
/// boundary; none of them terminate the process.
#[derive(Debug)]
pub enum PredictionError {
    /// Malformed, missing or non-numeric required input.
    Validation(String),
    /// No model is registered for the resolved key.
    ModelNotFound(ModelKey),
    /// Unexpected failure while normalizing, invoking a model or persisting.
    Internal(anyhow::Error),
}

impl PredictionError {
    pub fn validation(message: impl Into<String>) -> Self {
        PredictionError::Validation(message.into())
    }

    pub fn status_code(&self) -> u16 {
        match self {
            PredictionError::Validation(_) => 400,
            PredictionError::ModelNotFound(_) => 404,
            PredictionError::Internal(_) => 500,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, PredictionError::Validation(_))
    }
}

impl fmt::Display for PredictionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictionError::Validation(message) => write!(f, "{}", message),
            PredictionError::ModelNotFound(key) => write!(f, "Model not found: {}", key),
            // Alternate formatting keeps the context chain.
            PredictionError::Internal(err) => write!(f, "{:#}", err),
        }
    }
}

impl std::error::Error for PredictionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PredictionError::Internal(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for PredictionError {
    fn from(err: anyhow::Error) -> Self {
        PredictionError::Internal(err)
    }
}
