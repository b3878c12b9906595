// src/utils/config.rs
use log::{info, warn};
use std::env;
use std::path::PathBuf;

use crate::feedback::DEFAULT_FEEDBACK_PATH;

pub const DEFAULT_MODELS_DIR: &str = "models";

/// Service configuration, read from the environment with defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Directory scanned for `{subject}_{gender}_{period}_model.json`.
    pub models_dir: PathBuf,
    /// Append-only CSV receiving feedback rows.
    pub feedback_path: PathBuf,
    /// When false, feedback submissions are refused.
    pub feedback_enabled: bool,
    /// Optional file that receives a copy of every log line.
    pub log_file: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from(DEFAULT_MODELS_DIR),
            feedback_path: PathBuf::from(DEFAULT_FEEDBACK_PATH),
            feedback_enabled: true,
            log_file: None,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        let models_dir = env::var("MODELS_DIR")
            .unwrap_or_else(|_| DEFAULT_MODELS_DIR.to_string())
            .into();
        let feedback_path = env::var("FEEDBACK_PATH")
            .unwrap_or_else(|_| DEFAULT_FEEDBACK_PATH.to_string())
            .into();
        let feedback_enabled = env::var("FEEDBACK_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .unwrap_or(true);
        let log_file = env::var("LOG_FILE")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        Self {
            models_dir,
            feedback_path,
            feedback_enabled,
            log_file,
        }
    }

    pub fn log_config(&self) {
        info!("Models directory: {}", self.models_dir.display());
        if self.feedback_enabled {
            info!("Feedback dataset: {}", self.feedback_path.display());
        } else {
            warn!("Feedback recording DISABLED - submissions will be refused");
        }
        if let Some(ref path) = self.log_file {
            info!("Log file: {}", path.display());
        }
    }
}
