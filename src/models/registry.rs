// src/models/registry.rs
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::estimator::{GradeModel, ModelArtifact};
use super::key::ModelKey;
use crate::features::schema::FeatureSchema;

// Anything shaped like a model artifact, recognised or not.
static ARTIFACT_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<key>[A-Za-z0-9]+_[A-Za-z]+_[A-Za-z0-9]+)_model\.json$")
        .expect("artifact name pattern is valid")
});

/// Trained models indexed by (subject, gender, period).
///
/// Built once at startup and read-only afterwards; share it behind an `Arc`.
/// A key without a model is a valid state and only becomes an error when a
/// prediction needs it.
#[derive(Debug)]
pub struct ModelRegistry {
    models: BTreeMap<ModelKey, Box<dyn GradeModel>>,
    source_dir: Option<PathBuf>,
    loaded_at: DateTime<Utc>,
}

impl ModelRegistry {
    /// Scans `dir` for `{subject}_{gender}_{period}_model.json` for every
    /// enumerated combination and loads the ones present.
    ///
    /// Unreadable artifacts, or artifacts fit against a different feature
    /// layout than their period expects, fail the whole load.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        info!("Loading models from {}", dir.display());

        let mut models: BTreeMap<ModelKey, Box<dyn GradeModel>> = BTreeMap::new();
        for key in ModelKey::all() {
            let path = dir.join(key.file_name());
            if !path.is_file() {
                debug!("No model file for {} at {}", key, path.display());
                continue;
            }
            let model = load_artifact(&path, &key)
                .with_context(|| format!("Failed to load model {} from {}", key, path.display()))?;
            models.insert(key, model);
        }

        warn_on_unrecognised_files(dir);

        if models.is_empty() {
            warn!("No models found in {}", dir.display());
        } else {
            info!("Loaded {} model(s) from {}", models.len(), dir.display());
        }

        Ok(Self {
            models,
            source_dir: Some(dir.to_path_buf()),
            loaded_at: Utc::now(),
        })
    }

    /// Registry over models constructed in memory.
    pub fn from_models(models: impl IntoIterator<Item = (ModelKey, Box<dyn GradeModel>)>) -> Self {
        Self {
            models: models.into_iter().collect(),
            source_dir: None,
            loaded_at: Utc::now(),
        }
    }

    pub fn get(&self, key: &ModelKey) -> Option<&dyn GradeModel> {
        self.models.get(key).map(|model| model.as_ref())
    }

    pub fn contains(&self, key: &ModelKey) -> bool {
        self.models.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &ModelKey> {
        self.models.keys()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn source_dir(&self) -> Option<&Path> {
        self.source_dir.as_deref()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

fn load_artifact(path: &Path, key: &ModelKey) -> Result<Box<dyn GradeModel>> {
    let bytes = fs::read(path).context("Failed to read model file")?;
    let digest = hex::encode(Sha256::digest(&bytes));

    let artifact = ModelArtifact::from_slice(&bytes)?;
    let schema = FeatureSchema::for_period(key.period);
    schema
        .verify_names(&artifact.feature_names)
        .with_context(|| format!("Model {} was not fit against the current feature schema", key))?;

    let model = artifact.into_model()?;
    info!(
        "Loaded model: {} ({}, {} features, sha256 {})",
        key,
        model.kind(),
        model.feature_count(),
        &digest[..12]
    );
    Ok(model)
}

fn warn_on_unrecognised_files(dir: &Path) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Could not list model directory {}: {}", dir.display(), e);
            return;
        }
    };
    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if let Some(captures) = ARTIFACT_NAME.captures(name) {
            if ModelKey::parse(&captures["key"]).is_none() {
                warn!("Ignoring model file with unrecognised key: {}", name);
            }
        }
    }
}
