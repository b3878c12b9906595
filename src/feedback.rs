// src/feedback.rs
//! Append-only dataset of normalized requests with their true outcomes, kept
//! for future retraining.

use anyhow::{Context, Result};
use log::{info, warn};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::PredictionError;
use crate::features::{normalize_extended, FeatureVector, RawInput};

pub const DEFAULT_FEEDBACK_PATH: &str = "feedback_data/feedback_data.csv";

/// Extended-schema features followed by the final grade.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackRecord {
    features: FeatureVector,
    final_grade: f64,
}

impl FeedbackRecord {
    pub fn new(
        raw: &RawInput,
        period1: f64,
        period2: f64,
        final_grade: f64,
    ) -> Result<Self, PredictionError> {
        for (field, value) in [("G1", period1), ("G2", period2), ("G3", final_grade)] {
            if !value.is_finite() {
                return Err(PredictionError::validation(format!(
                    "Missing or invalid {} value",
                    field
                )));
            }
        }
        let features = normalize_extended(raw, period1, period2)?;
        Ok(Self {
            features,
            final_grade,
        })
    }

    pub fn features(&self) -> &FeatureVector {
        &self.features
    }

    pub fn final_grade(&self) -> f64 {
        self.final_grade
    }

    /// Column names in on-disk order: extended schema, then `G3`.
    pub fn header() -> Vec<&'static str> {
        crate::features::FeatureSchema::extended()
            .names()
            .chain(std::iter::once("G3"))
            .collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.features
            .as_slice()
            .iter()
            .copied()
            .chain(std::iter::once(self.final_grade))
            .collect()
    }
}

/// Appends feedback rows to a CSV file, creating it with a header on first
/// use. Appends are serialized; each row goes out in a single write so a
/// failed call leaves no partial row behind.
#[derive(Debug)]
pub struct FeedbackRecorder {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FeedbackRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records a request whose `G1`, `G2` and `G3` fields carry the outcomes.
    pub fn record_request(&self, raw: &RawInput) -> Result<FeedbackRecord, PredictionError> {
        let period1 = raw.required_grade("G1")?;
        let period2 = raw.required_grade("G2")?;
        let final_grade = raw.required_grade("G3")?;
        self.record(raw, period1, period2, final_grade)
    }

    pub fn record(
        &self,
        raw: &RawInput,
        period1: f64,
        period2: f64,
        final_grade: f64,
    ) -> Result<FeedbackRecord, PredictionError> {
        let record = FeedbackRecord::new(raw, period1, period2, final_grade)?;
        self.append(&record)
            .context("Failed to save feedback data")
            .map_err(PredictionError::Internal)?;
        info!(
            "Saved feedback row to {} (G1={}, G2={}, G3={})",
            self.path.display(),
            period1,
            period2,
            final_grade
        );
        Ok(record)
    }

    fn append(&self, record: &FeedbackRecord) -> Result<()> {
        let row = encode_row(record)?;

        // A poisoned lock guards no data, so keep writing.
        let _guard = self.write_lock.lock().unwrap_or_else(|poisoned| {
            warn!("Feedback writer lock was poisoned; continuing");
            poisoned.into_inner()
        });

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create feedback directory {}", parent.display())
                })?;
            }
        }

        let needs_header = fs::metadata(&self.path)
            .map(|meta| meta.len() == 0)
            .unwrap_or(true);
        let mut buffer = if needs_header {
            info!("Creating feedback dataset at {}", self.path.display());
            encode_header()?
        } else {
            Vec::new()
        };
        buffer.extend_from_slice(&row);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        file.write_all(&buffer)
            .with_context(|| format!("Failed to append to {}", self.path.display()))?;
        file.flush()?;
        Ok(())
    }
}

fn encode_header() -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(FeedbackRecord::header())?;
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to encode feedback header: {}", e))
}

fn encode_row(record: &FeedbackRecord) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(record.values().iter().map(|value| value.to_string()))?;
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to encode feedback row: {}", e))
}
