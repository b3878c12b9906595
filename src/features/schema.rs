// src/features/schema.rs
//! Ordered feature contract shared by the normalizer, the prediction engine,
//! the feedback recorder and model loading.
//!
//! Trained artifacts are fit against this exact column order. Any change to
//! the tables below must bump `SCHEMA_VERSION`, which changes the fingerprint
//! and makes the registry reject artifacts fit against the old layout.

use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::models::key::Period;

pub const SCHEMA_VERSION: u32 = 1;

/// How a feature is derived from the raw request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureKind {
    /// Integer-coerced value copied from the request; absent means 0.
    Direct,
    /// 1 when the source field equals the sentinel exactly, else 0.
    Equals(&'static str),
    /// `(value - min) / (max - min)`; absent means `min`. Not clamped.
    Range { min: f64, max: f64 },
    /// 1 for an affirmative value (`"yes"`, `"1"`, `1`, `true`), else 0.
    Binary,
    /// One indicator of a categorical group.
    OneHot(&'static str),
    /// Mean of the two prior-period grades when both were supplied.
    GradeAverage,
    /// Mean of normalized weekday and weekend alcohol use.
    AverageAlcohol,
    /// Weighted behavioral risk composite.
    CompositeRisk,
    /// Prior-period grade as supplied (extended schema only).
    PriorGrade,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureSpec {
    /// Column name the models were fit against.
    pub name: &'static str,
    /// Request field the value is read from (empty for engineered features).
    pub source: &'static str,
    pub kind: FeatureKind,
}

const fn direct(name: &'static str) -> FeatureSpec {
    FeatureSpec {
        name,
        source: name,
        kind: FeatureKind::Direct,
    }
}

const fn range(name: &'static str, min: f64, max: f64) -> FeatureSpec {
    FeatureSpec {
        name,
        source: name,
        kind: FeatureKind::Range { min, max },
    }
}

const fn binary(name: &'static str) -> FeatureSpec {
    FeatureSpec {
        name,
        source: name,
        kind: FeatureKind::Binary,
    }
}

const fn one_hot(name: &'static str, source: &'static str, category: &'static str) -> FeatureSpec {
    FeatureSpec {
        name,
        source,
        kind: FeatureKind::OneHot(category),
    }
}

const fn engineered(name: &'static str, kind: FeatureKind) -> FeatureSpec {
    FeatureSpec {
        name,
        source: "",
        kind,
    }
}

/// Demographic and behavioral features plus the engineered aggregates.
pub const BASE_FEATURES: [FeatureSpec; 46] = [
    direct("school"),
    FeatureSpec {
        name: "sex",
        source: "gender",
        kind: FeatureKind::Equals("male"),
    },
    range("age", 15.0, 22.0),
    direct("address"),
    direct("famsize"),
    direct("Pstatus"),
    range("Medu", 0.0, 4.0),
    range("Fedu", 0.0, 4.0),
    range("traveltime", 1.0, 4.0),
    range("studytime", 1.0, 4.0),
    range("failures", 0.0, 4.0),
    binary("schoolsup"),
    binary("famsup"),
    binary("paid"),
    binary("activities"),
    binary("nursery"),
    binary("higher"),
    binary("internet"),
    binary("romantic"),
    range("famrel", 1.0, 5.0),
    range("freetime", 1.0, 5.0),
    range("goout", 1.0, 5.0),
    range("Dalc", 1.0, 5.0),
    range("Walc", 1.0, 5.0),
    range("health", 1.0, 5.0),
    range("absences", 0.0, 93.0),
    one_hot("Mjob_at_home", "Mjob", "at_home"),
    one_hot("Mjob_health", "Mjob", "health"),
    one_hot("Mjob_other", "Mjob", "other"),
    one_hot("Mjob_services", "Mjob", "services"),
    one_hot("Mjob_teacher", "Mjob", "teacher"),
    one_hot("Fjob_at_home", "Fjob", "at_home"),
    one_hot("Fjob_health", "Fjob", "health"),
    one_hot("Fjob_other", "Fjob", "other"),
    one_hot("Fjob_services", "Fjob", "services"),
    one_hot("Fjob_teacher", "Fjob", "teacher"),
    one_hot("reason_course", "reason", "course"),
    one_hot("reason_home", "reason", "home"),
    one_hot("reason_other", "reason", "other"),
    one_hot("reason_reputation", "reason", "reputation"),
    one_hot("guardian_father", "guardian", "father"),
    one_hot("guardian_mother", "guardian", "mother"),
    one_hot("guardian_other", "guardian", "other"),
    engineered("Gvg", FeatureKind::GradeAverage),
    engineered("Avgalc", FeatureKind::AverageAlcohol),
    engineered("Bum", FeatureKind::CompositeRisk),
];

/// Appended after the base features for final-grade models.
pub const PRIOR_GRADE_FEATURES: [FeatureSpec; 2] = [
    FeatureSpec {
        name: "G1",
        source: "G1",
        kind: FeatureKind::PriorGrade,
    },
    FeatureSpec {
        name: "G2",
        source: "G2",
        kind: FeatureKind::PriorGrade,
    },
];

static BASE_SCHEMA: Lazy<FeatureSchema> =
    Lazy::new(|| FeatureSchema::build("base", BASE_FEATURES.to_vec()));

static EXTENDED_SCHEMA: Lazy<FeatureSchema> = Lazy::new(|| {
    let features = BASE_FEATURES
        .iter()
        .chain(PRIOR_GRADE_FEATURES.iter())
        .copied()
        .collect();
    FeatureSchema::build("extended", features)
});

#[derive(Debug)]
pub struct FeatureSchema {
    label: &'static str,
    features: Vec<FeatureSpec>,
    index: HashMap<&'static str, usize>,
    fingerprint: String,
}

impl FeatureSchema {
    fn build(label: &'static str, features: Vec<FeatureSpec>) -> Self {
        let index = features
            .iter()
            .enumerate()
            .map(|(position, spec)| (spec.name, position))
            .collect();

        let mut hasher = Sha256::new();
        hasher.update(format!("v{}:", SCHEMA_VERSION).as_bytes());
        for spec in &features {
            hasher.update(spec.name.as_bytes());
            hasher.update(b",");
        }
        let fingerprint = hex::encode(hasher.finalize());

        Self {
            label,
            features,
            index,
            fingerprint,
        }
    }

    pub fn base() -> &'static FeatureSchema {
        &BASE_SCHEMA
    }

    pub fn extended() -> &'static FeatureSchema {
        &EXTENDED_SCHEMA
    }

    /// Final-grade models consume prior grades; period models do not.
    pub fn for_period(period: Period) -> &'static FeatureSchema {
        match period {
            Period::Final => Self::extended(),
            Period::Period1 | Period::Period2 => Self::base(),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn version(&self) -> u32 {
        SCHEMA_VERSION
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn features(&self) -> &[FeatureSpec] {
        &self.features
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.features.iter().map(|spec| spec.name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Position of a column the caller cannot do without.
    pub fn require(&self, name: &str) -> Result<usize> {
        match self.position(name) {
            Some(position) => Ok(position),
            None => bail!("feature '{}' is not part of the {} schema", name, self.label),
        }
    }

    /// SHA-256 over the version and the ordered names, hex encoded.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn short_fingerprint(&self) -> &str {
        &self.fingerprint[..12]
    }

    /// Checks that `names` is exactly this schema, in order.
    pub fn verify_names(&self, names: &[String]) -> Result<()> {
        if names.len() != self.len() {
            bail!(
                "expected {} features for the {} schema (v{}), got {}",
                self.len(),
                self.label,
                SCHEMA_VERSION,
                names.len()
            );
        }
        for (position, (expected, actual)) in self.names().zip(names.iter()).enumerate() {
            if expected != actual.as_str() {
                bail!(
                    "feature {} should be '{}' in the {} schema (v{}), found '{}'",
                    position,
                    expected,
                    self.label,
                    SCHEMA_VERSION,
                    actual
                );
            }
        }
        Ok(())
    }
}
