// src/features/vector.rs
use anyhow::{bail, Result};

use super::schema::FeatureSchema;

/// Normalized values laid out in the order of the schema they belong to.
///
/// The only way to build one is through the normalizer or
/// `with_prior_grades`, so the values always cover exactly the schema's
/// feature names.
#[derive(Debug, Clone)]
pub struct FeatureVector {
    schema: &'static FeatureSchema,
    values: Vec<f64>,
}

impl FeatureVector {
    pub(crate) fn from_values(schema: &'static FeatureSchema, values: Vec<f64>) -> Self {
        debug_assert_eq!(schema.len(), values.len());
        Self { schema, values }
    }

    pub fn schema(&self) -> &'static FeatureSchema {
        self.schema
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.schema
            .position(name)
            .map(|position| self.values[position])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(name, value)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        self.schema.names().zip(self.values.iter().copied())
    }

    /// Extends a base vector with the prior-period grades.
    ///
    /// `Gvg` is recomputed from the supplied grades, replacing whatever the
    /// normalizer derived from the raw request.
    pub fn with_prior_grades(mut self, period1: f64, period2: f64) -> Result<FeatureVector> {
        if !std::ptr::eq(self.schema, FeatureSchema::base()) {
            bail!(
                "prior grades can only extend the base schema, not the {} schema",
                self.schema.label()
            );
        }
        if let Some(position) = self.schema.position("Gvg") {
            self.values[position] = (period1 + period2) / 2.0;
        }
        self.values.push(period1);
        self.values.push(period2);
        Ok(FeatureVector::from_values(
            FeatureSchema::extended(),
            self.values,
        ))
    }
}

impl PartialEq for FeatureVector {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.schema, other.schema) && self.values == other.values
    }
}
