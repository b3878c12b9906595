// src/features/mod.rs
pub mod normalizer;
pub mod raw;
pub mod schema;
pub mod vector;

pub use normalizer::{normalize, normalize_extended};
pub use raw::{RawInput, RawValue};
pub use schema::{FeatureKind, FeatureSchema, FeatureSpec, SCHEMA_VERSION};
pub use vector::FeatureVector;
