// src/models/mod.rs
pub mod estimator;
pub mod key;
pub mod registry;

pub use estimator::{GradeModel, LinearModel, ModelArtifact, TreeEnsemble};
pub use key::{Gender, ModelKey, Period, Subject};
pub use registry::ModelRegistry;
