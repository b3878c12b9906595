// src/lib.rs
pub mod api;
pub mod error;
pub mod features;
pub mod feedback;
pub mod models;
pub mod prediction;
pub mod utils;

pub use error::PredictionError;
