// src/utils/env.rs
use std::path::PathBuf;

/// Loads variables from a `.env` file in the working directory or its
/// parents, if one exists. Variables already set in the process environment
/// take precedence. Runs before logging is configured, so the caller reports
/// the outcome.
pub fn load_env() -> Option<PathBuf> {
    dotenv::dotenv().ok()
}
