//! Helpers for reading configuration from environment variables.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FromEnvError {
  #[error("Invalid key {0}: {1}")]
  InvalidKey(String, #[source] anyhow::Error),
}

/// Reads an environment variable, treating unset and blank values alike
pub fn optional_var(name: &str) -> Option<String> {
  std::env::var(name)
    .ok()
    .map(|value| value.trim().to_string())
    .filter(|value| !value.is_empty())
}
