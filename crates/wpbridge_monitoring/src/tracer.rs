//! Sets up `tracing_subscriber` to write to rolling log files, standard output, or both.
use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::anyhow;
use serde::Deserialize;
use serde::Serialize;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Registry;
use wpbridge_core::from_env::optional_var;
use wpbridge_core::from_env::FromEnvError;

const MODE_VAR: &str = "WPBRIDGE_TRACING_MODE";
const DIRECTORY_VAR: &str = "WPBRIDGE_TRACING_DIR";

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase", tag = "mode")]
pub enum TracerMode {
  /// Output the logs to Stdout
  Stdout,
  /// Output the logs to hourly rolling files
  File,
}

impl TracerMode {
  /// Reads a comma separated list of modes, duplicates are ignored
  pub fn from_env() -> Result<Vec<Self>, FromEnvError> {
    let Some(value) = optional_var(MODE_VAR) else {
      return Ok(vec![]);
    };

    parse_modes(&value)
  }
}

fn parse_modes(value: &str) -> Result<Vec<TracerMode>, FromEnvError> {
  let mut modes = vec![];
  let mut seen = HashSet::new();

  for mode in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
    let mode = match mode {
      "stdout" => TracerMode::Stdout,
      "file" => TracerMode::File,
      value => {
        return Err(FromEnvError::InvalidKey(
          String::from(MODE_VAR),
          anyhow!("Invalid value: {}", value),
        ))
      }
    };

    if seen.insert(mode) {
      modes.push(mode);
    }
  }

  Ok(modes)
}

fn log_directory() -> PathBuf {
  optional_var(DIRECTORY_VAR)
    .map(PathBuf::from)
    .unwrap_or_else(|| std::env::temp_dir().join("wpbridge_trace"))
}

pub struct Tracer {
  #[allow(unused)]
  worker_guards: Vec<WorkerGuard>,
}

impl Tracer {
  pub fn new(modes: &[TracerMode]) -> anyhow::Result<Self> {
    let mut worker_guards = vec![];

    let file_layer = if modes.contains(&TracerMode::File) {
      let file_appender = tracing_appender::rolling::Builder::new()
        .rotation(tracing_appender::rolling::Rotation::HOURLY)
        .max_log_files(4)
        .filename_prefix("wpbridge-tracing")
        .build(log_directory())
        .map_err(|err| anyhow!(err))?;
      let (non_blocking, worker_guard) = tracing_appender::non_blocking(file_appender);
      worker_guards.push(worker_guard);

      Some(
        tracing_subscriber::fmt::layer()
          .with_writer(non_blocking)
          .with_ansi(false)
          .with_span_events(FmtSpan::CLOSE)
          .with_filter(EnvFilter::from_default_env()),
      )
    } else {
      None
    };

    let stdout_layer = if modes.contains(&TracerMode::Stdout) {
      let (non_blocking, worker_guard) = tracing_appender::non_blocking(std::io::stdout());
      worker_guards.push(worker_guard);

      Some(
        tracing_subscriber::fmt::layer()
          .with_writer(non_blocking)
          .with_span_events(FmtSpan::CLOSE)
          .with_filter(EnvFilter::from_default_env()),
      )
    } else {
      None
    };

    let subscriber = Registry::default().with(file_layer).with(stdout_layer);
    tracing::subscriber::set_global_default(subscriber)?;

    Ok(Self { worker_guards })
  }
}
