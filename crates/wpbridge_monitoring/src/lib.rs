//! Configures where `tracing` output goes.
//!
//! Nothing is recorded until [`initialize_monitoring`] runs, and it only runs once per process.
use std::sync::Mutex;

use anyhow::anyhow;
use wpbridge_core::from_env::FromEnvError;

pub use tracer::TracerMode;

mod tracer;

pub static MONITORING_GUARD: Mutex<Option<MonitoringGuard>> = Mutex::new(None);

#[derive(Default)]
pub struct MonitoringGuard {
  #[allow(unused)]
  tracer: Option<tracer::Tracer>,
}

#[derive(Debug, Default)]
pub struct MonitoringOptions {
  pub tracing_options: Vec<TracerMode>,
}

impl MonitoringOptions {
  pub fn from_env() -> Result<Self, FromEnvError> {
    Ok(Self {
      tracing_options: TracerMode::from_env()?,
    })
  }
}

pub fn initialize_monitoring(options: MonitoringOptions) -> anyhow::Result<()> {
  let mut global = MONITORING_GUARD
    .lock()
    .map_err(|_| anyhow!("Monitoring guard lock is poisoned"))?;

  if global.is_some() {
    tracing::warn!("Monitoring is getting set-up twice, this will no-op");
    return Ok(());
  }

  let tracer = if options.tracing_options.is_empty() {
    None
  } else {
    Some(tracer::Tracer::new(&options.tracing_options)?)
  };

  *global = Some(MonitoringGuard { tracer });

  Ok(())
}

pub fn initialize_from_env() -> anyhow::Result<()> {
  initialize_monitoring(MonitoringOptions::from_env()?)
}

/// Drops the guard, flushing buffered log lines
pub fn close_monitoring() {
  if let Ok(mut global) = MONITORING_GUARD.lock() {
    if let Some(guard) = global.as_mut() {
      guard.tracer.take();
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn test_initialize_monitoring_multiple_times() {
    initialize_monitoring(MonitoringOptions {
      tracing_options: vec![TracerMode::Stdout],
    })
    .unwrap();

    close_monitoring();

    initialize_monitoring(MonitoringOptions {
      tracing_options: vec![TracerMode::Stdout],
    })
    .unwrap();

    close_monitoring();
  }
}
