//! The sensor source contract.
//!
//! A source owns a dedicated worker thread (the collector context) and invokes
//! the pipeline callback once per sensor reading, in arrival order.

use crate::collector::types::{Sample, SensorType};
use std::sync::Arc;
use thiserror::Error;

/// Callback invoked by a source for every delivered sample.
///
/// The callback may block (window handoff backpressure), which stalls the
/// source's worker thread until the consumer catches up.
pub type SampleCallback = Arc<dyn Fn(Sample) + Send + Sync>;

/// Errors raised by sensor sources.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("{0} sensor is not supported on this device")]
    SensorUnsupported(SensorType),
    #[error("Sensor source is already running")]
    AlreadyRunning,
    #[error("Failed to spawn sensor worker: {0}")]
    Spawn(String),
}

/// Something that delivers timestamped accelerometer and gyroscope samples.
pub trait SensorSource: Send {
    /// Register for both sensors and start delivering samples to `callback`.
    fn start(&mut self, callback: SampleCallback) -> Result<(), SourceError>;

    /// Unregister and release the worker thread. Safe to call repeatedly.
    fn stop(&mut self);

    fn is_running(&self) -> bool;
}

/// Fail with [`SourceError::SensorUnsupported`] unless both sensors are available.
pub fn require_sensors(available: &[SensorType]) -> Result<(), SourceError> {
    for sensor in SensorType::ALL {
        if !available.contains(&sensor) {
            return Err(SourceError::SensorUnsupported(sensor));
        }
    }
    Ok(())
}
