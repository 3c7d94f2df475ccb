//! Sensor collection for the hand monitor.
//!
//! This module adapts platform sensor delivery to the pipeline. Every source
//! runs its own collector thread and forwards timestamped accelerometer and
//! gyroscope samples through a callback.

pub mod channel;
pub mod source;
pub mod synthetic;
pub mod types;

// Re-export commonly used types
pub use channel::{ChannelSource, SampleSender};
pub use source::{require_sensors, SampleCallback, SensorSource, SourceError};
pub use synthetic::{parse_script, Motion, MotionPhase, SyntheticConfig, SyntheticSource};
pub use types::{Sample, SensorType};
