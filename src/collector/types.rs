//! Motion sample types delivered by sensor sources.
//!
//! A sample carries the three axis values of one sensor reading together with
//! the nanosecond timestamp assigned by the sensor subsystem.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The two motion sensors the pipeline consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorType {
    Accelerometer,
    Gyroscope,
}

impl SensorType {
    /// Both sensors, in window channel order.
    pub const ALL: [SensorType; 2] = [SensorType::Accelerometer, SensorType::Gyroscope];

    /// Lowercase name used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            SensorType::Accelerometer => "accelerometer",
            SensorType::Gyroscope => "gyroscope",
        }
    }

    /// Offset of this sensor's three channels inside a window slot.
    pub fn channel_offset(self) -> usize {
        match self {
            SensorType::Accelerometer => 0,
            SensorType::Gyroscope => 3,
        }
    }

    /// Dense index, usable for per-sensor arrays.
    pub fn index(self) -> usize {
        match self {
            SensorType::Accelerometer => 0,
            SensorType::Gyroscope => 1,
        }
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single 3-axis reading from one sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Timestamp assigned by the sensor subsystem, in nanoseconds
    pub timestamp_ns: i64,
    pub sensor_type: SensorType,
}

impl Sample {
    pub fn new(sensor_type: SensorType, values: [f32; 3], timestamp_ns: i64) -> Self {
        Self {
            x: values[0],
            y: values[1],
            z: values[2],
            timestamp_ns,
            sensor_type,
        }
    }

    /// Convenience constructor for accelerometer readings.
    pub fn accelerometer(values: [f32; 3], timestamp_ns: i64) -> Self {
        Self::new(SensorType::Accelerometer, values, timestamp_ns)
    }

    /// Convenience constructor for gyroscope readings.
    pub fn gyroscope(values: [f32; 3], timestamp_ns: i64) -> Self {
        Self::new(SensorType::Gyroscope, values, timestamp_ns)
    }

    pub fn values(&self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_constructors() {
        let acc = Sample::accelerometer([1.0, 2.0, 3.0], 42);
        assert_eq!(acc.sensor_type, SensorType::Accelerometer);
        assert_eq!(acc.values(), [1.0, 2.0, 3.0]);
        assert_eq!(acc.timestamp_ns, 42);

        let gyro = Sample::gyroscope([4.0, 5.0, 6.0], 7);
        assert_eq!(gyro.sensor_type, SensorType::Gyroscope);
    }

    #[test]
    fn test_channel_offsets() {
        assert_eq!(SensorType::Accelerometer.channel_offset(), 0);
        assert_eq!(SensorType::Gyroscope.channel_offset(), 3);
    }

    #[test]
    fn test_sensor_names() {
        assert_eq!(SensorType::Accelerometer.to_string(), "accelerometer");
        assert_eq!(SensorType::Gyroscope.name(), "gyroscope");
    }
}
