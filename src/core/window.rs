//! Fixed-size interleaved motion windows.
//!
//! A window holds `size` slots of six channels each,
//! `[accX, accY, accZ, gyroX, gyroY, gyroZ]`, laid out row-major. The
//! [`WindowBuffer`] fills one window in place from two independently arriving
//! sample streams and reports when it is complete.

use crate::collector::types::{Sample, SensorType};
use serde::{Deserialize, Serialize};

/// Number of channels in a window slot.
pub const CHANNELS: usize = 6;

/// A flat, channel-interleaved window of motion data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Window {
    data: Vec<f32>,
}

impl Window {
    /// Create a zeroed window of `size` slots.
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0.0; size * CHANNELS],
        }
    }

    /// Wrap existing data. Returns `None` unless the length is a whole number of slots.
    pub fn from_vec(data: Vec<f32>) -> Option<Self> {
        if data.len() % CHANNELS == 0 {
            Some(Self { data })
        } else {
            None
        }
    }

    /// Number of slots.
    pub fn size(&self) -> usize {
        self.data.len() / CHANNELS
    }

    /// Number of floats (`size * 6`).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// The six channels of slot `index`.
    pub fn slot(&self, index: usize) -> [f32; CHANNELS] {
        let start = index * CHANNELS;
        let mut out = [0.0; CHANNELS];
        out.copy_from_slice(&self.data[start..start + CHANNELS]);
        out
    }

    /// Iterate over all slots in order.
    pub fn slots(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(CHANNELS)
    }

    /// Values of one sensor's three channels across all slots.
    pub fn channel_values(&self, sensor: SensorType) -> impl Iterator<Item = [f32; 3]> + '_ {
        let offset = sensor.channel_offset();
        self.slots()
            .map(move |slot| [slot[offset], slot[offset + 1], slot[offset + 2]])
    }

    /// Reset every value to zero.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }
}

/// Result of appending a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowStatus {
    Full,
    NotFull,
}

/// Accumulates accelerometer and gyroscope samples into one reusable window.
///
/// Each sensor has its own cursor. The window is complete as soon as either
/// cursor reaches the end, so a lagging sensor contributes whatever it wrote so
/// far and its remaining slots keep their previous values.
#[derive(Debug)]
pub struct WindowBuffer {
    window: Window,
    acc_cursor: usize,
    gyro_cursor: usize,
}

impl WindowBuffer {
    /// Create a buffer for windows of `window_size` slots.
    pub fn new(window_size: usize) -> Self {
        Self {
            window: Window::new(window_size),
            acc_cursor: 0,
            gyro_cursor: 0,
        }
    }

    /// Write a sample into the current slot of its sensor.
    pub fn append_sample(&mut self, sample: &Sample) -> WindowStatus {
        let capacity = self.window.len();
        if capacity == 0 {
            return WindowStatus::Full;
        }

        let cursor = match sample.sensor_type {
            SensorType::Accelerometer => &mut self.acc_cursor,
            SensorType::Gyroscope => &mut self.gyro_cursor,
        };
        let start = *cursor + sample.sensor_type.channel_offset();
        self.window.data[start..start + 3].copy_from_slice(&sample.values());
        *cursor += CHANNELS;

        if self.acc_cursor >= capacity || self.gyro_cursor >= capacity {
            self.acc_cursor = 0;
            self.gyro_cursor = 0;
            WindowStatus::Full
        } else {
            WindowStatus::NotFull
        }
    }

    /// The live window. Copy it before handing it to another thread.
    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Number of slots written so far for `sensor` in the current window.
    pub fn filled(&self, sensor: SensorType) -> usize {
        match sensor {
            SensorType::Accelerometer => self.acc_cursor / CHANNELS,
            SensorType::Gyroscope => self.gyro_cursor / CHANNELS,
        }
    }

    /// Discard the partial window and rewind both cursors.
    pub fn clear(&mut self) {
        self.window.clear();
        self.acc_cursor = 0;
        self.gyro_cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZE: usize = 100;

    fn acc(i: usize) -> Sample {
        Sample::accelerometer([i as f32, i as f32 + 0.25, i as f32 + 0.5], i as i64)
    }

    fn gyro(i: usize) -> Sample {
        Sample::gyroscope([-(i as f32), -0.5, 0.75], i as i64)
    }

    #[test]
    fn test_window_geometry() {
        let window = Window::new(128);
        assert_eq!(window.size(), 128);
        assert_eq!(window.len(), 128 * CHANNELS);
        assert!(window.as_slice().iter().all(|v| *v == 0.0));
        assert!(Window::from_vec(vec![0.0; 7]).is_none());
        assert_eq!(Window::from_vec(vec![0.0; 12]).map(|w| w.size()), Some(2));
    }

    #[test]
    fn test_single_accelerometer_sample() {
        let mut buffer = WindowBuffer::new(SIZE);
        assert_eq!(buffer.append_sample(&acc(1)), WindowStatus::NotFull);
        let window = buffer.window();
        assert_eq!(&window.as_slice()[0..3], &[1.0, 1.25, 1.5]);
        assert!(window.as_slice()[3..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_single_gyroscope_sample() {
        let mut buffer = WindowBuffer::new(SIZE);
        assert_eq!(buffer.append_sample(&gyro(2)), WindowStatus::NotFull);
        let window = buffer.window();
        assert!(window.as_slice()[0..3].iter().all(|v| *v == 0.0));
        assert_eq!(&window.as_slice()[3..6], &[-2.0, -0.5, 0.75]);
        assert!(window.as_slice()[6..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_accelerometer_alone_completes_window() {
        // Either cursor reaching the end completes the window; the gyroscope
        // channels of a window filled only by the accelerometer stay zero.
        let mut buffer = WindowBuffer::new(SIZE);
        for i in 0..SIZE - 1 {
            assert_eq!(buffer.append_sample(&acc(i)), WindowStatus::NotFull);
        }
        assert_eq!(buffer.append_sample(&acc(SIZE - 1)), WindowStatus::Full);

        let window = buffer.window();
        for i in 0..SIZE {
            let slot = window.slot(i);
            assert_eq!(&slot[0..3], &acc(i).values());
            assert_eq!(&slot[3..6], &[0.0, 0.0, 0.0]);
        }
    }

    #[test]
    fn test_interleaved_fill() {
        // The accelerometer always arrives first, so it completes the window
        // before the last gyroscope sample lands.
        let mut buffer = WindowBuffer::new(SIZE);
        let mut status = WindowStatus::NotFull;
        for i in 0..SIZE {
            status = buffer.append_sample(&acc(i));
            if status == WindowStatus::Full {
                break;
            }
            buffer.append_sample(&gyro(i));
        }
        assert_eq!(status, WindowStatus::Full);
        let window = buffer.window();
        for i in 0..SIZE - 1 {
            let slot = window.slot(i);
            assert_eq!(&slot[0..3], &acc(i).values());
            assert_eq!(&slot[3..6], &gyro(i).values());
        }
        // The last gyroscope slot never arrived
        assert_eq!(&window.slot(SIZE - 1)[3..6], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_lagging_channel_keeps_previous_values() {
        let mut buffer = WindowBuffer::new(2);
        buffer.append_sample(&gyro(5));
        buffer.append_sample(&gyro(6));
        // Second gyroscope sample completes the first window
        assert_eq!(buffer.filled(SensorType::Gyroscope), 0);

        // Next window: only one accelerometer sample before the gyro completes again
        buffer.append_sample(&acc(9));
        buffer.append_sample(&gyro(7));
        assert_eq!(buffer.append_sample(&gyro(8)), WindowStatus::Full);
        let window = buffer.window();
        assert_eq!(&window.slot(0)[0..3], &acc(9).values());
        // Slot 1 accelerometer channels were never written in either window
        assert_eq!(&window.slot(1)[0..3], &[0.0, 0.0, 0.0]);
        assert_eq!(&window.slot(1)[3..6], &gyro(8).values());
    }

    #[test]
    fn test_cursor_wraps_after_full() {
        let mut buffer = WindowBuffer::new(3);
        for i in 0..3 {
            buffer.append_sample(&acc(i));
        }
        assert_eq!(buffer.filled(SensorType::Accelerometer), 0);

        assert_eq!(buffer.append_sample(&acc(42)), WindowStatus::NotFull);
        assert_eq!(&buffer.window().slot(0)[0..3], &acc(42).values());
        assert_eq!(&buffer.window().slot(1)[0..3], &acc(1).values());
    }

    #[test]
    fn test_clear() {
        let mut buffer = WindowBuffer::new(4);
        buffer.append_sample(&acc(3));
        buffer.append_sample(&gyro(3));
        buffer.clear();
        assert_eq!(buffer.filled(SensorType::Accelerometer), 0);
        assert_eq!(buffer.filled(SensorType::Gyroscope), 0);
        assert!(buffer.window().as_slice().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_channel_values() {
        let mut buffer = WindowBuffer::new(2);
        buffer.append_sample(&gyro(1));
        buffer.append_sample(&gyro(2));
        let values: Vec<[f32; 3]> = buffer.window().channel_values(SensorType::Gyroscope).collect();
        assert_eq!(values, vec![gyro(1).values(), gyro(2).values()]);
    }
}
