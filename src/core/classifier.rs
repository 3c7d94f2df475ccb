//! Window classification.
//!
//! The pipeline only depends on the [`Classifier`] contract: one label per
//! window, deterministic for a given window. Model runtimes plug in behind it.
//! [`MotionEnergyClassifier`] is a dependency-free reference implementation
//! based on motion energy, useful on hosts without a trained model.

use crate::collector::types::SensorType;
use crate::core::aggregator::Label;
use crate::core::window::Window;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use thiserror::Error;

/// Errors raised by classifiers. Fatal to the consumer thread.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("window has {actual} values, classifier expects {expected}")]
    InvalidInput { expected: usize, actual: usize },
    #[error("inference failed: {0}")]
    Inference(String),
}

/// Predicts a gesture label for a window.
pub trait Classifier: Send {
    fn predict(&mut self, window: &Window) -> Result<Label, ClassifierError>;
}

impl<F> Classifier for F
where
    F: FnMut(&Window) -> Result<Label, ClassifierError> + Send,
{
    fn predict(&mut self, window: &Window) -> Result<Label, ClassifierError> {
        self(window)
    }
}

/// Map model output scores to a label by arg-max.
///
/// Index 1 is washing, index 2 is rubbing, anything else is other. The first
/// maximum wins on ties.
pub fn label_from_scores(scores: &[f32]) -> Label {
    let mut best_index = 0;
    let mut best = match scores.first() {
        Some(v) => *v,
        None => return Label::Other,
    };
    for (i, &score) in scores.iter().enumerate().skip(1) {
        if score > best {
            best = score;
            best_index = i;
        }
    }
    match best_index {
        1 => Label::Washing,
        2 => Label::Rubbing,
        _ => Label::Other,
    }
}

/// Thresholds for [`MotionEnergyClassifier`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnergyThresholds {
    /// Mean per-axis gyroscope std-dev (rad/s) above which motion is washing
    pub washing_gyro_std: f64,
    /// Mean per-axis gyroscope std-dev (rad/s) above which motion is rubbing
    pub rubbing_gyro_std: f64,
    /// Minimum mean per-axis accelerometer std-dev (m/s²) for any gesture
    pub min_acc_std: f64,
}

impl Default for EnergyThresholds {
    fn default() -> Self {
        Self {
            washing_gyro_std: 1.1,
            rubbing_gyro_std: 0.3,
            min_acc_std: 0.2,
        }
    }
}

/// Classifies windows by the spread of their motion channels.
#[derive(Debug, Clone, Default)]
pub struct MotionEnergyClassifier {
    thresholds: EnergyThresholds,
    expected_len: Option<usize>,
}

impl MotionEnergyClassifier {
    pub fn new(thresholds: EnergyThresholds) -> Self {
        Self {
            thresholds,
            expected_len: None,
        }
    }

    /// Reject windows whose length differs from `window_size * 6`.
    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.expected_len = Some(window_size * crate::core::window::CHANNELS);
        self
    }

    /// Mean of the per-axis standard deviations of one sensor.
    pub fn energy(window: &Window, sensor: SensorType) -> f64 {
        let mut axes: [Vec<f64>; 3] = [Vec::new(), Vec::new(), Vec::new()];
        for values in window.channel_values(sensor) {
            for (axis, v) in axes.iter_mut().zip(values) {
                axis.push(f64::from(v));
            }
        }
        if axes[0].len() < 2 {
            return 0.0;
        }
        let stds: Vec<f64> = axes.iter().map(|axis| axis.iter().std_dev()).collect();
        stds.iter().mean()
    }
}

impl Classifier for MotionEnergyClassifier {
    fn predict(&mut self, window: &Window) -> Result<Label, ClassifierError> {
        if let Some(expected) = self.expected_len {
            if window.len() != expected {
                return Err(ClassifierError::InvalidInput {
                    expected,
                    actual: window.len(),
                });
            }
        }

        let acc = Self::energy(window, SensorType::Accelerometer);
        let gyro = Self::energy(window, SensorType::Gyroscope);
        let label = if acc < self.thresholds.min_acc_std {
            Label::Other
        } else if gyro >= self.thresholds.washing_gyro_std {
            Label::Washing
        } else if gyro >= self.thresholds.rubbing_gyro_std {
            Label::Rubbing
        } else {
            Label::Other
        };
        tracing::trace!(acc_energy = acc, gyro_energy = gyro, %label, "window classified");
        Ok(label)
    }
}
