//! Core processing for the hand monitor.
//!
//! This module contains:
//! - Sample-rate filtering per sensor
//! - Interleaved window construction
//! - The single-slot window handoff between collector and consumer threads
//! - Window classification
//! - Aggregation of window labels into hand events

pub mod aggregator;
pub mod classifier;
pub mod filter;
pub mod handoff;
pub mod window;

// Re-export commonly used types
pub use aggregator::{
    GestureEventAggregator, HandEvent, HandEventType, Label, MAX_CONSECUTIVE_OTHER,
};
pub use classifier::{
    label_from_scores, Classifier, ClassifierError, EnergyThresholds, MotionEnergyClassifier,
};
pub use filter::{FilterDecision, SampleFilter};
pub use handoff::{Handoff, HandoffError};
pub use window::{Window, WindowBuffer, WindowStatus, CHANNELS};
