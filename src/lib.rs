//! Hand Monitor Agent - hand-hygiene detection from wrist motion.
//!
//! This library turns accelerometer and gyroscope readings from a wrist-worn
//! device into hand-washing and hand-rubbing events.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        Hand Monitor Agent                        │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐             │
//! │  │  Collector  │──▶│   Filter    │──▶│   Window    │  collector  │
//! │  │  (source)   │   │ (per sensor)│   │   Buffer    │  thread     │
//! │  └─────────────┘   └─────────────┘   └──────┬──────┘             │
//! │                                             │ Handoff (1 slot)   │
//! │                                      ┌──────▼──────┐             │
//! │                                      │ Classifier  │  consumer   │
//! │                                      └──────┬──────┘  thread     │
//! │                                      ┌──────▼──────┐             │
//! │                                      │ Aggregator  │             │
//! │                                      └──────┬──────┘             │
//! │  ┌─────────────┐                     ┌──────▼──────┐             │
//! │  │    Stats    │                     │ Event Sink  │  sink       │
//! │  └─────────────┘                     └─────────────┘  thread     │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use handmonitor_agent::{
//!     collector::{SyntheticConfig, SyntheticSource},
//!     config::Config,
//!     core::MotionEnergyClassifier,
//!     pipeline::{GestureDetector, Pipeline},
//!     sink::MemoryEventSink,
//! };
//!
//! let config = Config::default();
//! let source = SyntheticSource::new(SyntheticConfig::default()).unwrap();
//! let mut pipeline = Pipeline::new(&config, source).unwrap();
//!
//! let sink = Arc::new(MemoryEventSink::new());
//! let detector = GestureDetector::new(
//!     MotionEnergyClassifier::default(),
//!     sink.clone(),
//!     &config,
//!     pipeline.stats(),
//! )
//! .unwrap();
//!
//! pipeline.start(detector).unwrap();
//! std::thread::sleep(std::time::Duration::from_secs(60));
//! pipeline.stop().unwrap();
//! println!("{} events", sink.len());
//! ```

pub mod collector;
pub mod config;
pub mod core;
pub mod pipeline;
pub mod recorder;
pub mod sink;
pub mod stats;

// Re-export main types for convenience
pub use collector::{ChannelSource, Sample, SensorSource, SensorType, SyntheticSource};
pub use config::{Config, SamplingConfig};
pub use core::{Classifier, GestureEventAggregator, HandEvent, HandEventType, Label, Window};
pub use pipeline::{CaptureRecorder, GestureDetector, Pipeline, PipelineError, WindowHandler};
pub use sink::{EventSink, JsonlEventSink, MemoryEventSink};
pub use stats::{PipelineStats, SharedPipelineStats};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
