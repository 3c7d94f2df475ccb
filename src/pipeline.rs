//! Wiring of sensor source, filters, window handoff and window handlers.
//!
//! ```text
//!  SensorSource ──▶ SampleFilter (per sensor) ──▶ Handoff ──▶ consumer thread
//!  (collector thread)                                           │
//!                                                               ▼
//!                                              WindowHandler::on_window
//!                                      (GestureDetector or CaptureRecorder)
//! ```
//!
//! The collector context runs inside the source; the consumer context is a
//! thread owned by the [`Pipeline`]. The two meet only at the handoff.

use crate::collector::{Sample, SampleCallback, SensorSource, SensorType, SourceError};
use crate::config::{Config, ConfigError, SamplingConfig};
use crate::core::{
    Classifier, ClassifierError, GestureEventAggregator, Handoff, HandoffError, Label,
    SampleFilter, Window, WindowStatus,
};
use crate::recorder::{Action, Recording, RecorderError, RecordingSession};
use crate::sink::{EventSink, SinkError, SinkWorker};
use crate::stats::{create_shared_stats, SharedPipelineStats};
use chrono::Utc;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use thiserror::Error;

/// Errors raised by the pipeline and its handlers.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),
    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),
    #[error("Recorder error: {0}")]
    Recorder(#[from] RecorderError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Failed to spawn consumer thread: {0}")]
    Spawn(String),
    #[error("consumer thread panicked")]
    ConsumerPanicked,
}

/// Receives every completed window on the consumer thread.
pub trait WindowHandler: Send {
    /// Process one window. An error ends the consumer thread.
    fn on_window(&mut self, window: &Window) -> Result<(), PipelineError>;

    /// Called once when the consumer thread exits.
    fn finish(&mut self, _now_ms: i64) -> Result<(), PipelineError> {
        Ok(())
    }
}

/// Classifies windows and turns the labels into persisted hand events.
pub struct GestureDetector<C: Classifier> {
    classifier: C,
    aggregator: GestureEventAggregator,
    sink: SinkWorker,
    stats: SharedPipelineStats,
    flush_on_stop: bool,
}

impl<C: Classifier> GestureDetector<C> {
    pub fn new(
        classifier: C,
        sink: Arc<dyn EventSink>,
        config: &Config,
        stats: SharedPipelineStats,
    ) -> Result<Self, PipelineError> {
        Ok(Self {
            classifier,
            aggregator: GestureEventAggregator::new(config.max_consecutive_other),
            sink: SinkWorker::spawn(sink, Some(stats.clone()))?,
            stats,
            flush_on_stop: config.flush_on_stop,
        })
    }

    /// Hand a window label to the aggregator, as if classified at `now_ms`.
    fn on_label(&mut self, label: Label, now_ms: i64) -> Result<(), PipelineError> {
        self.stats.record_label(label);
        if let Some(event) = self.aggregator.on_label(label, now_ms) {
            tracing::info!(
                event_type = %event.event_type,
                windows = event.sample_count,
                "hand event detected"
            );
            self.stats.record_event(event.event_type);
            self.sink.submit(event)?;
        }
        Ok(())
    }
}

impl<C: Classifier> WindowHandler for GestureDetector<C> {
    fn on_window(&mut self, window: &Window) -> Result<(), PipelineError> {
        let label = self.classifier.predict(window)?;
        tracing::debug!(%label, "window classified");
        self.on_label(label, Utc::now().timestamp_millis())
    }

    fn finish(&mut self, now_ms: i64) -> Result<(), PipelineError> {
        let result = if self.flush_on_stop {
            match self.aggregator.flush(now_ms) {
                Some(event) => {
                    self.stats.record_event(event.event_type);
                    self.sink.submit(event).map_err(PipelineError::from)
                }
                None => Ok(()),
            }
        } else {
            if let Some(open) = self.aggregator.open_event_type() {
                tracing::info!(event_type = %open, "discarding open hand event at shutdown");
            }
            Ok(())
        };
        self.sink.shutdown();
        result
    }
}

/// Writes every window to a capture file.
pub struct CaptureRecorder {
    session: Option<RecordingSession>,
    completed: Arc<Mutex<Option<Recording>>>,
}

impl CaptureRecorder {
    pub fn create(dir: &Path, action: Action) -> Result<Self, PipelineError> {
        Ok(Self {
            session: Some(RecordingSession::create(dir, action)?),
            completed: Arc::new(Mutex::new(None)),
        })
    }

    /// Slot receiving the saved recording once the pipeline stops.
    pub fn completed(&self) -> Arc<Mutex<Option<Recording>>> {
        self.completed.clone()
    }
}

impl WindowHandler for CaptureRecorder {
    fn on_window(&mut self, window: &Window) -> Result<(), PipelineError> {
        if let Some(session) = self.session.as_mut() {
            session.writer().write_window(window)?;
        }
        Ok(())
    }

    fn finish(&mut self, _now_ms: i64) -> Result<(), PipelineError> {
        if let Some(session) = self.session.take() {
            let recording = session.finish()?;
            *self
                .completed
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(recording);
        }
        Ok(())
    }
}

/// Sensor-to-handler pipeline.
pub struct Pipeline<S: SensorSource> {
    sampling: SamplingConfig,
    source: S,
    handoff: Arc<Handoff>,
    filters: Arc<[Mutex<SampleFilter>; 2]>,
    stats: SharedPipelineStats,
    consumer: Option<JoinHandle<Result<(), PipelineError>>>,
    consumer_done: Arc<AtomicBool>,
}

impl<S: SensorSource> Pipeline<S> {
    pub fn new(config: &Config, source: S) -> Result<Self, PipelineError> {
        config.validate()?;
        let sampling = config.sampling.clone();
        let filter = |sensor: SensorType| {
            Mutex::new(SampleFilter::new(&sampling).with_label(sensor.name()))
        };
        let filters = Arc::new([
            filter(SensorType::Accelerometer),
            filter(SensorType::Gyroscope),
        ]);

        Ok(Self {
            handoff: Arc::new(Handoff::new(sampling.window_size as usize)),
            sampling,
            source,
            filters,
            stats: create_shared_stats(),
            consumer: None,
            consumer_done: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Use `stats` instead of a private set of counters.
    pub fn with_stats(mut self, stats: SharedPipelineStats) -> Self {
        self.stats = stats;
        self
    }

    pub fn stats(&self) -> SharedPipelineStats {
        self.stats.clone()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// True while the consumer thread is alive.
    pub fn is_running(&self) -> bool {
        self.consumer.is_some() && !self.consumer_done.load(Ordering::SeqCst)
    }

    /// Start the consumer thread and then the sensor source.
    pub fn start<H: WindowHandler + 'static>(&mut self, handler: H) -> Result<(), PipelineError> {
        if self.consumer.is_some() {
            return Err(SourceError::AlreadyRunning.into());
        }

        self.handoff.reset();
        for filter in self.filters.iter() {
            lock(filter).reset();
        }
        self.consumer_done.store(false, Ordering::SeqCst);

        let consumer = self.spawn_consumer(handler)?;
        self.consumer = Some(consumer);

        let callback = self.sample_callback();
        if let Err(e) = self.source.start(callback) {
            tracing::error!("failed to start sensor source: {e}");
            self.handoff.cancel();
            if let Some(handle) = self.consumer.take() {
                let _ = handle.join();
            }
            return Err(e.into());
        }

        tracing::info!(
            period_ms = self.sampling.sampling_period_ms,
            window_size = self.sampling.window_size,
            "pipeline started"
        );
        Ok(())
    }

    /// Stop the source and the consumer, returning the consumer's outcome.
    ///
    /// Any window in flight is dropped. Stopping an idle pipeline is a no-op.
    pub fn stop(&mut self) -> Result<(), PipelineError> {
        let Some(consumer) = self.consumer.take() else {
            return Ok(());
        };

        // Cancel first so a collector blocked on the handoff can exit.
        self.handoff.cancel();
        self.source.stop();
        let result = consumer.join().map_err(|_| PipelineError::ConsumerPanicked)?;
        tracing::info!("pipeline stopped");
        result
    }

    fn sample_callback(&self) -> SampleCallback {
        let filters = self.filters.clone();
        let handoff = self.handoff.clone();
        let stats = self.stats.clone();

        Arc::new(move |sample: Sample| {
            let decision = lock(&filters[sample.sensor_type.index()]).check(sample.timestamp_ns);
            stats.record_filter(sample.sensor_type, decision);
            if !decision.is_accepted() {
                return;
            }
            match handoff.append(&sample) {
                Ok(WindowStatus::Full) => stats.record_window_produced(),
                Ok(WindowStatus::NotFull) => {}
                Err(HandoffError::Cancelled) => {
                    tracing::trace!("sample dropped, handoff cancelled");
                }
            }
        })
    }

    fn spawn_consumer<H: WindowHandler + 'static>(
        &self,
        mut handler: H,
    ) -> Result<JoinHandle<Result<(), PipelineError>>, PipelineError> {
        let handoff = self.handoff.clone();
        let stats = self.stats.clone();
        let done = self.consumer_done.clone();
        let window_size = self.sampling.window_size as usize;

        thread::Builder::new()
            .name("window-consumer".to_string())
            .spawn(move || {
                let mut window = Window::new(window_size);
                let result = loop {
                    match handoff.consume_into(&mut window) {
                        Ok(()) => {
                            stats.record_window_consumed();
                            if let Err(e) = handler.on_window(&window) {
                                tracing::error!("window handler failed, stopping consumer: {e}");
                                // Release a collector waiting on the next window.
                                handoff.cancel();
                                break Err(e);
                            }
                        }
                        Err(HandoffError::Cancelled) => break Ok(()),
                    }
                };
                let finished = handler.finish(Utc::now().timestamp_millis());
                if let Err(e) = &finished {
                    tracing::error!("window handler failed to finish: {e}");
                }
                done.store(true, Ordering::SeqCst);
                result.and(finished)
            })
            .map_err(|e| PipelineError::Spawn(e.to_string()))
    }
}

impl<S: SensorSource> Drop for Pipeline<S> {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::warn!("pipeline stopped with error: {e}");
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::ChannelSource;
    use crate::core::HandEventType;
    use crate::sink::MemoryEventSink;
    use crossbeam_channel::{unbounded, Receiver, Sender};
    use std::time::Duration;

    const PERIOD_NS: i64 = 20_000_000;

    fn test_config(window_size: u32) -> Config {
        let mut config = Config::default();
        config.sampling = SamplingConfig::new(20, window_size);
        config
    }

    struct Forwarding {
        windows: Sender<Window>,
    }

    impl WindowHandler for Forwarding {
        fn on_window(&mut self, window: &Window) -> Result<(), PipelineError> {
            let _ = self.windows.send(window.clone());
            Ok(())
        }
    }

    fn forwarding() -> (Forwarding, Receiver<Window>) {
        let (windows, receiver) = unbounded();
        (Forwarding { windows }, receiver)
    }

    fn channel_source() -> ChannelSource {
        ChannelSource::new(&SensorType::ALL).unwrap()
    }

    #[test]
    fn test_filtered_samples_fill_windows() {
        let source = channel_source();
        let sender = source.sender();
        let mut pipeline = Pipeline::new(&test_config(2), source).unwrap();
        let (handler, windows) = forwarding();
        pipeline.start(handler).unwrap();

        for i in 0..3 {
            let ts = i * PERIOD_NS;
            let v = i as f32;
            // The gyroscope lags one tick behind, so the accelerometer completes the window
            if i < 2 {
                assert!(sender.send(Sample::gyroscope([-v, -v, -v], ts)));
            }
            assert!(sender.send(Sample::accelerometer([v, v, v], ts)));
            // Too soon after the previous sample, dropped by the filter
            assert!(sender.send(Sample::accelerometer([99.0; 3], ts + 1_000)));
        }

        let window = windows.recv_timeout(Duration::from_secs(2)).unwrap();
        // The first sample of each sensor is the baseline; the gyroscope slot it
        // never reached keeps its initial value
        assert_eq!(window.slot(0), [1.0, 1.0, 1.0, -1.0, -1.0, -1.0]);
        assert_eq!(window.slot(1), [2.0, 2.0, 2.0, 0.0, 0.0, 0.0]);

        pipeline.stop().unwrap();
        let stats = pipeline.stats().stats();
        assert_eq!(stats.accelerometer_accepted, 2);
        assert_eq!(stats.accelerometer_rejected, 4);
        assert_eq!(stats.gyroscope_accepted, 1);
        assert_eq!(stats.windows_produced, 1);
        assert_eq!(stats.windows_consumed, 1);
    }

    #[test]
    fn test_start_twice_fails() {
        let mut pipeline = Pipeline::new(&test_config(4), channel_source()).unwrap();
        pipeline.start(forwarding().0).unwrap();
        assert!(matches!(
            pipeline.start(forwarding().0),
            Err(PipelineError::Source(SourceError::AlreadyRunning))
        ));
        assert!(pipeline.is_running());
        pipeline.stop().unwrap();
        assert!(!pipeline.is_running());
        // Stopping again is harmless
        pipeline.stop().unwrap();
    }

    #[test]
    fn test_restart_after_stop() {
        let source = channel_source();
        let sender = source.sender();
        let mut pipeline = Pipeline::new(&test_config(1), source).unwrap();

        for round in 0..2 {
            let (handler, windows) = forwarding();
            pipeline.start(handler).unwrap();
            for i in 0..2 {
                sender.send(Sample::accelerometer([round as f32; 3], i * PERIOD_NS));
            }
            let window = windows.recv_timeout(Duration::from_secs(2)).unwrap();
            assert_eq!(window.slot(0)[0], round as f32);
            pipeline.stop().unwrap();
        }
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = test_config(4);
        config.sampling.window_size = 0;
        assert!(matches!(
            Pipeline::new(&config, channel_source()),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_classifier_error_ends_consumer() {
        let source = channel_source();
        let sender = source.sender();
        let config = test_config(1);
        let mut pipeline = Pipeline::new(&config, source).unwrap();
        let classifier = |_: &Window| -> Result<Label, ClassifierError> {
            Err(ClassifierError::Inference("model missing".into()))
        };
        let detector = GestureDetector::new(
            classifier,
            Arc::new(MemoryEventSink::new()),
            &config,
            pipeline.stats(),
        )
        .unwrap();
        pipeline.start(detector).unwrap();

        for i in 0..10 {
            sender.send(Sample::accelerometer([0.0; 3], i * PERIOD_NS));
        }

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while pipeline.is_running() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(!pipeline.is_running());
        assert!(matches!(pipeline.stop(), Err(PipelineError::Classifier(_))));
    }

    #[test]
    fn test_detector_flushes_on_stop_when_configured() {
        let mut config = test_config(1);
        config.flush_on_stop = true;
        let sink = Arc::new(MemoryEventSink::new());
        let stats = create_shared_stats();
        let classifier = |_: &Window| -> Result<Label, ClassifierError> { Ok(Label::Washing) };
        let mut detector =
            GestureDetector::new(classifier, sink.clone(), &config, stats.clone()).unwrap();

        for i in 0..4 {
            detector.on_label(Label::Washing, i * 1_000).unwrap();
        }
        detector.finish(10_000).unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, HandEventType::Washing);
        assert_eq!(events[0].sample_count, 4);
        assert_eq!(events[0].end_time_ms, 10_000);
        assert_eq!(stats.stats().washing_events, 1);
    }

    #[test]
    fn test_detector_discards_open_event_by_default() {
        let config = test_config(1);
        let sink = Arc::new(MemoryEventSink::new());
        let classifier = |_: &Window| -> Result<Label, ClassifierError> { Ok(Label::Rubbing) };
        let mut detector =
            GestureDetector::new(classifier, sink.clone(), &config, create_shared_stats())
                .unwrap();

        detector.on_window(&Window::new(1)).unwrap();
        detector.finish(5_000).unwrap();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_capture_recorder_writes_windows() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = CaptureRecorder::create(dir.path(), Action::HandRub).unwrap();
        let completed = recorder.completed();

        recorder.on_window(&Window::new(2)).unwrap();
        recorder.on_window(&Window::new(2)).unwrap();
        recorder.finish(0).unwrap();

        let recording = completed.lock().unwrap().clone().unwrap();
        assert_eq!(recording.action, Action::HandRub);
        let content = std::fs::read_to_string(dir.path().join(&recording.file_name)).unwrap();
        assert_eq!(content.lines().count(), 4);
        assert!(content.lines().all(|line| line.starts_with("\"2\",")));
    }
}
