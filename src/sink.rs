//! Persistence of closed hand events.
//!
//! The consumer thread never writes events itself. Closed events are submitted
//! to a [`SinkWorker`], which owns a background thread and calls the
//! configured [`EventSink`] there, so a slow disk never delays the
//! classification of the next window.

use crate::core::HandEvent;
use crate::stats::SharedPipelineStats;
use crossbeam_channel::{unbounded, Sender};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use thiserror::Error;

/// Errors raised by event sinks.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("event sink is closed")]
    Closed,
}

/// Destination for closed hand events.
pub trait EventSink: Send + Sync {
    fn add_event(&self, event: &HandEvent) -> Result<(), SinkError>;
}

/// Appends events as JSON lines to a file.
#[derive(Debug)]
pub struct JsonlEventSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlEventSink {
    /// Open (or create) the events file, creating parent directories.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for JsonlEventSink {
    fn add_event(&self, event: &HandEvent) -> Result<(), SinkError> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');
        let mut file = self
            .file
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}

/// Read every event stored in a JSON-lines events file.
///
/// Lines that fail to parse are skipped with a warning.
pub fn load_events(path: &Path) -> Result<Vec<HandEvent>, SinkError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let reader = BufReader::new(File::open(path)?);
    let mut events = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<HandEvent>(&line) {
            Ok(event) => events.push(event),
            Err(e) => tracing::warn!(line = number + 1, "skipping malformed event: {e}"),
        }
    }
    Ok(events)
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<HandEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<HandEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for MemoryEventSink {
    fn add_event(&self, event: &HandEvent) -> Result<(), SinkError> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
        Ok(())
    }
}

/// Background writer that decouples event persistence from the consumer thread.
pub struct SinkWorker {
    sender: Option<Sender<HandEvent>>,
    thread_handle: Option<JoinHandle<()>>,
}

impl SinkWorker {
    /// Spawn the writer thread for `sink`.
    pub fn spawn(
        sink: Arc<dyn EventSink>,
        stats: Option<SharedPipelineStats>,
    ) -> Result<Self, SinkError> {
        let (sender, receiver) = unbounded::<HandEvent>();
        let handle = thread::Builder::new()
            .name("event-sink".to_string())
            .spawn(move || {
                for event in receiver {
                    match sink.add_event(&event) {
                        Ok(()) => {
                            tracing::info!(
                                event_type = %event.event_type,
                                samples = event.sample_count,
                                duration_ms = event.duration_ms(),
                                "hand event stored"
                            );
                            if let Some(stats) = &stats {
                                stats.record_event_persisted();
                            }
                        }
                        Err(e) => {
                            tracing::error!("failed to store hand event: {e}");
                            if let Some(stats) = &stats {
                                stats.record_sink_failure();
                            }
                        }
                    }
                }
            })?;

        Ok(Self {
            sender: Some(sender),
            thread_handle: Some(handle),
        })
    }

    /// Queue an event for persistence. Never blocks.
    pub fn submit(&self, event: HandEvent) -> Result<(), SinkError> {
        match &self.sender {
            Some(sender) => sender.send(event).map_err(|_| SinkError::Closed),
            None => Err(SinkError::Closed),
        }
    }

    /// Write out every queued event and stop the writer thread.
    pub fn shutdown(&mut self) {
        self.sender.take();
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SinkWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::HandEventType;
    use crate::stats::PipelineStats;
    use std::time::Duration;

    fn event(n: u32) -> HandEvent {
        HandEvent {
            event_type: HandEventType::Washing,
            sample_count: n,
            start_time_ms: 1_000 * i64::from(n),
            end_time_ms: 1_000 * i64::from(n) + 500,
        }
    }

    struct SlowSink {
        inner: MemoryEventSink,
    }

    impl EventSink for SlowSink {
        fn add_event(&self, event: &HandEvent) -> Result<(), SinkError> {
            thread::sleep(Duration::from_millis(50));
            self.inner.add_event(event)
        }
    }

    struct FailingSink;

    impl EventSink for FailingSink {
        fn add_event(&self, _event: &HandEvent) -> Result<(), SinkError> {
            Err(SinkError::Closed)
        }
    }

    #[test]
    fn test_jsonl_sink_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events").join("hand_events.jsonl");
        let sink = JsonlEventSink::open(&path).unwrap();
        sink.add_event(&event(1)).unwrap();
        sink.add_event(&event(2)).unwrap();
        drop(sink);

        // Reopening appends
        let sink = JsonlEventSink::open(&path).unwrap();
        sink.add_event(&event(3)).unwrap();

        let events = load_events(&path).unwrap();
        assert_eq!(events, vec![event(1), event(2), event(3)]);
    }

    #[test]
    fn test_load_skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hand_events.jsonl");
        let good = serde_json::to_string(&event(4)).unwrap();
        std::fs::write(&path, format!("garbage\n\n{good}\n")).unwrap();
        assert_eq!(load_events(&path).unwrap(), vec![event(4)]);
        assert!(load_events(&dir.path().join("missing.jsonl")).unwrap().is_empty());
    }

    #[test]
    fn test_worker_submit_does_not_block() {
        let sink = Arc::new(SlowSink {
            inner: MemoryEventSink::new(),
        });
        let stats = Arc::new(PipelineStats::new());
        let mut worker = SinkWorker::spawn(sink.clone(), Some(stats.clone())).unwrap();

        let started = std::time::Instant::now();
        for n in 0..5 {
            worker.submit(event(n)).unwrap();
        }
        assert!(started.elapsed() < Duration::from_millis(50));

        worker.shutdown();
        assert_eq!(sink.inner.events(), (0..5).map(event).collect::<Vec<_>>());
        assert_eq!(stats.stats().events_persisted, 5);
        assert!(worker.submit(event(9)).is_err());
    }

    #[test]
    fn test_worker_counts_failures() {
        let stats = Arc::new(PipelineStats::new());
        let mut worker = SinkWorker::spawn(Arc::new(FailingSink), Some(stats.clone())).unwrap();
        worker.submit(event(1)).unwrap();
        worker.shutdown();
        assert_eq!(stats.stats().sink_failures, 1);
        assert_eq!(stats.stats().events_persisted, 0);
    }
}
