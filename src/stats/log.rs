//! Pipeline counters.

use crate::collector::types::SensorType;
use crate::core::aggregator::{HandEventType, Label};
use crate::core::filter::FilterDecision;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters for one sensor stream.
#[derive(Debug, Default)]
struct SensorCounters {
    accepted: AtomicU64,
    rejected: AtomicU64,
    late: AtomicU64,
    clock_anomalies: AtomicU64,
}

/// Statistics for the current session.
#[derive(Debug)]
pub struct PipelineStats {
    sensors: [SensorCounters; 2],
    windows_produced: AtomicU64,
    windows_consumed: AtomicU64,
    /// Window labels, indexed by [`Label::ordinal`]
    labels: [AtomicU64; 3],
    washing_events: AtomicU64,
    rubbing_events: AtomicU64,
    events_persisted: AtomicU64,
    sink_failures: AtomicU64,
    session_start: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self {
            sensors: Default::default(),
            windows_produced: AtomicU64::new(0),
            windows_consumed: AtomicU64::new(0),
            labels: Default::default(),
            washing_events: AtomicU64::new(0),
            rubbing_events: AtomicU64::new(0),
            events_persisted: AtomicU64::new(0),
            sink_failures: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create stats backed by a file, loading previous totals when present.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut stats = Self::new();
        stats.persist_path = Some(path);

        if let Err(e) = stats.load() {
            tracing::warn!("could not load previous statistics: {e}");
        }

        stats
    }

    /// Record the outcome of a filter check.
    pub fn record_filter(&self, sensor: SensorType, decision: FilterDecision) {
        let counters = &self.sensors[sensor.index()];
        match decision {
            FilterDecision::Baseline | FilterDecision::TooSoon { .. } => {
                counters.rejected.fetch_add(1, Ordering::Relaxed);
            }
            FilterDecision::ClockAnomaly { .. } => {
                counters.rejected.fetch_add(1, Ordering::Relaxed);
                counters.clock_anomalies.fetch_add(1, Ordering::Relaxed);
            }
            FilterDecision::Accepted => {
                counters.accepted.fetch_add(1, Ordering::Relaxed);
            }
            FilterDecision::AcceptedLate { .. } => {
                counters.accepted.fetch_add(1, Ordering::Relaxed);
                counters.late.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn record_window_produced(&self) {
        self.windows_produced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_window_consumed(&self) {
        self.windows_consumed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_label(&self, label: Label) {
        self.labels[label.ordinal()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event(&self, event_type: HandEventType) {
        match event_type {
            HandEventType::Washing => self.washing_events.fetch_add(1, Ordering::Relaxed),
            HandEventType::Rubbing => self.rubbing_events.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn record_event_persisted(&self) {
        self.events_persisted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sink_failure(&self) {
        self.sink_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> StatsSnapshot {
        let sensor = |s: SensorType| &self.sensors[s.index()];
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        let acc = sensor(SensorType::Accelerometer);
        let gyro = sensor(SensorType::Gyroscope);
        StatsSnapshot {
            accelerometer_accepted: load(&acc.accepted),
            accelerometer_rejected: load(&acc.rejected),
            gyroscope_accepted: load(&gyro.accepted),
            gyroscope_rejected: load(&gyro.rejected),
            late_samples: load(&acc.late) + load(&gyro.late),
            clock_anomalies: load(&acc.clock_anomalies) + load(&gyro.clock_anomalies),
            windows_produced: load(&self.windows_produced),
            windows_consumed: load(&self.windows_consumed),
            other_windows: load(&self.labels[Label::Other.ordinal()]),
            washing_windows: load(&self.labels[Label::Washing.ordinal()]),
            rubbing_windows: load(&self.labels[Label::Rubbing.ordinal()]),
            washing_events: load(&self.washing_events),
            rubbing_events: load(&self.rubbing_events),
            events_persisted: load(&self.events_persisted),
            sink_failures: load(&self.sink_failures),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics:\n\
             - Accelerometer samples: {} accepted, {} rejected\n\
             - Gyroscope samples: {} accepted, {} rejected\n\
             - Late samples: {}\n\
             - Clock anomalies: {}\n\
             - Windows: {} produced, {} classified\n\
             - Labels: {} other, {} washing, {} rubbing\n\
             - Events: {} washing, {} rubbing ({} stored, {} failed)\n\
             - Session duration: {} seconds",
            stats.accelerometer_accepted,
            stats.accelerometer_rejected,
            stats.gyroscope_accepted,
            stats.gyroscope_rejected,
            stats.late_samples,
            stats.clock_anomalies,
            stats.windows_produced,
            stats.windows_consumed,
            stats.other_windows,
            stats.washing_windows,
            stats.rubbing_windows,
            stats.washing_events,
            stats.rubbing_events,
            stats.events_persisted,
            stats.sink_failures,
            stats.session_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                windows_produced: stats.windows_produced,
                windows_consumed: stats.windows_consumed,
                washing_events: stats.washing_events,
                rubbing_events: stats.rubbing_events,
                events_persisted: stats.events_persisted,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.windows_produced
                    .store(persisted.windows_produced, Ordering::Relaxed);
                self.windows_consumed
                    .store(persisted.windows_consumed, Ordering::Relaxed);
                self.washing_events
                    .store(persisted.washing_events, Ordering::Relaxed);
                self.rubbing_events
                    .store(persisted.rubbing_events, Ordering::Relaxed);
                self.events_persisted
                    .store(persisted.events_persisted, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Reset all counters.
    pub fn reset(&self) {
        for counters in &self.sensors {
            counters.accepted.store(0, Ordering::Relaxed);
            counters.rejected.store(0, Ordering::Relaxed);
            counters.late.store(0, Ordering::Relaxed);
            counters.clock_anomalies.store(0, Ordering::Relaxed);
        }
        for counter in &self.labels {
            counter.store(0, Ordering::Relaxed);
        }
        self.windows_produced.store(0, Ordering::Relaxed);
        self.windows_consumed.store(0, Ordering::Relaxed);
        self.washing_events.store(0, Ordering::Relaxed);
        self.rubbing_events.store(0, Ordering::Relaxed);
        self.events_persisted.store(0, Ordering::Relaxed);
        self.sink_failures.store(0, Ordering::Relaxed);
    }
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of pipeline statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub accelerometer_accepted: u64,
    pub accelerometer_rejected: u64,
    pub gyroscope_accepted: u64,
    pub gyroscope_rejected: u64,
    pub late_samples: u64,
    pub clock_anomalies: u64,
    pub windows_produced: u64,
    pub windows_consumed: u64,
    pub other_windows: u64,
    pub washing_windows: u64,
    pub rubbing_windows: u64,
    pub washing_events: u64,
    pub rubbing_events: u64,
    pub events_persisted: u64,
    pub sink_failures: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Lifetime totals kept across sessions.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    windows_produced: u64,
    windows_consumed: u64,
    washing_events: u64,
    rubbing_events: u64,
    events_persisted: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared statistics.
pub type SharedPipelineStats = Arc<PipelineStats>;

pub fn create_shared_stats() -> SharedPipelineStats {
    Arc::new(PipelineStats::new())
}

pub fn create_shared_stats_with_persistence(path: PathBuf) -> SharedPipelineStats {
    Arc::new(PipelineStats::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_counting() {
        let stats = PipelineStats::new();
        stats.record_filter(SensorType::Accelerometer, FilterDecision::Baseline);
        stats.record_filter(SensorType::Accelerometer, FilterDecision::Accepted);
        stats.record_filter(
            SensorType::Accelerometer,
            FilterDecision::AcceptedLate { elapsed_ns: 40_000_000 },
        );
        stats.record_filter(
            SensorType::Gyroscope,
            FilterDecision::ClockAnomaly { elapsed_ns: -5 },
        );
        stats.record_filter(
            SensorType::Gyroscope,
            FilterDecision::TooSoon { elapsed_ns: 1_000 },
        );

        let snapshot = stats.stats();
        assert_eq!(snapshot.accelerometer_accepted, 2);
        assert_eq!(snapshot.accelerometer_rejected, 1);
        assert_eq!(snapshot.gyroscope_accepted, 0);
        assert_eq!(snapshot.gyroscope_rejected, 2);
        assert_eq!(snapshot.late_samples, 1);
        assert_eq!(snapshot.clock_anomalies, 1);
    }

    #[test]
    fn test_window_and_event_counting() {
        let stats = PipelineStats::new();
        stats.record_window_produced();
        stats.record_window_consumed();
        stats.record_window_consumed();
        stats.record_window_consumed();
        stats.record_label(Label::Washing);
        stats.record_label(Label::Other);
        stats.record_event(HandEventType::Rubbing);

        let snapshot = stats.stats();
        assert_eq!(snapshot.windows_produced, 1);
        assert_eq!(snapshot.windows_consumed, 3);
        assert_eq!(snapshot.washing_windows, 1);
        assert_eq!(snapshot.other_windows, 1);
        assert_eq!(snapshot.rubbing_events, 1);
    }

    #[test]
    fn test_reset() {
        let stats = PipelineStats::new();
        stats.record_window_produced();
        stats.record_sink_failure();
        stats.record_filter(SensorType::Gyroscope, FilterDecision::Accepted);
        stats.reset();

        let snapshot = stats.stats();
        assert_eq!(snapshot.windows_produced, 0);
        assert_eq!(snapshot.sink_failures, 0);
        assert_eq!(snapshot.gyroscope_accepted, 0);
    }

    #[test]
    fn test_persistence_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");

        let stats = PipelineStats::with_persistence(path.clone());
        stats.record_window_produced();
        stats.record_event(HandEventType::Washing);
        stats.record_event_persisted();
        stats.save().unwrap();

        let reloaded = PipelineStats::with_persistence(path);
        let snapshot = reloaded.stats();
        assert_eq!(snapshot.windows_produced, 1);
        assert_eq!(snapshot.washing_events, 1);
        assert_eq!(snapshot.events_persisted, 1);
        // Per-session sensor counters start fresh
        assert_eq!(snapshot.accelerometer_accepted, 0);
    }

    #[test]
    fn test_summary_format() {
        let summary = PipelineStats::new().summary();
        assert!(summary.contains("Accelerometer samples"));
        assert!(summary.contains("Windows"));
        assert!(summary.contains("Events"));
    }
}
