//! Sample-rate normalization.
//!
//! Platform sensor subsystems treat the requested sampling period as a hint
//! and frequently deliver faster. A [`SampleFilter`] drops samples that arrive
//! too soon after the last accepted one, so that each sensor contributes
//! roughly one sample per nominal period. One filter is kept per sensor.

use crate::config::SamplingConfig;

/// Outcome of presenting a timestamp to a [`SampleFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    /// First sample seen; recorded as the baseline and rejected
    Baseline,
    Accepted,
    /// Accepted, but later than the period plus tolerance
    AcceptedLate { elapsed_ns: i64 },
    /// Rejected: arrived before the period minus tolerance
    TooSoon { elapsed_ns: i64 },
    /// Rejected: timestamp did not move forward
    ClockAnomaly { elapsed_ns: i64 },
}

impl FilterDecision {
    pub fn is_accepted(self) -> bool {
        matches!(
            self,
            FilterDecision::Accepted | FilterDecision::AcceptedLate { .. }
        )
    }
}

/// Per-sensor sample-rate filter.
#[derive(Debug, Clone)]
pub struct SampleFilter {
    sampling_period_ns: i64,
    tolerance_ns: i64,
    last_accepted_ns: Option<i64>,
    label: &'static str,
}

impl SampleFilter {
    pub fn new(config: &SamplingConfig) -> Self {
        Self {
            sampling_period_ns: config.sampling_period_ns(),
            tolerance_ns: config.tolerance_ns,
            last_accepted_ns: None,
            label: "sensor",
        }
    }

    /// Name used in diagnostics, e.g. the sensor this filter belongs to.
    pub fn with_label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    /// Accept or reject a sample timestamp.
    pub fn new_sample(&mut self, timestamp_ns: i64) -> bool {
        self.check(timestamp_ns).is_accepted()
    }

    /// Accept or reject a sample timestamp, reporting why.
    pub fn check(&mut self, timestamp_ns: i64) -> FilterDecision {
        let Some(last) = self.last_accepted_ns else {
            self.last_accepted_ns = Some(timestamp_ns);
            return FilterDecision::Baseline;
        };

        let elapsed_ns = timestamp_ns.saturating_sub(last);
        if elapsed_ns <= 0 {
            tracing::error!(
                sensor = self.label,
                elapsed_ns,
                "sample timestamp did not advance, discarding"
            );
            return FilterDecision::ClockAnomaly { elapsed_ns };
        }

        if elapsed_ns < self.sampling_period_ns - self.tolerance_ns {
            tracing::debug!(sensor = self.label, elapsed_ns, "discarded early sample");
            return FilterDecision::TooSoon { elapsed_ns };
        }

        self.last_accepted_ns = Some(timestamp_ns);
        if elapsed_ns > self.sampling_period_ns + self.tolerance_ns {
            tracing::warn!(sensor = self.label, elapsed_ns, "late sample");
            FilterDecision::AcceptedLate { elapsed_ns }
        } else {
            FilterDecision::Accepted
        }
    }

    /// Timestamp of the last accepted (or baseline) sample.
    pub fn last_accepted_ns(&self) -> Option<i64> {
        self.last_accepted_ns
    }

    /// Forget the baseline.
    pub fn reset(&mut self) {
        self.last_accepted_ns = None;
    }
}
