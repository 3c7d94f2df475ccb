//! Aggregation of per-window gesture labels into hand-hygiene events.
//!
//! Every completed window yields one [`Label`]. A washing or rubbing label
//! opens an event; short runs of `Other` inside an event are absorbed; a run of
//! `max_consecutive_other` `Other` labels closes it. The closed event takes the
//! majority gesture, falling back to the gesture that opened it on a tie.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default number of consecutive `Other` labels that closes an event.
pub const MAX_CONSECUTIVE_OTHER: u32 = 3;

/// Gesture predicted for a single window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Other,
    Washing,
    Rubbing,
}

impl Label {
    pub const ALL: [Label; 3] = [Label::Other, Label::Washing, Label::Rubbing];

    /// Stable ordinal (`Other = 0`, `Washing = 1`, `Rubbing = 2`).
    pub fn ordinal(self) -> usize {
        match self {
            Label::Other => 0,
            Label::Washing => 1,
            Label::Rubbing => 2,
        }
    }

    pub fn from_ordinal(ordinal: usize) -> Option<Self> {
        Self::ALL.get(ordinal).copied()
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Label::Other => "other",
            Label::Washing => "washing",
            Label::Rubbing => "rubbing",
        };
        f.write_str(name)
    }
}

/// Kind of hand-hygiene event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandEventType {
    Washing,
    Rubbing,
}

impl fmt::Display for HandEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandEventType::Washing => f.write_str("washing"),
            HandEventType::Rubbing => f.write_str("rubbing"),
        }
    }
}

/// A closed hand-washing or hand-rubbing event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandEvent {
    #[serde(rename = "type")]
    pub event_type: HandEventType,
    /// Windows spanned by the event, including absorbed `Other` windows
    pub sample_count: u32,
    pub start_time_ms: i64,
    pub end_time_ms: i64,
}

impl HandEvent {
    pub fn duration_ms(&self) -> i64 {
        self.end_time_ms - self.start_time_ms
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.start_time_ms).single()
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.end_time_ms).single()
    }
}

/// Run-length / majority-vote state machine over window labels.
///
/// Only ever driven from the consumer thread, so it holds no locks.
#[derive(Debug, Clone)]
pub struct GestureEventAggregator {
    max_consecutive_other: u32,
    washing_count: u32,
    rubbing_count: u32,
    /// `Other` labels absorbed in the middle of the open event
    other_mid_count: u32,
    consecutive_other_count: u32,
    event_open_type: HandEventType,
    event_start_time_ms: i64,
}

impl Default for GestureEventAggregator {
    fn default() -> Self {
        Self::new(MAX_CONSECUTIVE_OTHER)
    }
}

impl GestureEventAggregator {
    pub fn new(max_consecutive_other: u32) -> Self {
        Self {
            max_consecutive_other: max_consecutive_other.max(1),
            washing_count: 0,
            rubbing_count: 0,
            other_mid_count: 0,
            consecutive_other_count: 0,
            event_open_type: HandEventType::Washing,
            event_start_time_ms: 0,
        }
    }

    pub fn has_open_event(&self) -> bool {
        self.washing_count != 0 || self.rubbing_count != 0
    }

    /// Gesture that opened the current event, if one is open.
    pub fn open_event_type(&self) -> Option<HandEventType> {
        self.has_open_event().then_some(self.event_open_type)
    }

    /// Feed the label of the next window. Returns an event when one closes.
    pub fn on_label(&mut self, label: Label, now_ms: i64) -> Option<HandEvent> {
        match label {
            Label::Other => {
                if !self.has_open_event() {
                    return None;
                }
                self.consecutive_other_count += 1;
                if self.consecutive_other_count >= self.max_consecutive_other {
                    return Some(self.close_current_event(now_ms));
                }
                None
            }
            Label::Washing => {
                self.on_gesture(HandEventType::Washing, now_ms);
                None
            }
            Label::Rubbing => {
                self.on_gesture(HandEventType::Rubbing, now_ms);
                None
            }
        }
    }

    /// Close the open event immediately, if any.
    pub fn flush(&mut self, now_ms: i64) -> Option<HandEvent> {
        self.has_open_event()
            .then(|| self.close_current_event(now_ms))
    }

    fn on_gesture(&mut self, gesture: HandEventType, now_ms: i64) {
        if !self.has_open_event() {
            self.open_new_event(gesture, now_ms);
        }
        match gesture {
            HandEventType::Washing => self.washing_count += 1,
            HandEventType::Rubbing => self.rubbing_count += 1,
        }
        if self.consecutive_other_count > 0 {
            self.other_mid_count += self.consecutive_other_count;
            self.consecutive_other_count = 0;
        }
    }

    fn open_new_event(&mut self, gesture: HandEventType, now_ms: i64) {
        self.reset_counters();
        self.event_start_time_ms = now_ms;
        self.event_open_type = gesture;
        tracing::debug!(gesture = %gesture, "hand event opened");
    }

    fn event_type(&self) -> HandEventType {
        use std::cmp::Ordering;
        match self.washing_count.cmp(&self.rubbing_count) {
            Ordering::Greater => HandEventType::Washing,
            Ordering::Less => HandEventType::Rubbing,
            Ordering::Equal => self.event_open_type,
        }
    }

    fn close_current_event(&mut self, now_ms: i64) -> HandEvent {
        let event = HandEvent {
            event_type: self.event_type(),
            sample_count: self.washing_count + self.rubbing_count + self.other_mid_count,
            start_time_ms: self.event_start_time_ms,
            end_time_ms: now_ms,
        };
        tracing::debug!(
            washing = self.washing_count,
            rubbing = self.rubbing_count,
            other = self.other_mid_count,
            "hand event closed"
        );
        self.reset_counters();
        event
    }

    fn reset_counters(&mut self) {
        self.washing_count = 0;
        self.rubbing_count = 0;
        self.other_mid_count = 0;
        self.consecutive_other_count = 0;
    }
}
