//! Channel-fed sensor source.
//!
//! The platform layer (or a test) pushes samples into a bounded crossbeam
//! channel; a dedicated worker thread drains it and hands each sample to the
//! pipeline callback. When the callback blocks, the channel fills up and the
//! platform side drops samples instead of queueing without bound.
//!
//! Samples only flow while the source is running. Senders are refused while it
//! is stopped, and anything still queued from an earlier session is discarded
//! on the next start.

use crate::collector::source::{require_sensors, SampleCallback, SensorSource, SourceError};
use crate::collector::types::{Sample, SensorType};
use crossbeam_channel::{
    bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender, TrySendError,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const CHANNEL_CAPACITY: usize = 1_024;
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A sensor source fed through a channel.
pub struct ChannelSource {
    sender: Sender<Sample>,
    receiver: Receiver<Sample>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl ChannelSource {
    /// Create a source for a device that provides `available` sensors.
    pub fn new(available: &[SensorType]) -> Result<Self, SourceError> {
        require_sensors(available)?;
        let (sender, receiver) = bounded(CHANNEL_CAPACITY);
        Ok(Self {
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        })
    }

    /// Handle used by the platform layer to deliver samples.
    pub fn sender(&self) -> SampleSender {
        SampleSender {
            inner: self.sender.clone(),
            running: self.running.clone(),
        }
    }
}

impl SensorSource for ChannelSource {
    fn start(&mut self, callback: SampleCallback) -> Result<(), SourceError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(SourceError::AlreadyRunning);
        }

        let mut stale = 0usize;
        while self.receiver.try_recv().is_ok() {
            stale += 1;
        }
        if stale > 0 {
            tracing::debug!(stale, "discarded samples queued before start");
        }
        self.running.store(true, Ordering::SeqCst);

        let receiver = self.receiver.clone();
        let running = self.running.clone();

        let handle = thread::Builder::new()
            .name("sensor-collector".to_string())
            .spawn(move || {
                while running.load(Ordering::SeqCst) {
                    match receiver.recv_timeout(POLL_INTERVAL) {
                        Ok(sample) => callback(sample),
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                tracing::debug!("sensor collector thread exiting");
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                SourceError::Spawn(e.to_string())
            })?;

        self.thread_handle = Some(handle);
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for ChannelSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Producer handle for a [`ChannelSource`].
#[derive(Clone)]
pub struct SampleSender {
    inner: Sender<Sample>,
    running: Arc<AtomicBool>,
}

impl SampleSender {
    /// Deliver a sample, waiting while the channel is full.
    ///
    /// Returns `false` without queueing when the source is stopped, including
    /// when it stops while this call is waiting for room.
    pub fn send(&self, mut sample: Sample) -> bool {
        loop {
            if !self.running.load(Ordering::SeqCst) {
                return false;
            }
            match self.inner.send_timeout(sample, POLL_INTERVAL) {
                Ok(()) => return true,
                Err(SendTimeoutError::Timeout(returned)) => sample = returned,
                Err(SendTimeoutError::Disconnected(_)) => return false,
            }
        }
    }

    /// Deliver a sample without blocking; returns `false` when it was dropped.
    pub fn try_send(&self, sample: Sample) -> bool {
        if !self.running.load(Ordering::SeqCst) {
            return false;
        }
        match self.inner.try_send(sample) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::trace!("sensor channel full, dropping {} sample", sample.sensor_type);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}
