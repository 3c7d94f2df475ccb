//! Synthetic motion source.
//!
//! Generates deterministic accelerometer and gyroscope readings that follow a
//! scripted sequence of motion phases. Used by the CLI on hosts without motion
//! sensors and for end-to-end demonstrations of the pipeline.

use crate::collector::source::{require_sensors, SampleCallback, SensorSource, SourceError};
use crate::collector::types::{Sample, SensorType};
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const GRAVITY: f32 = 9.81;

/// Kind of motion produced during a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Motion {
    Still,
    Washing,
    Rubbing,
}

impl Motion {
    /// (amplitude of acceleration, amplitude of rotation, frequency in Hz)
    fn profile(self) -> (f32, f32, f32) {
        match self {
            Motion::Still => (0.05, 0.02, 0.5),
            Motion::Washing => (3.0, 2.5, 2.5),
            Motion::Rubbing => (1.2, 1.0, 4.0),
        }
    }
}

impl FromStr for Motion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "still" | "other" | "idle" => Ok(Motion::Still),
            "washing" | "wash" => Ok(Motion::Washing),
            "rubbing" | "rub" => Ok(Motion::Rubbing),
            other => Err(format!("unknown motion '{other}'")),
        }
    }
}

/// One scripted phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionPhase {
    pub motion: Motion,
    pub duration: Duration,
}

impl MotionPhase {
    pub fn new(motion: Motion, seconds: u64) -> Self {
        Self {
            motion,
            duration: Duration::from_secs(seconds),
        }
    }
}

/// Parse a script such as `still:5,washing:20,still:10`.
pub fn parse_script(s: &str) -> Result<Vec<MotionPhase>, String> {
    let mut phases = Vec::new();
    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (motion, secs) = part
            .split_once(':')
            .ok_or_else(|| format!("expected <motion>:<seconds>, got '{part}'"))?;
        let motion: Motion = motion.parse()?;
        let secs: u64 = secs
            .trim()
            .parse()
            .map_err(|_| format!("invalid duration in '{part}'"))?;
        phases.push(MotionPhase::new(motion, secs));
    }
    if phases.is_empty() {
        return Err("script must contain at least one phase".to_string());
    }
    Ok(phases)
}

/// Configuration for the synthetic source.
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub sampling_period_ms: i64,
    /// Sensors the emulated device exposes
    pub available: Vec<SensorType>,
    pub script: Vec<MotionPhase>,
    /// Restart the script after the last phase instead of holding still
    pub repeat: bool,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            sampling_period_ms: 20,
            available: SensorType::ALL.to_vec(),
            script: vec![
                MotionPhase::new(Motion::Still, 5),
                MotionPhase::new(Motion::Washing, 20),
                MotionPhase::new(Motion::Still, 10),
                MotionPhase::new(Motion::Rubbing, 15),
                MotionPhase::new(Motion::Still, 10),
            ],
            repeat: true,
        }
    }
}

/// Synthetic sensor source driven by a motion script.
pub struct SyntheticSource {
    config: SyntheticConfig,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Result<Self, SourceError> {
        require_sensors(&config.available)?;
        Ok(Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        })
    }
}

impl SensorSource for SyntheticSource {
    fn start(&mut self, callback: SampleCallback) -> Result<(), SourceError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(SourceError::AlreadyRunning);
        }
        self.running.store(true, Ordering::SeqCst);

        let running = self.running.clone();
        let config = self.config.clone();

        let handle = thread::Builder::new()
            .name("sensor-collector".to_string())
            .spawn(move || run_generator(&config, &running, &callback))
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

impl Drop for SyntheticSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Generator loop executed on the collector thread.
fn run_generator(config: &SyntheticConfig, running: &AtomicBool, callback: &SampleCallback) {
    let period = Duration::from_millis(config.sampling_period_ms.max(1) as u64);
    let origin = Instant::now();
    let mut tick: u32 = 0;

    while running.load(Ordering::SeqCst) {
        let elapsed = origin.elapsed();
        let motion = motion_at(&config.script, config.repeat, elapsed);
        let timestamp_ns = elapsed.as_nanos() as i64;
        let (acc, gyro) = synthesize(motion, elapsed.as_secs_f32());

        callback(Sample::accelerometer(acc, timestamp_ns));
        callback(Sample::gyroscope(gyro, timestamp_ns));

        tick = tick.wrapping_add(1);
        let next = period * tick;
        if let Some(wait) = next.checked_sub(origin.elapsed()) {
            thread::sleep(wait);
        }
    }
    tracing::debug!("synthetic collector thread exiting after {tick} ticks");
}

/// Motion active at `elapsed` according to the script.
pub fn motion_at(script: &[MotionPhase], repeat: bool, elapsed: Duration) -> Motion {
    let total: Duration = script.iter().map(|p| p.duration).sum();
    if total.is_zero() {
        return Motion::Still;
    }
    let mut t = elapsed;
    if t >= total {
        if !repeat {
            return Motion::Still;
        }
        t = Duration::from_nanos((t.as_nanos() % total.as_nanos()) as u64);
    }
    for phase in script {
        if t < phase.duration {
            return phase.motion;
        }
        t -= phase.duration;
    }
    Motion::Still
}

/// Produce one accelerometer and one gyroscope reading for `motion` at time `t`.
pub fn synthesize(motion: Motion, t: f32) -> ([f32; 3], [f32; 3]) {
    let (acc_amp, gyro_amp, freq) = motion.profile();
    let phase = TAU * freq * t;
    let acc = [
        acc_amp * phase.sin(),
        acc_amp * 0.5 * (phase * 2.0).cos(),
        GRAVITY + acc_amp * 0.3 * phase.cos(),
    ];
    let gyro = [
        gyro_amp * phase.cos(),
        gyro_amp * 0.8 * phase.sin(),
        gyro_amp * 0.4 * (phase * 0.5).sin(),
    ];
    (acc, gyro)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_parse_script() {
        let script = parse_script("still:5, washing:20,rubbing:3").unwrap();
        assert_eq!(script.len(), 3);
        assert_eq!(script[1], MotionPhase::new(Motion::Washing, 20));
        assert!(parse_script("").is_err());
        assert!(parse_script("dancing:4").is_err());
        assert!(parse_script("washing").is_err());
    }

    #[test]
    fn test_motion_at() {
        let script = vec![
            MotionPhase::new(Motion::Washing, 2),
            MotionPhase::new(Motion::Rubbing, 1),
        ];
        assert_eq!(motion_at(&script, false, Duration::from_millis(500)), Motion::Washing);
        assert_eq!(motion_at(&script, false, Duration::from_millis(2500)), Motion::Rubbing);
        assert_eq!(motion_at(&script, false, Duration::from_secs(4)), Motion::Still);
        assert_eq!(motion_at(&script, true, Duration::from_millis(3500)), Motion::Washing);
    }

    #[test]
    fn test_still_motion_keeps_gravity() {
        let (acc, gyro) = synthesize(Motion::Still, 1.0);
        assert!((acc[2] - GRAVITY).abs() < 0.1);
        assert!(gyro.iter().all(|g| g.abs() < 0.05));
    }

    #[test]
    fn test_unsupported_device() {
        let config = SyntheticConfig {
            available: vec![SensorType::Gyroscope],
            ..SyntheticConfig::default()
        };
        assert!(matches!(
            SyntheticSource::new(config),
            Err(SourceError::SensorUnsupported(SensorType::Accelerometer))
        ));
    }

    #[test]
    fn test_generates_both_sensors() {
        let config = SyntheticConfig {
            sampling_period_ms: 5,
            ..SyntheticConfig::default()
        };
        let mut source = SyntheticSource::new(config).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        source
            .start(Arc::new(move |s: Sample| sink.lock().unwrap().push(s)))
            .unwrap();
        assert_eq!(
            source.start(Arc::new(|_: Sample| {})),
            Err(SourceError::AlreadyRunning)
        );
        thread::sleep(Duration::from_millis(60));
        source.stop();

        let seen = seen.lock().unwrap();
        assert!(seen.iter().any(|s| s.sensor_type == SensorType::Accelerometer));
        assert!(seen.iter().any(|s| s.sensor_type == SensorType::Gyroscope));
        let acc_ts: Vec<i64> = seen
            .iter()
            .filter(|s| s.sensor_type == SensorType::Accelerometer)
            .map(|s| s.timestamp_ns)
            .collect();
        assert!(acc_ts.windows(2).all(|w| w[1] > w[0]));
    }
}
