//! Hand Monitor Agent CLI
//!
//! Runs the hand-hygiene detection pipeline and records labelled motion captures.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use handmonitor_agent::{
    collector::{parse_script, SyntheticConfig, SyntheticSource},
    config::Config,
    core::MotionEnergyClassifier,
    pipeline::{CaptureRecorder, GestureDetector, Pipeline, WindowHandler},
    recorder::{Action, RecordingIndex},
    sink::{load_events, JsonlEventSink},
    stats::{create_shared_stats_with_persistence, SharedPipelineStats},
    SensorSource, VERSION,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "handmonitor")]
#[command(version = VERSION)]
#[command(about = "Hand-washing and hand-rubbing detection from wrist motion", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Clone)]
struct SamplingArgs {
    /// Motion script for the synthetic sensor, e.g. "still:5,washing:20"
    #[arg(long)]
    script: Option<String>,

    /// Stop after this many seconds (runs until Ctrl+C otherwise)
    #[arg(long)]
    duration: Option<u64>,

    /// Override the sampling period in milliseconds
    #[arg(long)]
    period_ms: Option<i64>,

    /// Override the number of slots per window
    #[arg(long)]
    window_size: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect hand events and store them
    Run {
        #[command(flatten)]
        sampling: SamplingArgs,

        /// Events file (JSON lines)
        #[arg(long)]
        events_file: Option<PathBuf>,

        /// Store an event still open when the run ends
        #[arg(long)]
        flush_on_stop: bool,
    },

    /// Record a labelled motion capture
    Record {
        /// Action being performed (e.g. hand_wash, hand_rub, typing)
        #[arg(long)]
        action: String,

        #[command(flatten)]
        sampling: SamplingArgs,
    },

    /// List stored hand events
    Events {
        /// Show only the most recent events
        #[arg(long)]
        last: Option<usize>,
    },

    /// Show configuration and cumulative statistics
    Status,

    /// Show configuration
    Config {
        /// Write the current (or default) configuration to disk
        #[arg(long)]
        save: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            sampling,
            events_file,
            flush_on_stop,
        } => cmd_run(&sampling, events_file, flush_on_stop),
        Commands::Record { action, sampling } => cmd_record(&action, &sampling),
        Commands::Events { last } => cmd_events(last),
        Commands::Status => cmd_status(),
        Commands::Config { save } => cmd_config(save),
    }
}

fn cmd_run(args: &SamplingArgs, events_file: Option<PathBuf>, flush_on_stop: bool) -> Result<()> {
    let mut config = load_config(args)?;
    if let Some(path) = events_file {
        config.events_file = path;
    }
    config.flush_on_stop |= flush_on_stop;

    println!("Hand Monitor Agent v{VERSION}");
    println!();
    print_sampling(&config);
    println!("  Events file: {:?}", config.events_file);
    println!();

    let stats = create_shared_stats_with_persistence(config.stats_path());
    let source = synthetic_source(&config, args)?;
    let mut pipeline = Pipeline::new(&config, source)?.with_stats(stats.clone());

    let sink = JsonlEventSink::open(&config.events_file)
        .with_context(|| format!("opening events file {:?}", config.events_file))?;
    let classifier =
        MotionEnergyClassifier::default().with_window_size(config.sampling.window_size as usize);
    let detector = GestureDetector::new(classifier, Arc::new(sink), &config, stats.clone())?;

    let result = run_until_stopped(&mut pipeline, detector, args.duration);
    finish_session(&stats);
    result
}

fn cmd_record(action: &str, args: &SamplingArgs) -> Result<()> {
    let action: Action = action.parse()?;
    let config = load_config(args)?;

    println!("Recording {action}");
    print_sampling(&config);
    println!("  Recordings: {:?}", config.recordings_path);
    println!();

    let stats = create_shared_stats_with_persistence(config.stats_path());
    let source = synthetic_source(&config, args)?;
    let mut pipeline = Pipeline::new(&config, source)?.with_stats(stats.clone());

    let recorder = CaptureRecorder::create(&config.recordings_path, action)?;
    let completed = recorder.completed();

    let result = run_until_stopped(&mut pipeline, recorder, args.duration);
    finish_session(&stats);
    result?;

    let recording = completed
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone();
    match recording {
        Some(recording) => println!(
            "Saved {} ({} ms) to {:?}",
            recording.file_name,
            recording.duration_ms,
            config.recordings_path.join(&recording.file_name)
        ),
        None => eprintln!("No recording was saved"),
    }
    Ok(())
}

fn cmd_events(last: Option<usize>) -> Result<()> {
    let config = Config::load()?;
    let events = load_events(&config.events_file)
        .with_context(|| format!("reading {:?}", config.events_file))?;

    if events.is_empty() {
        println!("No hand events recorded in {:?}", config.events_file);
        println!("Run 'handmonitor run' to start detecting.");
        return Ok(());
    }

    let skip = last.map_or(0, |n| events.len().saturating_sub(n));
    println!("{:<8} {:<26} {:>8} {:>10}", "TYPE", "START", "WINDOWS", "DURATION");
    for event in events.iter().skip(skip) {
        let start = event
            .start_time()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
            .unwrap_or_else(|| event.start_time_ms.to_string());
        println!(
            "{:<8} {:<26} {:>8} {:>9.1}s",
            event.event_type.to_string(),
            start,
            event.sample_count,
            event.duration_ms() as f64 / 1000.0
        );
    }
    println!();
    println!("{} event(s) total", events.len());
    Ok(())
}

fn cmd_status() -> Result<()> {
    let config = Config::load()?;

    println!("Hand Monitor Agent Status");
    println!("=========================");
    println!();
    println!("Configuration:");
    print_sampling(&config);
    println!("  Max consecutive other: {}", config.max_consecutive_other);
    println!("  Flush on stop: {}", config.flush_on_stop);
    println!();

    let stats_path = config.stats_path();
    if stats_path.exists() {
        let content = std::fs::read_to_string(&stats_path)?;
        let stats: serde_json::Value = serde_json::from_str(&content)?;
        println!("Cumulative Statistics:");
        for key in [
            "windows_produced",
            "windows_consumed",
            "washing_events",
            "rubbing_events",
            "events_persisted",
        ] {
            if let Some(value) = stats.get(key) {
                println!("  {}: {value}", key.replace('_', " "));
            }
        }
    } else {
        println!("No previous session data found.");
    }

    let index = RecordingIndex::load(&config.recordings_path)?;
    println!();
    println!("Recordings: {}", index.recordings.len());
    for action in Action::ALL {
        let count = index.for_action(action).count();
        if count > 0 {
            println!("  {action}: {count}");
        }
    }
    Ok(())
}

fn cmd_config(save: bool) -> Result<()> {
    let config = Config::load()?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);

    if save {
        config.save()?;
        println!();
        println!("Saved to {:?}", Config::config_path());
    }
    Ok(())
}

/// Load the configuration and apply per-run overrides.
fn load_config(args: &SamplingArgs) -> Result<Config> {
    let mut config = Config::load().context("loading configuration")?;
    if let Some(period) = args.period_ms {
        config.sampling.sampling_period_ms = period;
    }
    if let Some(size) = args.window_size {
        config.sampling.window_size = size;
    }
    config.validate()?;
    config.ensure_directories()?;
    Ok(config)
}

fn synthetic_source(config: &Config, args: &SamplingArgs) -> Result<SyntheticSource> {
    let mut synthetic = SyntheticConfig {
        sampling_period_ms: config.sampling.sampling_period_ms,
        ..SyntheticConfig::default()
    };
    if let Some(script) = &args.script {
        synthetic.script = parse_script(script).map_err(anyhow::Error::msg)?;
        synthetic.repeat = false;
    }
    Ok(SyntheticSource::new(synthetic)?)
}

fn run_until_stopped<S, H>(
    pipeline: &mut Pipeline<S>,
    handler: H,
    duration: Option<u64>,
) -> Result<()>
where
    S: SensorSource,
    H: WindowHandler + 'static,
{
    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;

    pipeline.start(handler)?;
    println!("Press Ctrl+C to stop");

    let deadline = duration.map(|secs| Instant::now() + Duration::from_secs(secs));
    while running.load(Ordering::SeqCst) && pipeline.is_running() {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        thread::sleep(Duration::from_millis(100));
    }

    println!();
    println!("Stopping...");
    pipeline.stop()?;
    Ok(())
}

fn finish_session(stats: &SharedPipelineStats) {
    if let Err(e) = stats.save() {
        eprintln!("Warning: Could not save statistics: {e}");
    }
    println!();
    println!("{}", stats.summary());
}

fn print_sampling(config: &Config) {
    println!("  Sampling period: {} ms", config.sampling.sampling_period_ms);
    println!(
        "  Window: {} slots ({} ms)",
        config.sampling.window_size,
        config.sampling.window_duration_ms()
    );
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("setting Ctrl+C handler")
}
