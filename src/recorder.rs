//! Raw motion capture for building training datasets.
//!
//! While recording, every completed window is appended to a capture file as
//! one CSV row per slot:
//!
//! ```text
//! "<action ordinal>",accX,accY,accZ,gyroX,gyroY,gyroZ
//! ```
//!
//! Values carry four decimals. Capture files are named `<uuid>.txt` and are
//! listed in a JSON index kept in the same directory.

use crate::core::window::Window;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

const CAPTURE_EXT: &str = "txt";
const INDEX_FILE: &str = "recordings.json";

/// Errors raised while recording.
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Index error: {0}")]
    Index(#[from] serde_json::Error),
    #[error("unknown action: {0}")]
    UnknownAction(String),
}

/// Activity being recorded. The ordinal is the label written to capture files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Other,
    HandWash,
    HandRub,
    Eating,
    TeethBrush,
    FaceWash,
    Writing,
    Typing,
    Housework,
}

impl Action {
    pub const ALL: [Action; 9] = [
        Action::Other,
        Action::HandWash,
        Action::HandRub,
        Action::Eating,
        Action::TeethBrush,
        Action::FaceWash,
        Action::Writing,
        Action::Typing,
        Action::Housework,
    ];

    pub fn ordinal(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Action::Other => "other",
            Action::HandWash => "hand_wash",
            Action::HandRub => "hand_rub",
            Action::Eating => "eating",
            Action::TeethBrush => "teeth_brush",
            Action::FaceWash => "face_wash",
            Action::Writing => "writing",
            Action::Typing => "typing",
            Action::Housework => "housework",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Action {
    type Err = RecorderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|action| action.name() == normalized)
            .ok_or_else(|| RecorderError::UnknownAction(s.to_string()))
    }
}

/// Writes windows as labelled CSV rows.
pub struct CaptureWriter<W: Write> {
    out: W,
    action: Action,
    rows: u64,
}

impl<W: Write> CaptureWriter<W> {
    pub fn new(out: W, action: Action) -> Self {
        Self {
            out,
            action,
            rows: 0,
        }
    }

    pub fn action(&self) -> Action {
        self.action
    }

    /// Rows written so far.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Append one row per slot of `window`.
    pub fn write_window(&mut self, window: &Window) -> Result<(), RecorderError> {
        let label = self.action.ordinal();
        for slot in window.slots() {
            writeln!(
                self.out,
                "\"{label}\",{:.4},{:.4},{:.4},{:.4},{:.4},{:.4}",
                slot[0], slot[1], slot[2], slot[3], slot[4], slot[5]
            )?;
            self.rows += 1;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), RecorderError> {
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Metadata for one capture file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recording {
    pub id: Uuid,
    pub action: Action,
    pub file_name: String,
    /// Host the capture was taken on
    pub device: String,
    pub start_ms: i64,
    pub duration_ms: i64,
}

/// JSON list of recordings stored next to the capture files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordingIndex {
    pub recordings: Vec<Recording>,
}

impl RecordingIndex {
    pub fn path(dir: &Path) -> PathBuf {
        dir.join(INDEX_FILE)
    }

    /// Load the index from `dir`, empty when none exists yet.
    pub fn load(dir: &Path) -> Result<Self, RecorderError> {
        let path = Self::path(dir);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, dir: &Path) -> Result<(), RecorderError> {
        std::fs::create_dir_all(dir)?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(Self::path(dir), json)?;
        Ok(())
    }

    pub fn add(&mut self, recording: Recording) {
        self.recordings.push(recording);
    }

    pub fn for_action(&self, action: Action) -> impl Iterator<Item = &Recording> {
        self.recordings.iter().filter(move |r| r.action == action)
    }
}

/// A capture file being written.
pub struct RecordingSession {
    dir: PathBuf,
    id: Uuid,
    file_name: String,
    start_ms: i64,
    writer: CaptureWriter<BufWriter<File>>,
}

impl RecordingSession {
    /// Create a new capture file for `action` under `dir`.
    pub fn create(dir: &Path, action: Action) -> Result<Self, RecorderError> {
        std::fs::create_dir_all(dir)?;
        let id = Uuid::new_v4();
        let file_name = format!("{id}.{CAPTURE_EXT}");
        let file = File::create(dir.join(&file_name))?;
        tracing::info!(%action, file = %file_name, "recording started");

        Ok(Self {
            dir: dir.to_path_buf(),
            id,
            file_name,
            start_ms: Utc::now().timestamp_millis(),
            writer: CaptureWriter::new(BufWriter::new(file), action),
        })
    }

    pub fn file_path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    pub fn writer(&mut self) -> &mut CaptureWriter<BufWriter<File>> {
        &mut self.writer
    }

    /// Close the capture file and register it in the index.
    pub fn finish(mut self) -> Result<Recording, RecorderError> {
        self.writer.flush()?;
        let recording = Recording {
            id: self.id,
            action: self.writer.action(),
            file_name: self.file_name,
            device: device_name(),
            start_ms: self.start_ms,
            duration_ms: Utc::now().timestamp_millis() - self.start_ms,
        };

        let mut index = RecordingIndex::load(&self.dir)?;
        index.add(recording.clone());
        index.save(&self.dir)?;
        tracing::info!(
            action = %recording.action,
            rows = self.writer.rows(),
            duration_ms = recording.duration_ms,
            "recording saved"
        );
        Ok(recording)
    }
}

fn device_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_ordinals_and_parsing() {
        assert_eq!(Action::Other.ordinal(), 0);
        assert_eq!(Action::HandWash.ordinal(), 1);
        assert_eq!(Action::HandRub.ordinal(), 2);
        assert_eq!(Action::Housework.ordinal(), 8);
        assert_eq!("hand-wash".parse::<Action>().unwrap(), Action::HandWash);
        assert_eq!("Typing".parse::<Action>().unwrap(), Action::Typing);
        assert!("juggling".parse::<Action>().is_err());
    }

    #[test]
    fn test_capture_row_format() {
        let window = Window::from_vec(vec![
            1.0, -2.5, 9.80665, 0.12345, 0.0, -0.00006, //
            0.5, 0.25, 0.125, 3.0, 2.0, 1.0,
        ])
        .unwrap();
        let mut writer = CaptureWriter::new(Vec::new(), Action::HandRub);
        writer.write_window(&window).unwrap();
        assert_eq!(writer.rows(), 2);

        let text = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(
            text,
            "\"2\",1.0000,-2.5000,9.8067,0.1235,0.0000,-0.0001\n\
             \"2\",0.5000,0.2500,0.1250,3.0000,2.0000,1.0000\n"
        );
    }

    #[test]
    fn test_session_writes_file_and_index() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = RecordingSession::create(dir.path(), Action::HandWash).unwrap();
        let path = session.file_path();
        session.writer().write_window(&Window::new(3)).unwrap();
        let recording = session.finish().unwrap();

        assert_eq!(recording.file_name, format!("{}.txt", recording.id));
        assert!(recording.duration_ms >= 0);
        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(content.lines().count(), 3);
        assert!(content.starts_with("\"1\",0.0000,"));

        let index = RecordingIndex::load(dir.path()).unwrap();
        assert_eq!(index.recordings, vec![recording]);
        assert_eq!(index.for_action(Action::HandWash).count(), 1);
        assert_eq!(index.for_action(Action::Eating).count(), 0);
    }

    #[test]
    fn test_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        assert!(RecordingIndex::load(dir.path()).unwrap().recordings.is_empty());
    }
}
