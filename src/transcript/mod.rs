use crate::classify::LineKind;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur when persisting the transcript.
#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("nothing to save: the output panel is empty")]
    Empty,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TranscriptError>;

/// One classified display line.
#[derive(Debug, Clone)]
pub struct DisplayLine {
    pub kind: LineKind,
    pub text: String,
}

/// The accumulated, classified checker output for the current run.
///
/// Owns the display text: the event pump appends to it, the statistics scan
/// reads it back in full, and save writes it verbatim to a user-chosen file.
#[derive(Debug, Default)]
pub struct Transcript {
    lines: Vec<DisplayLine>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one classified line. Trailing whitespace is stripped.
    pub fn push(&mut self, kind: LineKind, text: &str) {
        self.lines.push(DisplayLine {
            kind,
            text: text.trim_end().to_string(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn lines(&self) -> &[DisplayLine] {
        &self.lines
    }

    /// The full accumulated text, one line per entry.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&line.text);
            out.push('\n');
        }
        out
    }

    /// Discard all accumulated output.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Write the accumulated text verbatim to `path`.
    ///
    /// Refuses to save an empty transcript; no file is created.
    pub fn save(&self, path: &Path) -> Result<()> {
        if self.is_empty() {
            return Err(TranscriptError::Empty);
        }
        fs::write(path, self.text())?;
        Ok(())
    }
}
