use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Read-only view of a text document as an indexable sequence of lines.
///
/// The folding engine only ever asks for the number of lines and for the text
/// of one line at a time, so any line-oriented buffer can be folded without
/// copying it.
pub trait Document {
    /// Total number of lines in the document.
    fn line_count(&self) -> usize;

    /// Text of the line at `index`, without its line terminator.
    ///
    /// # Panics
    /// Implementations may panic when `index >= line_count()`.
    fn line(&self, index: usize) -> &str;
}

impl<T: AsRef<str>> Document for [T] {
    fn line_count(&self) -> usize {
        self.len()
    }

    fn line(&self, index: usize) -> &str {
        self[index].as_ref()
    }
}

impl<T: AsRef<str>> Document for Vec<T> {
    fn line_count(&self) -> usize {
        self.len()
    }

    fn line(&self, index: usize) -> &str {
        self[index].as_ref()
    }
}

/// An owned document split into lines the way an editor counts them: a
/// trailing newline yields a final empty line, and `\r\n` endings are
/// stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDocument {
    lines: Vec<String>,
}

impl TextDocument {
    pub fn new(text: &str) -> Self {
        let lines = text
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
            .collect();

        Self { lines }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Self::new(&content))
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl Document for TextDocument {
    fn line_count(&self) -> usize {
        self.lines.len()
    }

    fn line(&self, index: usize) -> &str {
        &self.lines[index]
    }
}
