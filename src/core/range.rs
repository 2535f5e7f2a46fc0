use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind attached to a folding range, as declared by the marker rule that
/// produced it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum FoldingRangeKind {
    Comment,
    #[default]
    Region,
}

impl fmt::Display for FoldingRangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FoldingRangeKind::Comment => write!(f, "comment"),
            FoldingRangeKind::Region => write!(f, "region"),
        }
    }
}

/// A foldable block of lines. Both `start` and `end` are 0-based and inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldingRange {
    pub start: usize,
    pub end: usize,
    pub kind: FoldingRangeKind,
}

impl FoldingRange {
    pub fn new(start: usize, end: usize, kind: FoldingRangeKind) -> Self {
        Self { start, end, kind }
    }

    /// Number of lines covered by the range, both ends included.
    pub fn line_count(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn contains(&self, other: &FoldingRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl fmt::Display for FoldingRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}] {}", self.start, self.end, self.kind)
    }
}
