use anyhow::{Context, Result};
use colored::Colorize;
use serde::{Deserialize, Serialize};

use crate::core::config::OutputFormat;
use crate::core::document::Document;
use crate::core::range::{FoldingRange, FoldingRangeKind};

/// Longest preview of a range's first line, in characters.
const PREVIEW_WIDTH: usize = 60;

/// The folding ranges computed for one file.
///
/// This is what the `fold` command prints, either through a `RangeReporter` or
/// serialized with [`FoldingReport::render`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldingReport {
    /// The file the ranges were computed for.
    pub file: String,
    /// The language whose rules were applied.
    pub language: String,
    pub ranges: Vec<FoldingRange>,
}

impl FoldingReport {
    pub fn new(file: impl Into<String>, language: impl Into<String>, ranges: Vec<FoldingRange>) -> Self {
        Self {
            file: file.into(),
            language: language.into(),
            ranges,
        }
    }

    /// Number of ranges of the given kind.
    pub fn count(&self, kind: FoldingRangeKind) -> usize {
        self.ranges.iter().filter(|range| range.kind == kind).count()
    }

    /// Serializes the report in a machine-readable format.
    ///
    /// # Arguments
    /// * `format`: The target format. `Text` has no serialized form and is
    ///   rendered as JSON.
    ///
    /// # Returns
    /// A `Result<String>` with the serialized report.
    pub fn render(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Yaml => serde_yaml::to_string(self).context("Failed to serialize to YAML"),
            OutputFormat::Toml => toml::to_string_pretty(self).context("Failed to serialize to TOML"),
            OutputFormat::Json | OutputFormat::Text => {
                serde_json::to_string_pretty(self).context("Failed to serialize to JSON")
            }
        }
    }
}

pub trait RangeReporter {
    fn generate_range_report(&self, report: &FoldingReport, document: &dyn Document) -> Result<()>;
}

/// A `RangeReporter` that prints a colored listing to the console.
///
/// This is the reporter used by the `fold` command in `text` output.
pub struct ConsoleReporter {
    verbose: bool,
}

impl ConsoleReporter {
    /// Constructs a new `ConsoleReporter` instance.
    ///
    /// # Arguments
    /// * `verbose`: Also print the last line of every range.
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Formats the listing line of a single range.
    ///
    /// Line numbers are printed 1-based, the way editors show them, followed
    /// by a preview of the line the range starts on.
    ///
    /// # Arguments
    /// * `range`: The range to format.
    /// * `document`: The document the range was computed for.
    ///
    /// # Returns
    /// A `String` containing the formatted line.
    fn format_range(&self, range: &FoldingRange, document: &dyn Document) -> String {
        let kind = match range.kind {
            FoldingRangeKind::Comment => "comment".green(),
            FoldingRangeKind::Region => "region ".blue(),
        };

        format!(
            "{kind} {:>5}-{:<5} ({} lines)  {}",
            range.start + 1,
            range.end + 1,
            range.line_count(),
            preview(document, range.start).dimmed()
        )
    }
}

/// First characters of a line, trimmed, for listings.
fn preview(document: &dyn Document, line: usize) -> String {
    if line >= document.line_count() {
        return String::new();
    }

    let text = document.line(line).trim();
    if text.chars().count() > PREVIEW_WIDTH {
        let cut: String = text.chars().take(PREVIEW_WIDTH).collect();
        format!("{cut}…")
    } else {
        text.to_string()
    }
}

impl RangeReporter for ConsoleReporter {
    fn generate_range_report(&self, report: &FoldingReport, document: &dyn Document) -> Result<()> {
        println!(
            "{} {} ({})",
            "Folding ranges for".bold(),
            report.file.cyan(),
            report.language
        );

        if report.ranges.is_empty() {
            println!("No folding ranges found.");
            return Ok(());
        }

        for range in &report.ranges {
            println!("{}", self.format_range(range, document));
            if self.verbose {
                println!("{:>20}└─ {}", "", preview(document, range.end).dimmed());
            }
        }

        println!("\nSummary:");
        println!("  Total ranges: {}", report.ranges.len());
        println!("  Regions: {}", report.count(FoldingRangeKind::Region));
        println!("  Comments: {}", report.count(FoldingRangeKind::Comment));

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> FoldingReport {
        FoldingReport::new(
            "main.c",
            "c",
            vec![
                FoldingRange::new(1, 3, FoldingRangeKind::Comment),
                FoldingRange::new(0, 5, FoldingRangeKind::Region),
            ],
        )
    }

    #[test]
    fn test_counts_per_kind() {
        let report = report();
        assert_eq!(report.count(FoldingRangeKind::Comment), 1);
        assert_eq!(report.count(FoldingRangeKind::Region), 1);
    }

    #[test]
    fn test_render_formats() {
        let report = report();

        let json = report.render(OutputFormat::Json).unwrap();
        let parsed: FoldingReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report);
        assert!(json.contains("\"kind\": \"comment\""));

        let toml = report.render(OutputFormat::Toml).unwrap();
        assert!(toml.contains("[[ranges]]"));

        let yaml = report.render(OutputFormat::Yaml).unwrap();
        assert!(yaml.contains("language: c"));
    }

    #[test]
    fn test_format_range_is_one_based_with_preview() {
        colored::control::set_override(false);
        let lines = vec!["#region setup", "  /*", "   * doc", "   */", "  x", "#endregion"];
        let line = ConsoleReporter::new(false).format_range(&report().ranges[0], &lines);
        assert!(line.contains("2-4"), "{line}");
        assert!(line.contains("(3 lines)"));
        assert!(line.ends_with("/*"));
    }

    #[test]
    fn test_preview_is_truncated() {
        let long = "x".repeat(100);
        let lines = vec![long];
        let text = preview(&lines, 0);
        assert_eq!(text.chars().count(), PREVIEW_WIDTH + 1);
        assert_eq!(preview(&lines, 4), "");
    }
}
