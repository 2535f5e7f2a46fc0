use tracing::trace;

use crate::builders::markers::{ExpectedEnd, MarkerRole, MarkerRule, RuleShape, UnnestedMatch};
use crate::builders::master::{CompiledRuleSet, MarkerMatch, MasterPattern};
use crate::core::document::Document;
use crate::core::range::{FoldingRange, FoldingRangeKind};

/// An open marker waiting for its end.
#[derive(Debug, Clone)]
struct StackItem {
    rule: usize,
    start_line: usize,
    expected_end: Option<ExpectedEnd>,
    separator: bool,
    continuation_line: Option<usize>,
}

impl StackItem {
    fn new(rule: usize, start_line: usize) -> Self {
        Self {
            rule,
            start_line,
            expected_end: None,
            separator: false,
            continuation_line: None,
        }
    }
}

/// Which matcher drives the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// The master pattern, every rule at once.
    Normal,
    /// Only the middle/end markers of one non-nesting rule, whose block is on
    /// top of the stack.
    Unnested(usize),
}

/// Byte offset to resume from after a match. Zero-width matches step over one
/// character so a line is never scanned forever.
fn next_offset(text: &str, start: usize, end: usize) -> usize {
    if end > start {
        return end;
    }
    text[end..]
        .chars()
        .next()
        .map_or(text.len() + 1, |c| end + c.len_utf8())
}

struct Scanner<'a> {
    rules: &'a [MarkerRule],
    master: &'a MasterPattern,
    stack: Vec<StackItem>,
    ranges: Vec<FoldingRange>,
    /// Where to resume after an end marker that ran past the candidate match.
    resume: Option<usize>,
}

impl<'a> Scanner<'a> {
    fn run<D: Document + ?Sized>(mut self, document: &D) -> Vec<FoldingRange> {
        let line_count = document.line_count();
        let mut mode = Mode::Normal;

        for line in 0..line_count {
            let text = document.line(line);
            let mut offset = 0;

            while offset <= text.len() {
                match mode {
                    Mode::Normal => {
                        let Some(found) = self.master.find_at(text, offset) else {
                            break;
                        };
                        offset = next_offset(text, found.start, found.end);
                        mode = self.on_marker(line, text, &found);
                    }
                    Mode::Unnested(rule) => {
                        let Some(found) = self.rules[rule].find_unnested(text, offset) else {
                            break;
                        };
                        offset = next_offset(text, found.start, found.end);
                        mode = self.on_unnested(line, text, found);
                    }
                }
                if let Some(resume) = self.resume.take() {
                    offset = offset.max(resume);
                }
            }

            self.resolve_continuation(line);
        }

        self.flush_separators(line_count);
        self.ranges
    }

    fn kind(&self, rule: usize) -> FoldingRangeKind {
        self.rules[rule].kind
    }

    /// New markers may open when nothing is open or the innermost open block
    /// belongs to a nesting rule.
    fn nesting_allowed(&self) -> bool {
        self.stack
            .last()
            .is_none_or(|top| self.rules[top.rule].nested)
    }

    fn emit(&mut self, start: usize, end: usize, kind: FoldingRangeKind) {
        trace!(start, end, %kind, "folding range");
        self.ranges.push(FoldingRange::new(start, end, kind));
    }

    /// Emits the range of a block whose closing marker sits on `line`.
    fn emit_closed(&mut self, item: &StackItem, line: usize) {
        let kind = self.kind(item.rule);
        if self.rules[item.rule].fold_last_line {
            if line > item.start_line {
                self.emit(item.start_line, line, kind);
            }
        } else if line > item.start_line + 1 {
            self.emit(item.start_line, line - 1, kind);
        }
    }

    /// Pops the top block and emits it as closed on `line`.
    fn close_top(&mut self, line: usize) {
        if let Some(item) = self.stack.pop() {
            self.emit_closed(&item, line);
        }
    }

    /// Splits the top block at `line`: everything before becomes a range and
    /// the block restarts on `line`.
    fn split_top(&mut self, line: usize) {
        let Some(top) = self.stack.last() else {
            return;
        };
        let (start, kind) = (top.start_line, self.kind(top.rule));
        if line > start + 1 {
            self.emit(start, line - 1, kind);
        }
        if let Some(top) = self.stack.last_mut() {
            top.start_line = line;
        }
    }

    /// Index of the block an end marker of `rule` closes: the innermost block
    /// that is not a separator section, provided it belongs to `rule`.
    fn closing_index(&self, rule: usize) -> Option<usize> {
        let index = self.stack.iter().rposition(|item| !item.separator)?;
        (self.stack[index].rule == rule).then_some(index)
    }

    /// Separator sections nested in the block at `owner` end with that block.
    fn unwind_separators(&mut self, owner: usize, line: usize) {
        while self.stack.len() > owner + 1 {
            if let Some(section) = self.stack.pop()
                && line > section.start_line + 1
            {
                self.emit(section.start_line, line - 1, self.kind(section.rule));
            }
        }
    }

    /// Whether the end candidate at byte `start` of `text` closes the block at
    /// `owner`. Blocks with a back-referenced end only accept the mirrored text.
    fn end_accepted(&mut self, owner: usize, text: &str, start: usize) -> bool {
        let Some(expected) = &self.stack[owner].expected_end else {
            return true;
        };
        match expected.match_at(text, start) {
            Some(end) => {
                self.resume = Some(end);
                true
            }
            None => false,
        }
    }

    fn on_marker(&mut self, line: usize, text: &str, found: &MarkerMatch<'_>) -> Mode {
        let rule = found.rule;
        trace!(line, rule, role = %found.role, "marker");

        match found.role {
            MarkerRole::Begin => return self.open(line, text, found),
            MarkerRole::Middle => {
                if let Some(owner) = self.closing_index(rule) {
                    self.unwind_separators(owner, line);
                    self.split_top(line);
                }
            }
            MarkerRole::End => {
                if let Some(owner) = self.closing_index(rule)
                    && self.end_accepted(owner, text, found.start)
                {
                    self.unwind_separators(owner, line);
                    self.close_top(line);
                }
            }
            MarkerRole::Continuation => {
                if let Some(top) = self.stack.last_mut()
                    && top.rule == rule
                {
                    top.continuation_line = Some(line);
                }
            }
            MarkerRole::Docstring => {
                if let Some(owner) = self.closing_index(rule) {
                    self.unwind_separators(owner, line);
                    self.close_top(line);
                } else if self.nesting_allowed() {
                    self.stack.push(StackItem::new(rule, line));
                }
            }
            MarkerRole::Separator => {
                if self.stack.last().is_some_and(|top| top.rule == rule && top.separator) {
                    self.split_top(line);
                } else if self.nesting_allowed() {
                    let leading = self.stack.last().map_or(0, |parent| parent.start_line + 1);
                    if line > leading + 1 {
                        self.emit(leading, line - 1, self.kind(rule));
                    }
                    let mut item = StackItem::new(rule, line);
                    item.separator = true;
                    self.stack.push(item);
                }
            }
        }

        Mode::Normal
    }

    fn open(&mut self, line: usize, text: &str, found: &MarkerMatch<'_>) -> Mode {
        if !self.nesting_allowed() {
            return Mode::Normal;
        }

        let rule = found.rule;
        let rules = self.rules;
        let marker = &rules[rule];
        match &marker.shape {
            RuleShape::Paired { end_matcher, .. } => {
                let mut item = StackItem::new(rule, line);
                let master = self.master;
                item.expected_end = end_matcher
                    .as_ref()
                    .map(|matcher| matcher.expected_end(|group| master.begin_group(found, group)));
                self.stack.push(item);

                if !marker.nested {
                    return Mode::Unnested(rule);
                }
            }
            RuleShape::Continuation { .. } => {
                let chained = self.stack.last().is_some_and(|top| top.rule == rule);
                if !chained && marker.continues(text) {
                    self.stack.push(StackItem::new(rule, line));
                }
            }
            RuleShape::Docstring { .. } | RuleShape::Separator { .. } => {}
        }

        Mode::Normal
    }

    fn on_unnested(&mut self, line: usize, text: &str, found: UnnestedMatch<'_>) -> Mode {
        let Some(owner) = self.stack.len().checked_sub(1) else {
            return Mode::Normal;
        };
        let rule = self.stack[owner].rule;

        match found.role {
            MarkerRole::Middle => {
                self.split_top(line);
                Mode::Unnested(rule)
            }
            _ => {
                if self.end_accepted(owner, text, found.start) {
                    self.close_top(line);
                    Mode::Normal
                } else {
                    Mode::Unnested(rule)
                }
            }
        }
    }

    /// Ends or drops the continuation block on top once `line` is fully read.
    fn resolve_continuation(&mut self, line: usize) {
        let Some(top) = self.stack.last() else {
            return;
        };
        if !self.rules[top.rule].is_continuation() {
            return;
        }

        let (rule, start_line, recorded) = (top.rule, top.start_line, top.continuation_line);
        match recorded {
            Some(recorded) if recorded == line => {}
            Some(_) => self.close_top(line),
            None if start_line == line => {}
            None => {
                trace!(line, rule, "continuation chain broke, dropping block");
                self.stack.pop();
            }
        }
    }

    /// Open separator sections run to the end of the document; every other
    /// unterminated block is dropped.
    fn flush_separators(&mut self, line_count: usize) {
        let sections: Vec<StackItem> = self
            .stack
            .drain(..)
            .rev()
            .filter(|item| item.separator)
            .collect();
        for section in sections {
            if line_count > section.start_line + 1 {
                self.emit(section.start_line, line_count - 1, self.kind(section.rule));
            }
        }
    }
}

/// Computes the folding ranges of `document` for a compiled rule set.
///
/// Ranges come out in the order their blocks close; nested ranges are fully
/// contained in their parents. Blocks still open at the end of the document are
/// dropped, except separator sections, which extend to the last line.
pub fn compute_folding_ranges<D: Document + ?Sized>(
    rule_set: &CompiledRuleSet,
    document: &D,
) -> Vec<FoldingRange> {
    let Some(master) = rule_set.master() else {
        return Vec::new();
    };

    let scanner = Scanner {
        rules: rule_set.rules(),
        master,
        stack: Vec::new(),
        ranges: Vec::new(),
        resume: None,
    };
    scanner.run(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::markers::MarkerConfig;
    use crate::builders::master::compile;

    fn fold(configs: &[MarkerConfig], lines: &[&str]) -> Vec<(usize, usize)> {
        compile(configs)
            .compute_folding_ranges(lines)
            .into_iter()
            .map(|range| (range.start, range.end))
            .collect()
    }

    #[test]
    fn test_nested_blocks_fold_inside_out() {
        let ranges = fold(
            &[MarkerConfig::literal("{", "}")],
            &["A{", "B{", "C", "}D", "}E"],
        );
        assert_eq!(ranges, vec![(1, 3), (0, 4)]);
    }

    #[test]
    fn test_single_line_block_is_not_folded() {
        let ranges = fold(&[MarkerConfig::literal("{", "}")], &["{ }", "x"]);
        assert!(ranges.is_empty());
    }

    #[test]
    fn test_fold_last_line_disabled_excludes_end_line() {
        let config = MarkerConfig::literal("{", "}").with_fold_last_line(false);
        assert_eq!(fold(&[config.clone()], &["{", "x", "}"]), vec![(0, 1)]);
        assert!(fold(&[config], &["{", "}"]).is_empty());
    }

    #[test]
    fn test_unnested_rule_ignores_inner_begin() {
        let config = MarkerConfig::literal("/*", "*/").with_nested(false);
        let ranges = fold(&[config], &["/* outer", " /* inner", " */", "*/"]);
        assert_eq!(ranges, vec![(0, 2)]);
    }

    #[test]
    fn test_unnested_rule_hides_other_markers() {
        let ranges = fold(
            &[
                MarkerConfig::literal("/*", "*/").with_nested(false),
                MarkerConfig::literal("#region", "#endregion"),
            ],
            &["/*", "#region", "*/", "x", "#endregion"],
        );
        assert_eq!(ranges, vec![(0, 2)]);
    }

    #[test]
    fn test_markers_after_unnested_end_on_same_line_are_seen() {
        let ranges = fold(
            &[
                MarkerConfig::literal("/*", "*/").with_nested(false),
                MarkerConfig::literal("#region", "#endregion"),
            ],
            &["/*", "x */ // #region", "y", "// #endregion"],
        );
        assert_eq!(ranges, vec![(0, 1), (1, 3)]);
    }

    #[test]
    fn test_unnested_begin_and_end_on_one_line() {
        let ranges = fold(
            &[MarkerConfig::literal("/*", "*/").with_nested(false)],
            &["/* a */ /*", "b", "*/"],
        );
        assert_eq!(ranges, vec![(0, 2)]);
    }

    #[test]
    fn test_back_reference_end_must_mirror_begin() {
        let ranges = fold(
            &[MarkerConfig::regex(r"<(\w+)>", r"</\1>")],
            &["<div>", "text", "</span>", "</div>"],
        );
        assert_eq!(ranges, vec![(0, 3)]);
    }

    #[test]
    fn test_back_reference_with_unnested_rule() {
        let config = MarkerConfig::regex(r"<(\w+)>", r"</\1>").with_nested(false);
        let ranges = fold(&[config], &["<ul>", "<li>", "</li>", "</ul>"]);
        assert_eq!(ranges, vec![(0, 3)]);
    }

    #[test]
    fn test_unmatched_back_reference_is_dropped() {
        let ranges = fold(
            &[MarkerConfig::regex(r"<(\w+)>", r"</\1>")],
            &["<div>", "x", "</span>"],
        );
        assert!(ranges.is_empty());
    }

    #[test]
    fn test_trailing_back_reference_closes_block() {
        let ranges = fold(
            &[MarkerConfig::regex(r"#region (\w+)", r"#endregion \1")],
            &["#region setup", "x", "#endregion other", "#endregion setup"],
        );
        assert_eq!(ranges, vec![(0, 3)]);
    }

    #[test]
    fn test_trailing_back_reference_in_unnested_mode() {
        let config = MarkerConfig::regex(r"^begin (\w+)", r"^end \1").with_nested(false);
        let ranges = fold(&[config], &["begin foo", "x", "end bar", "end foo"]);
        assert_eq!(ranges, vec![(0, 3)]);
    }

    #[test]
    fn test_scan_resumes_after_full_back_reference_end() {
        let ranges = fold(
            &[
                MarkerConfig::regex(r"#region (\S+)", r"#endregion \1"),
                MarkerConfig::literal("{", "}"),
            ],
            &["#region {a", "x", "#endregion {a", "y", "}"],
        );
        assert_eq!(ranges, vec![(0, 2)]);
    }

    #[test]
    fn test_middle_marker_splits_block() {
        let config = MarkerConfig::literal("#if", "#endif").with_middle("#else");
        let ranges = fold(&[config], &["#if A", "a", "#else", "b", "#endif"]);
        assert_eq!(ranges, vec![(0, 1), (2, 4)]);
    }

    #[test]
    fn test_middle_marker_in_unnested_mode() {
        let config = MarkerConfig::literal("#if", "#endif")
            .with_middle("#else")
            .with_nested(false);
        let ranges = fold(&[config], &["#if A", "a", "#else", "b", "#endif"]);
        assert_eq!(ranges, vec![(0, 1), (2, 4)]);
    }

    #[test]
    fn test_continuation_block_includes_last_line() {
        let config = MarkerConfig::continued("^#define", "\\");
        let ranges = fold(
            &[config],
            &["#define FOO \\", "  bar \\", "  baz", "int x;"],
        );
        assert_eq!(ranges, vec![(0, 2)]);
    }

    #[test]
    fn test_continuation_begin_inside_own_chain_does_not_reopen() {
        let config = MarkerConfig::continued("^#def", "\\");
        let ranges = fold(&[config], &["#def A \\", "#def B \\", "x", "y"]);
        assert_eq!(ranges, vec![(0, 2)]);
    }

    #[test]
    fn test_continuation_needs_suffix_on_begin_line() {
        let config = MarkerConfig::continued("^#define", "\\");
        assert!(fold(&[config], &["#define X 1", "y \\", "z"]).is_empty());
    }

    #[test]
    fn test_continuation_without_last_line() {
        let config = MarkerConfig::continued("^#define", "\\").with_fold_last_line(false);
        let ranges = fold(&[config], &["#define A \\", "  b \\", "  c", "d"]);
        assert_eq!(ranges, vec![(0, 1)]);
    }

    #[test]
    fn test_docstring_opens_and_closes_with_same_marker() {
        let config = MarkerConfig::literal("\"\"\"", "\"\"\"").with_kind(FoldingRangeKind::Comment);
        let ranges = compile(&[config]).compute_folding_ranges(&[
            "def f():",
            "    \"\"\"",
            "    doc",
            "    \"\"\"",
            "    \"\"\"one line\"\"\"",
        ][..]);
        assert_eq!(
            ranges,
            vec![FoldingRange::new(1, 3, FoldingRangeKind::Comment)]
        );
    }

    #[test]
    fn test_non_nesting_docstring_blocks_other_begins() {
        let ranges = fold(
            &[
                MarkerConfig::literal("'''", "'''").with_nested(false),
                MarkerConfig::literal("{", "}"),
            ],
            &["'''", "{", "'''", "}"],
        );
        assert_eq!(ranges, vec![(0, 2)]);
    }

    #[test]
    fn test_separator_sections() {
        let ranges = fold(
            &[MarkerConfig::separated_by("^---$")],
            &["a", "---", "b", "---", "c"],
        );
        assert_eq!(ranges, vec![(1, 2), (3, 4)]);
    }

    #[test]
    fn test_separator_leading_section() {
        let ranges = fold(
            &[MarkerConfig::separated_by("^---$")],
            &["a", "b", "---", "c", "d"],
        );
        assert_eq!(ranges, vec![(0, 1), (2, 4)]);
    }

    #[test]
    fn test_separator_on_last_line_is_not_flushed() {
        let ranges = fold(&[MarkerConfig::separated_by("^---$")], &["a", "b", "---"]);
        assert_eq!(ranges, vec![(0, 1)]);
    }

    #[test]
    fn test_separators_nested_in_region_end_with_it() {
        let ranges = fold(
            &[
                MarkerConfig::literal("#region", "#endregion"),
                MarkerConfig::separated_by("^---$"),
            ],
            &["#region", "---", "a", "---", "b", "#endregion", "x"],
        );
        assert_eq!(ranges, vec![(1, 2), (3, 4), (0, 5)]);
    }

    #[test]
    fn test_middle_marker_ends_nested_separator_sections() {
        let ranges = fold(
            &[
                MarkerConfig::literal("#if", "#endif").with_middle("#else"),
                MarkerConfig::separated_by("^---$"),
            ],
            &["#if", "---", "a", "#else", "b", "#endif"],
        );
        assert_eq!(ranges, vec![(1, 2), (0, 2), (3, 5)]);
    }

    #[test]
    fn test_comment_nested_in_region() {
        let configs = [
            MarkerConfig::literal("#region", "#endregion"),
            MarkerConfig::literal("/*", "*/").with_kind(FoldingRangeKind::Comment),
        ];
        let ranges = compile(&configs).compute_folding_ranges(&[
            "#region",
            "/*",
            " * doc",
            " */",
            "#endregion",
        ][..]);
        assert_eq!(
            ranges,
            vec![
                FoldingRange::new(1, 3, FoldingRangeKind::Comment),
                FoldingRange::new(0, 4, FoldingRangeKind::Region),
            ]
        );
    }

    #[test]
    fn test_end_of_other_rule_does_not_close_top() {
        let ranges = fold(
            &[
                MarkerConfig::literal("{", "}"),
                MarkerConfig::literal("[", "]"),
            ],
            &["{", "[", "}", "]", "}"],
        );
        assert_eq!(ranges, vec![(1, 3), (0, 4)]);
    }

    #[test]
    fn test_declaration_order_breaks_ties() {
        let ranges = fold(
            &[
                MarkerConfig::regex("#region", "#endregion"),
                MarkerConfig::regex("#reg", "#endreg"),
            ],
            &["#region", "x", "#endregion"],
        );
        assert_eq!(ranges, vec![(0, 2)]);
    }

    #[test]
    fn test_unterminated_blocks_are_dropped() {
        let ranges = fold(&[MarkerConfig::literal("{", "}")], &["{", "{", "x", "}"]);
        assert_eq!(ranges, vec![(1, 3)]);
    }

    #[test]
    fn test_zero_width_markers_terminate() {
        let ranges = fold(&[MarkerConfig::regex(r"\bbegin", r"end\b")], &["begin", "end"]);
        assert_eq!(ranges, vec![(0, 1)]);

        let ranges = fold(&[MarkerConfig::separated_by(r"\b")], &["ab cd", "", "é"]);
        assert!(ranges.iter().all(|&(start, end)| start < end));
    }

    #[test]
    fn test_empty_rule_set_folds_nothing() {
        assert!(fold(&[], &["{", "}"]).is_empty());
        assert!(fold(&[MarkerConfig::regex("a*", "b")], &["a", "b"]).is_empty());
    }

    #[test]
    fn test_empty_document() {
        let lines: [&str; 0] = [];
        assert!(fold(&[MarkerConfig::separated_by("^---$")], &lines).is_empty());
    }
}
