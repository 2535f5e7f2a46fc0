use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;

use crate::core::range::FoldingRangeKind;

fn default_true() -> bool {
    true
}

/// One user-declared folding rule, exactly as it appears in the configuration.
///
/// Every pattern comes in two flavours: a literal string (`begin`, `end`, ...)
/// that is escaped before compilation, and a raw regular expression
/// (`beginRegex`, `endRegex`, ...) that is used verbatim. When both are given
/// the regex wins. Which fields are present decides the shape of the rule,
/// see [`MarkerConfig::shape`].
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MarkerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub begin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub begin_regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle_regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation_regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator_regex: Option<String>,
    /// Whether the line holding the closing marker is part of the fold.
    #[serde(default = "default_true")]
    pub fold_last_line: bool,
    /// Whether other markers may open while a block of this rule is open.
    #[serde(default = "default_true")]
    pub nested: bool,
    #[serde(default)]
    pub kind: FoldingRangeKind,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            begin: None,
            middle: None,
            end: None,
            continuation: None,
            separator: None,
            begin_regex: None,
            middle_regex: None,
            end_regex: None,
            continuation_regex: None,
            separator_regex: None,
            fold_last_line: true,
            nested: true,
            kind: FoldingRangeKind::Region,
        }
    }
}

/// The shape a [`MarkerConfig`] is classified into before compilation.
///
/// The classification only looks at which patterns are present. The first
/// matching shape wins, in declaration order of the variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    /// `begin` and `end` are the same pattern: the marker both opens and closes.
    Docstring,
    /// Distinct `begin` and `end` patterns, with an optional `middle`.
    Paired,
    /// A `begin` followed by lines ending with the `continuation` suffix.
    Continuation,
    /// A lone `separator` splitting the document into sections.
    Separator,
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeKind::Docstring => write!(f, "docstring"),
            ShapeKind::Paired => write!(f, "paired"),
            ShapeKind::Continuation => write!(f, "continuation"),
            ShapeKind::Separator => write!(f, "separator"),
        }
    }
}

impl MarkerConfig {
    /// Creates a paired rule from two literal markers (e.g. `{{{` / `}}}`).
    pub fn literal(begin: &str, end: &str) -> Self {
        Self {
            begin: Some(begin.to_string()),
            end: Some(end.to_string()),
            ..Self::default()
        }
    }

    /// Creates a paired rule from two regular expressions.
    pub fn regex(begin: &str, end: &str) -> Self {
        Self {
            begin_regex: Some(begin.to_string()),
            end_regex: Some(end.to_string()),
            ..Self::default()
        }
    }

    /// Creates a continuation rule: a `begin` regex whose block goes on while
    /// lines end with the literal `suffix`.
    pub fn continued(begin: &str, suffix: &str) -> Self {
        Self {
            begin_regex: Some(begin.to_string()),
            continuation: Some(suffix.to_string()),
            ..Self::default()
        }
    }

    /// Creates a separator rule from a regular expression.
    pub fn separated_by(separator: &str) -> Self {
        Self {
            separator_regex: Some(separator.to_string()),
            ..Self::default()
        }
    }

    pub fn with_middle(mut self, middle: &str) -> Self {
        self.middle = Some(middle.to_string());
        self
    }

    pub fn with_middle_regex(mut self, middle: &str) -> Self {
        self.middle_regex = Some(middle.to_string());
        self
    }

    pub fn with_nested(mut self, nested: bool) -> Self {
        self.nested = nested;
        self
    }

    pub fn with_fold_last_line(mut self, fold_last_line: bool) -> Self {
        self.fold_last_line = fold_last_line;
        self
    }

    pub fn with_kind(mut self, kind: FoldingRangeKind) -> Self {
        self.kind = kind;
        self
    }

    /// Resolves the pattern source for one role: the raw regex when present,
    /// otherwise the escaped literal.
    fn pattern(literal: &Option<String>, regex: &Option<String>) -> Option<String> {
        regex
            .clone()
            .or_else(|| literal.as_deref().map(regex::escape))
    }

    pub fn begin_pattern(&self) -> Option<String> {
        Self::pattern(&self.begin, &self.begin_regex)
    }

    pub fn middle_pattern(&self) -> Option<String> {
        Self::pattern(&self.middle, &self.middle_regex)
    }

    pub fn end_pattern(&self) -> Option<String> {
        Self::pattern(&self.end, &self.end_regex)
    }

    pub fn continuation_pattern(&self) -> Option<String> {
        Self::pattern(&self.continuation, &self.continuation_regex)
    }

    pub fn separator_pattern(&self) -> Option<String> {
        Self::pattern(&self.separator, &self.separator_regex)
    }

    /// Classifies the record into one of the rule shapes, or `None` when the
    /// record does not describe any usable rule.
    pub fn shape(&self) -> Option<ShapeKind> {
        let begin = self.begin_pattern();
        let end = self.end_pattern();

        match (begin, end) {
            (Some(begin), Some(end)) if begin == end => Some(ShapeKind::Docstring),
            (Some(_), Some(_)) => Some(ShapeKind::Paired),
            (Some(_), None) if self.continuation_pattern().is_some() => {
                Some(ShapeKind::Continuation)
            }
            _ if self.separator_pattern().is_some() => Some(ShapeKind::Separator),
            _ => None,
        }
    }

    /// Lists the declared fields that the rule's shape never looks at.
    ///
    /// This is used by the validator to point out configurations that probably
    /// do not do what their author expects (e.g. a `middle` on a separator).
    pub fn ignored_fields(&self) -> Vec<&'static str> {
        let mut ignored = Vec::new();
        let shape = self.shape();

        let middle_used = shape == Some(ShapeKind::Paired);
        let continuation_used = shape == Some(ShapeKind::Continuation);
        let separator_used = shape == Some(ShapeKind::Separator);

        if !middle_used && self.middle_pattern().is_some() {
            ignored.push("middle");
        }
        if !continuation_used && self.continuation_pattern().is_some() {
            ignored.push("continuation");
        }
        if !separator_used && self.separator_pattern().is_some() {
            ignored.push("separator");
        }
        if separator_used && self.begin_pattern().is_some() {
            ignored.push("begin");
        }
        ignored
    }
}

/// The role a pattern plays inside a rule. Every alternative of the master
/// pattern is tagged with one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerRole {
    Begin,
    Middle,
    End,
    Continuation,
    Docstring,
    Separator,
}

impl MarkerRole {
    /// Short tag used to build capture-group names.
    pub fn tag(self) -> &'static str {
        match self {
            MarkerRole::Begin => "begin",
            MarkerRole::Middle => "middle",
            MarkerRole::End => "end",
            MarkerRole::Continuation => "continuation",
            MarkerRole::Docstring => "docstring",
            MarkerRole::Separator => "separator",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "begin" => Some(MarkerRole::Begin),
            "middle" => Some(MarkerRole::Middle),
            "end" => Some(MarkerRole::End),
            "continuation" => Some(MarkerRole::Continuation),
            "docstring" => Some(MarkerRole::Docstring),
            "separator" => Some(MarkerRole::Separator),
            _ => None,
        }
    }
}

impl fmt::Display for MarkerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Why a [`MarkerConfig`] did not turn into a rule.
///
/// These never reach the caller of a fold computation: rejected rules are
/// simply left out. They are kept for logging and for the validator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkerError {
    #[error("no begin/end, begin/continuation or separator pattern")]
    MissingPattern,
    #[error("{role} pattern matches the empty string")]
    EmptyMatch { role: MarkerRole },
    #[error("invalid {role} pattern: {message}")]
    InvalidRegex { role: MarkerRole, message: String },
    #[error("end pattern refers to group {group} but the begin pattern has {available} groups")]
    UnresolvedBackReference { group: usize, available: usize },
    #[error("rule does not combine with the rules declared before it: {0}")]
    MasterConflict(String),
}

/// Group names used inside a rule's private unnested matcher.
const UNNESTED_MIDDLE: &str = "__fold_middle";
const UNNESTED_END: &str = "__fold_end";

/// One piece of an end pattern that back-references the begin pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum EndSegment {
    /// Regex source copied as-is from the end pattern.
    Pattern(String),
    /// A `\N` back-reference to group `N` of the begin pattern.
    Group(usize),
}

/// Rebuilds the exact end marker of a block from the groups its begin marker
/// captured, e.g. begin `<(\w+)>` with end `</\1>`.
///
/// The end pattern is kept as a list of regex segments and group placeholders.
/// When a block opens, the placeholders are replaced by the escaped captured
/// text, which yields an [`ExpectedEnd`] that only accepts the mirrored marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndMatcher {
    segments: Vec<EndSegment>,
}

impl EndMatcher {
    /// Splits an end pattern on its `\1`..`\99` back-references. Returns
    /// `None` when the pattern has none.
    pub fn parse(source: &str) -> Option<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();
        let mut has_group = false;

        while let Some(c) = chars.next() {
            if c != '\\' {
                literal.push(c);
                continue;
            }

            match chars.peek() {
                Some(d) if ('1'..='9').contains(d) => {
                    let mut digits = String::new();
                    while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                        digits.push(d);
                        chars.next();
                        if digits.len() == 2 {
                            break;
                        }
                    }
                    if !literal.is_empty() {
                        segments.push(EndSegment::Pattern(std::mem::take(&mut literal)));
                    }
                    // at most two ascii digits, always parses
                    let group = digits.parse().unwrap_or(0);
                    segments.push(EndSegment::Group(group));
                    has_group = true;
                }
                Some(_) => {
                    literal.push(c);
                    if let Some(escaped) = chars.next() {
                        literal.push(escaped);
                    }
                }
                None => literal.push(c),
            }
        }

        if !literal.is_empty() {
            segments.push(EndSegment::Pattern(literal));
        }

        has_group.then_some(Self { segments })
    }

    /// The end pattern with every back-reference widened to "any text", which
    /// is what the scan uses to find candidate end markers.
    pub fn generic_source(&self) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                EndSegment::Pattern(source) => source.clone(),
                EndSegment::Group(_) => "(?:.*?)".to_string(),
            })
            .collect()
    }

    /// Highest group number referenced by the end pattern.
    pub fn max_group(&self) -> usize {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                EndSegment::Group(group) => Some(*group),
                EndSegment::Pattern(_) => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Substitutes the captured begin groups into the end pattern.
    ///
    /// `group` returns the text captured by a begin group, or `None` when that
    /// group did not take part in the match (it then stands for "").
    pub fn expected_end<'t, F>(&self, group: F) -> ExpectedEnd
    where
        F: Fn(usize) -> Option<&'t str>,
    {
        let source: String = self
            .segments
            .iter()
            .map(|segment| match segment {
                EndSegment::Pattern(source) => source.clone(),
                EndSegment::Group(index) => {
                    format!("(?:{})", regex::escape(group(*index).unwrap_or("")))
                }
            })
            .collect();

        ExpectedEnd::new(source)
    }
}

/// The only end marker that may close a block opened by a back-referencing
/// begin marker.
///
/// The scan finds end candidates with the widened pattern, whose `(?:.*?)`
/// may stop short of the captured text. The expected end is therefore matched
/// against the line itself, starting where the candidate starts.
#[derive(Debug, Clone)]
pub struct ExpectedEnd {
    source: String,
    matcher: Option<Regex>,
}

impl ExpectedEnd {
    fn new(source: String) -> Self {
        let matcher = match Regex::new(&format!("(?:{source})")) {
            Ok(matcher) => Some(matcher),
            Err(e) => {
                debug!(%source, error = %e, "expected end does not compile, comparing text");
                None
            }
        };
        Self { source, matcher }
    }

    /// Matches the expected marker at exactly byte `start` of `line`, returning
    /// the byte offset where it ends.
    pub fn match_at(&self, line: &str, start: usize) -> Option<usize> {
        match &self.matcher {
            Some(matcher) => matcher
                .find_at(line, start)
                .filter(|found| found.start() == start)
                .map(|found| found.end()),
            None => line
                .get(start..)
                .filter(|rest| rest.starts_with(&self.source))
                .map(|_| start + self.source.len()),
        }
    }
}

/// The compiled matchers of a rule, one variant per shape.
#[derive(Debug, Clone)]
pub enum RuleShape {
    Paired {
        begin: Regex,
        middle: Option<Regex>,
        end: Regex,
        /// `middle|end` only, present when the rule does not nest.
        unnested: Option<Regex>,
        end_matcher: Option<EndMatcher>,
    },
    Docstring {
        delimiter: Regex,
    },
    Continuation {
        begin: Regex,
        /// The continuation suffix, anchored to the end of the line.
        continuation: Regex,
    },
    Separator {
        separator: Regex,
    },
}

/// A match found by a rule's unnested matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnnestedMatch<'t> {
    pub role: MarkerRole,
    pub start: usize,
    pub end: usize,
    pub text: &'t str,
}

/// A validated, compiled marker rule. Immutable once built.
#[derive(Debug, Clone)]
pub struct MarkerRule {
    pub shape: RuleShape,
    pub nested: bool,
    pub fold_last_line: bool,
    pub kind: FoldingRangeKind,
}

/// The `RuleCompiler` trait turns configuration records into rules.
///
/// It sits between configuration and scanning so callers that only hold
/// configuration records (the validator, the cache) never need to know how a
/// shape is compiled.
pub trait RuleCompiler {
    /// Compiles one record into a rule.
    ///
    /// # Returns
    /// The compiled `MarkerRule`, or the `MarkerError` explaining why the record
    /// cannot be used.
    fn compile_rule(&self) -> Result<MarkerRule, MarkerError>;
}

impl RuleCompiler for MarkerConfig {
    fn compile_rule(&self) -> Result<MarkerRule, MarkerError> {
        MarkerRule::compile(self)
    }
}

/// Compiles one pattern, rejecting sources that do not parse and sources that
/// match the empty string (those would never move the scan forward).
fn compile_pattern(role: MarkerRole, source: &str) -> Result<Regex, MarkerError> {
    let regex = Regex::new(source).map_err(|e| MarkerError::InvalidRegex {
        role,
        message: e.to_string(),
    })?;

    if regex.is_match("") {
        return Err(MarkerError::EmptyMatch { role });
    }
    Ok(regex)
}

impl MarkerRule {
    /// Classifies and compiles a configuration record.
    ///
    /// # Arguments
    /// * `config`: The record to compile.
    ///
    /// # Returns
    /// `Result<MarkerRule, MarkerError>`; an error means the record contributes
    /// no rule at all.
    pub fn compile(config: &MarkerConfig) -> Result<Self, MarkerError> {
        let shape = match config.shape() {
            Some(ShapeKind::Docstring) => {
                let source = config.begin_pattern().ok_or(MarkerError::MissingPattern)?;
                RuleShape::Docstring {
                    delimiter: compile_pattern(MarkerRole::Docstring, &source)?,
                }
            }
            Some(ShapeKind::Paired) => Self::compile_paired(config)?,
            Some(ShapeKind::Continuation) => {
                let begin = config.begin_pattern().ok_or(MarkerError::MissingPattern)?;
                let suffix = config
                    .continuation_pattern()
                    .ok_or(MarkerError::MissingPattern)?;
                compile_pattern(MarkerRole::Continuation, &suffix)?;

                RuleShape::Continuation {
                    begin: compile_pattern(MarkerRole::Begin, &begin)?,
                    continuation: compile_pattern(
                        MarkerRole::Continuation,
                        &format!("(?:{suffix})$"),
                    )?,
                }
            }
            Some(ShapeKind::Separator) => {
                let source = config
                    .separator_pattern()
                    .ok_or(MarkerError::MissingPattern)?;
                RuleShape::Separator {
                    separator: compile_pattern(MarkerRole::Separator, &source)?,
                }
            }
            None => return Err(MarkerError::MissingPattern),
        };

        Ok(Self {
            shape,
            nested: config.nested,
            fold_last_line: config.fold_last_line,
            kind: config.kind,
        })
    }

    fn compile_paired(config: &MarkerConfig) -> Result<RuleShape, MarkerError> {
        let begin_source = config.begin_pattern().ok_or(MarkerError::MissingPattern)?;
        let end_source = config.end_pattern().ok_or(MarkerError::MissingPattern)?;

        let begin = compile_pattern(MarkerRole::Begin, &begin_source)?;

        let end_matcher = EndMatcher::parse(&end_source);
        let end = match &end_matcher {
            Some(matcher) => {
                let available = begin.captures_len() - 1;
                if matcher.max_group() > available {
                    return Err(MarkerError::UnresolvedBackReference {
                        group: matcher.max_group(),
                        available,
                    });
                }
                compile_pattern(MarkerRole::End, &matcher.generic_source())?
            }
            None => compile_pattern(MarkerRole::End, &end_source)?,
        };

        let middle = match config.middle_pattern() {
            Some(source) => match compile_pattern(MarkerRole::Middle, &source) {
                Ok(middle) => Some(middle),
                Err(MarkerError::EmptyMatch { .. }) => {
                    debug!(%source, "ignoring middle pattern that matches the empty string");
                    None
                }
                Err(e) => return Err(e),
            },
            None => None,
        };

        let unnested = if config.nested {
            None
        } else {
            let source = match &middle {
                Some(middle) => format!(
                    "(?P<{UNNESTED_MIDDLE}>{})|(?P<{UNNESTED_END}>{})",
                    middle.as_str(),
                    end.as_str()
                ),
                None => format!("(?P<{UNNESTED_END}>{})", end.as_str()),
            };
            Some(
                Regex::new(&source).map_err(|e| MarkerError::InvalidRegex {
                    role: MarkerRole::End,
                    message: e.to_string(),
                })?,
            )
        };

        Ok(RuleShape::Paired {
            begin,
            middle,
            end,
            unnested,
            end_matcher,
        })
    }

    /// The `(role, source)` alternatives this rule contributes to the master
    /// pattern, in the order they must be tried.
    ///
    /// A rule that does not nest only contributes its begin marker: its middle
    /// and end are searched by its own unnested matcher.
    pub fn master_alternatives(&self) -> Vec<(MarkerRole, &str)> {
        match &self.shape {
            RuleShape::Paired {
                begin, middle, end, ..
            } => {
                let mut alternatives = vec![(MarkerRole::Begin, begin.as_str())];
                if self.nested {
                    if let Some(middle) = middle {
                        alternatives.push((MarkerRole::Middle, middle.as_str()));
                    }
                    alternatives.push((MarkerRole::End, end.as_str()));
                }
                alternatives
            }
            RuleShape::Docstring { delimiter } => {
                vec![(MarkerRole::Docstring, delimiter.as_str())]
            }
            RuleShape::Continuation {
                begin,
                continuation,
            } => vec![
                (MarkerRole::Begin, begin.as_str()),
                (MarkerRole::Continuation, continuation.as_str()),
            ],
            RuleShape::Separator { separator } => {
                vec![(MarkerRole::Separator, separator.as_str())]
            }
        }
    }

    pub fn is_continuation(&self) -> bool {
        matches!(self.shape, RuleShape::Continuation { .. })
    }

    /// Whether `line` ends with this rule's continuation suffix. Always false
    /// for rules that are not continuation rules.
    pub fn continues(&self, line: &str) -> bool {
        match &self.shape {
            RuleShape::Continuation { continuation, .. } => continuation.is_match(line),
            _ => false,
        }
    }

    /// Runs the unnested matcher (middle|end of this rule only) from `offset`.
    pub fn find_unnested<'t>(&self, text: &'t str, offset: usize) -> Option<UnnestedMatch<'t>> {
        let RuleShape::Paired {
            unnested: Some(unnested),
            ..
        } = &self.shape
        else {
            return None;
        };

        let captures = unnested.captures_at(text, offset)?;
        let (role, found) = match captures.name(UNNESTED_MIDDLE) {
            Some(found) => (MarkerRole::Middle, found),
            None => (MarkerRole::End, captures.name(UNNESTED_END)?),
        };

        Some(UnnestedMatch {
            role,
            start: found.start(),
            end: found.end(),
            text: found.as_str(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_markers_are_escaped() {
        let rule = MarkerRule::compile(&MarkerConfig::literal("/*", "*/")).unwrap();
        let alternatives = rule.master_alternatives();
        assert_eq!(alternatives[0], (MarkerRole::Begin, r"/\*"));
        assert_eq!(alternatives[1], (MarkerRole::End, r"\*/"));
    }

    #[test]
    fn test_regex_takes_precedence_over_literal() {
        let config = MarkerConfig {
            begin: Some("{".to_string()),
            begin_regex: Some(r"^\s*#region".to_string()),
            end: Some("}".to_string()),
            ..MarkerConfig::default()
        };
        assert_eq!(config.begin_pattern().as_deref(), Some(r"^\s*#region"));
    }

    #[test]
    fn test_shape_classification() {
        assert_eq!(
            MarkerConfig::literal("\"\"\"", "\"\"\"").shape(),
            Some(ShapeKind::Docstring)
        );
        assert_eq!(MarkerConfig::literal("{", "}").shape(), Some(ShapeKind::Paired));
        assert_eq!(
            MarkerConfig::continued("^#define", "\\").shape(),
            Some(ShapeKind::Continuation)
        );
        assert_eq!(
            MarkerConfig::separated_by("^---$").shape(),
            Some(ShapeKind::Separator)
        );
        assert_eq!(MarkerConfig::default().shape(), None);
    }

    #[test]
    fn test_empty_match_patterns_are_rejected() {
        let err = MarkerRule::compile(&MarkerConfig::regex("a*", "b")).unwrap_err();
        assert_eq!(
            err,
            MarkerError::EmptyMatch {
                role: MarkerRole::Begin
            }
        );

        let err = MarkerRule::compile(&MarkerConfig::separated_by("^")).unwrap_err();
        assert!(matches!(err, MarkerError::EmptyMatch { .. }));
    }

    #[test]
    fn test_invalid_regex_is_rejected() {
        let err = MarkerRule::compile(&MarkerConfig::regex("(", ")")).unwrap_err();
        assert!(matches!(
            err,
            MarkerError::InvalidRegex {
                role: MarkerRole::Begin,
                ..
            }
        ));
    }

    #[test]
    fn test_missing_pattern_is_rejected() {
        let config = MarkerConfig {
            begin: Some("{".to_string()),
            ..MarkerConfig::default()
        };
        assert_eq!(
            MarkerRule::compile(&config).unwrap_err(),
            MarkerError::MissingPattern
        );
    }

    #[test]
    fn test_empty_middle_is_dropped_but_rule_kept() {
        let config = MarkerConfig::literal("{", "}").with_middle_regex("x*");
        let rule = MarkerRule::compile(&config).unwrap();
        assert!(matches!(rule.shape, RuleShape::Paired { middle: None, .. }));
    }

    #[test]
    fn test_continuation_is_anchored_to_line_end() {
        let rule = MarkerRule::compile(&MarkerConfig::continued("^#define", "\\")).unwrap();
        assert!(rule.continues("#define X \\"));
        assert!(!rule.continues("#define X \\ 1"));
    }

    #[test]
    fn test_unnested_rules_only_expose_begin() {
        let rule =
            MarkerRule::compile(&MarkerConfig::literal("/*", "*/").with_nested(false)).unwrap();
        let roles: Vec<MarkerRole> = rule
            .master_alternatives()
            .into_iter()
            .map(|(role, _)| role)
            .collect();
        assert_eq!(roles, vec![MarkerRole::Begin]);

        let found = rule.find_unnested("a /* b */ c", 4).unwrap();
        assert_eq!(found.role, MarkerRole::End);
        assert_eq!((found.start, found.end), (7, 9));
    }

    #[test]
    fn test_unnested_matcher_reports_middle() {
        let config = MarkerConfig::literal("#if", "#endif")
            .with_middle("#else")
            .with_nested(false);
        let rule = MarkerRule::compile(&config).unwrap();
        assert_eq!(rule.find_unnested("#else", 0).unwrap().role, MarkerRole::Middle);
        assert_eq!(rule.find_unnested("#endif", 0).unwrap().role, MarkerRole::End);
    }

    #[test]
    fn test_end_matcher_parses_back_references() {
        let matcher = EndMatcher::parse(r"</\1>").unwrap();
        assert_eq!(matcher.generic_source(), "</(?:.*?)>");
        assert_eq!(matcher.max_group(), 1);
        assert!(EndMatcher::parse(r"\}\s*end").is_none());
    }

    #[test]
    fn test_expected_end_mirrors_begin_capture() {
        let matcher = EndMatcher::parse(r"</\1>").unwrap();
        let expected = matcher.expected_end(|group| (group == 1).then_some("div"));
        assert_eq!(expected.match_at("</div>", 0), Some(6));
        assert_eq!(expected.match_at("x </div>", 2), Some(8));
        assert_eq!(expected.match_at("</span>", 0), None);
        assert_eq!(expected.match_at("x </div>", 0), None);
    }

    #[test]
    fn test_expected_end_escapes_captured_text() {
        let matcher = EndMatcher::parse(r"end \1").unwrap();
        let expected = matcher.expected_end(|_| Some("a.b"));
        assert_eq!(expected.match_at("end a.b", 0), Some(7));
        assert_eq!(expected.match_at("end axb", 0), None);
    }

    #[test]
    fn test_expected_end_covers_trailing_back_reference() {
        let matcher = EndMatcher::parse(r"#endregion \1").unwrap();
        let expected = matcher.expected_end(|_| Some("setup"));
        assert_eq!(expected.match_at("// #endregion setup", 3), Some(19));
        assert_eq!(expected.match_at("#endregion other", 0), None);
    }

    #[test]
    fn test_back_reference_to_missing_group_is_rejected() {
        let err = MarkerRule::compile(&MarkerConfig::regex("<div>", r"</\1>")).unwrap_err();
        assert_eq!(
            err,
            MarkerError::UnresolvedBackReference {
                group: 1,
                available: 0
            }
        );
    }

    #[test]
    fn test_ignored_fields_are_reported() {
        let config = MarkerConfig {
            middle: Some("--".to_string()),
            ..MarkerConfig::separated_by("^---$")
        };
        assert_eq!(config.ignored_fields(), vec!["middle"]);
        assert!(MarkerConfig::literal("{", "}").ignored_fields().is_empty());
    }

    #[test]
    fn test_config_deserializes_camel_case_with_defaults() {
        let config: MarkerConfig = serde_json::from_str(
            r#"{ "beginRegex": "^#if", "endRegex": "^#endif", "kind": "comment" }"#,
        )
        .unwrap();
        assert_eq!(config.begin_regex.as_deref(), Some("^#if"));
        assert!(config.nested);
        assert!(config.fold_last_line);
        assert_eq!(config.kind, FoldingRangeKind::Comment);
    }
}
