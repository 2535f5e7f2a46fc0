use regex::{Captures, Regex};
use tracing::{debug, warn};

use crate::builders::markers::{MarkerConfig, MarkerError, MarkerRole, MarkerRule, RuleCompiler};
use crate::core::document::Document;
use crate::core::engine;
use crate::core::range::FoldingRange;

/// Every capture group the master pattern owns is named
/// `__fold_<role>_<rule index>`.
const GROUP_PREFIX: &str = "__fold_";

fn group_name(role: MarkerRole, rule: usize) -> String {
    format!("{GROUP_PREFIX}{}_{rule}", role.tag())
}

fn parse_group_name(name: &str) -> Option<(MarkerRole, usize)> {
    let rest = name.strip_prefix(GROUP_PREFIX)?;
    let (tag, rule) = rest.rsplit_once('_')?;
    Some((MarkerRole::from_tag(tag)?, rule.parse().ok()?))
}

#[derive(Debug, Clone, Copy)]
struct MasterGroup {
    capture_index: usize,
    role: MarkerRole,
    rule: usize,
}

/// One match of the master pattern: which rule fired, in which role, where.
#[derive(Debug)]
pub struct MarkerMatch<'t> {
    pub role: MarkerRole,
    pub rule: usize,
    pub start: usize,
    pub end: usize,
    captures: Captures<'t>,
}

impl<'t> MarkerMatch<'t> {
    /// The whole matched text.
    pub fn as_str(&self) -> &'t str {
        self.captures.get(0).map_or("", |m| m.as_str())
    }
}

/// The alternation of every rule's markers, scanned once per line position.
///
/// Results are identified by the named group that took part in the match,
/// never by numeric position, so any number of independent grammars can share
/// one pass. The numeric position of each rule's begin group is still recorded:
/// the groups a begin pattern captures follow it directly, which is what
/// back-referencing end markers need.
#[derive(Debug, Clone)]
pub struct MasterPattern {
    regex: Regex,
    groups: Vec<MasterGroup>,
    begin_groups: Vec<Option<usize>>,
}

impl MasterPattern {
    /// Builds the alternation for `rules`, using each rule's position in the
    /// slice as its identity.
    ///
    /// # Returns
    /// `Err` when the combined source does not compile, which happens when two
    /// rules declare the same named group.
    pub fn build(rules: &[MarkerRule]) -> Result<Self, regex::Error> {
        let alternatives: Vec<String> = rules
            .iter()
            .enumerate()
            .flat_map(|(index, rule)| {
                rule.master_alternatives()
                    .into_iter()
                    .map(move |(role, source)| format!("(?P<{}>{source})", group_name(role, index)))
            })
            .collect();

        let regex = Regex::new(&alternatives.join("|"))?;

        let mut groups = Vec::new();
        let mut begin_groups = vec![None; rules.len()];
        for (capture_index, name) in regex.capture_names().enumerate() {
            let Some((role, rule)) = name.and_then(parse_group_name) else {
                continue;
            };
            if rule >= rules.len() {
                continue;
            }
            if role == MarkerRole::Begin {
                begin_groups[rule] = Some(capture_index);
            }
            groups.push(MasterGroup {
                capture_index,
                role,
                rule,
            });
        }

        Ok(Self {
            regex,
            groups,
            begin_groups,
        })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Finds the next marker in `text` at or after byte `offset`.
    pub fn find_at<'t>(&self, text: &'t str, offset: usize) -> Option<MarkerMatch<'t>> {
        let captures = self.regex.captures_at(text, offset)?;
        let group = self
            .groups
            .iter()
            .find(|group| captures.get(group.capture_index).is_some())?;
        let whole = captures.get(0)?;

        Some(MarkerMatch {
            role: group.role,
            rule: group.rule,
            start: whole.start(),
            end: whole.end(),
            captures,
        })
    }

    /// Text captured by group `group` (1-based) of the begin pattern of the
    /// rule that produced `found`.
    pub fn begin_group<'t>(&self, found: &MarkerMatch<'t>, group: usize) -> Option<&'t str> {
        let base = self.begin_groups.get(found.rule).copied().flatten()?;
        found.captures.get(base + group).map(|m| m.as_str())
    }
}

/// A configuration record that did not make it into the rule set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRule {
    /// Position of the record in the configuration list.
    pub position: usize,
    pub reason: MarkerError,
}

/// The immutable result of compiling a list of marker configurations.
///
/// It can be shared between threads and reused for any number of documents.
#[derive(Debug, Clone, Default)]
pub struct CompiledRuleSet {
    rules: Vec<MarkerRule>,
    master: Option<MasterPattern>,
    rejected: Vec<RejectedRule>,
}

impl CompiledRuleSet {
    pub fn rules(&self) -> &[MarkerRule] {
        &self.rules
    }

    pub fn master(&self) -> Option<&MasterPattern> {
        self.master.as_ref()
    }

    pub fn rejected(&self) -> &[RejectedRule] {
        &self.rejected
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Computes the folding ranges of `document`. See [`engine::compute_folding_ranges`].
    pub fn compute_folding_ranges<D: Document + ?Sized>(&self, document: &D) -> Vec<FoldingRange> {
        engine::compute_folding_ranges(self, document)
    }
}

/// Compiles marker configurations into a rule set.
///
/// Never fails: records that cannot be compiled, or whose patterns clash with
/// the records declared before them, are left out and listed in
/// [`CompiledRuleSet::rejected`].
pub fn compile(configs: &[MarkerConfig]) -> CompiledRuleSet {
    let mut candidates = Vec::new();
    let mut rejected = Vec::new();

    for (position, config) in configs.iter().enumerate() {
        match config.compile_rule() {
            Ok(rule) => candidates.push((position, rule)),
            Err(reason) => {
                debug!(position, %reason, "dropping marker rule");
                rejected.push(RejectedRule { position, reason });
            }
        }
    }

    let rules: Vec<MarkerRule> = candidates.iter().map(|(_, rule)| rule.clone()).collect();
    let (rules, master) = match MasterPattern::build(&rules) {
        Ok(master) => (rules, Some(master)),
        Err(e) => {
            warn!(error = %e, "marker rules do not combine, retrying one by one");
            build_incrementally(candidates, &mut rejected)
        }
    };

    rejected.sort_by_key(|rejected| rejected.position);
    debug!(
        rules = rules.len(),
        rejected = rejected.len(),
        "compiled marker rules"
    );

    let master = master.filter(|_| !rules.is_empty());
    CompiledRuleSet {
        rules,
        master,
        rejected,
    }
}

/// Adds rules to the alternation one at a time, dropping each rule that makes
/// it fail to compile.
fn build_incrementally(
    candidates: Vec<(usize, MarkerRule)>,
    rejected: &mut Vec<RejectedRule>,
) -> (Vec<MarkerRule>, Option<MasterPattern>) {
    let mut accepted: Vec<MarkerRule> = Vec::new();
    let mut master = None;

    for (position, rule) in candidates {
        accepted.push(rule);
        match MasterPattern::build(&accepted) {
            Ok(built) => master = Some(built),
            Err(e) => {
                accepted.pop();
                debug!(position, error = %e, "dropping marker rule");
                rejected.push(RejectedRule {
                    position,
                    reason: MarkerError::MasterConflict(e.to_string()),
                });
            }
        }
    }

    (accepted, master)
}
