use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use crate::builders::master::{self, CompiledRuleSet};
use crate::core::config::FoldingConfig;

/// Compiled rule sets, one per language, shared between any number of threads.
///
/// Compiling a rule set builds every regex of the language's rules, so it is
/// done once per language and reused for every document. The cache must be
/// invalidated whenever the configuration it was filled from changes.
#[derive(Debug, Default)]
pub struct RuleSetCache {
    rule_sets: DashMap<String, Arc<CompiledRuleSet>>,
}

impl RuleSetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the rule set of `language`, compiling it from `config` on first use.
    pub fn get_or_compile(&self, language: &str, config: &FoldingConfig) -> Arc<CompiledRuleSet> {
        if let Some(rule_set) = self.rule_sets.get(language) {
            return Arc::clone(rule_set.value());
        }

        let entry = self.rule_sets.entry(language.to_string()).or_insert_with(|| {
            debug!(language, "compiling rule set");
            Arc::new(master::compile(config.rules_for(language)))
        });
        Arc::clone(entry.value())
    }

    pub fn invalidate(&self) {
        self.rule_sets.clear();
    }

    pub fn len(&self) -> usize {
        self.rule_sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rule_sets.is_empty()
    }
}
