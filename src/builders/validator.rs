use anyhow::Result;

use crate::builders::markers::{MarkerConfig, RuleCompiler};
use crate::builders::master;
use crate::core::config::{self, FoldingConfig};

/// The outcome of validating a configuration.
///
/// `errors` are problems that make rules unusable: the folding engine silently
/// drops those rules. `warnings` point at configurations that work but are
/// probably not what their author meant.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// `true` when neither errors nor warnings were found.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    fn extend(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

/// The `ConfigValidator` trait defines the public interface for validating the
/// folding configuration.
///
/// This allows different validation strategies (strict, permissive) to share
/// a common set of methods.
pub trait ConfigValidator {
    /// Performs a full validation of the `FoldingConfig`.
    ///
    /// # Arguments
    /// * `config`: The `FoldingConfig` to be validated.
    ///
    /// # Returns
    /// A `Result<ValidationReport>` listing every error and warning found.
    fn validate_config(&self, config: &FoldingConfig) -> Result<ValidationReport>;

    /// Validates the rules configured for a single language.
    ///
    /// # Arguments
    /// * `language`: The language key the rules are configured under.
    /// * `rules`: The marker rules, in declaration order.
    ///
    /// # Returns
    /// A `ValidationReport` whose messages name the language and the rule index.
    fn validate_rules(&self, language: &str, rules: &[MarkerConfig]) -> ValidationReport;
}

/// The `StandardValidator` is the validator used by the `validate` command.
///
/// It compiles every language's rules exactly as the folding engine would, so
/// that each rule the engine would drop is reported together with the reason.
pub struct StandardValidator;

impl StandardValidator {
    /// Creates a new instance of `StandardValidator`.
    pub fn new() -> Self {
        Self
    }

    /// Checks a rule for fields its shape never reads.
    ///
    /// # Arguments
    /// * `rule`: The marker rule to inspect.
    ///
    /// # Returns
    /// A `Vec<String>` with one message per ignored field.
    fn check_ignored_fields(&self, rule: &MarkerConfig) -> Vec<String> {
        let Some(shape) = rule.shape() else {
            return Vec::new();
        };

        rule.ignored_fields()
            .into_iter()
            .map(|field| format!("'{field}' is ignored by a {shape} rule"))
            .collect()
    }
}

impl Default for StandardValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigValidator for StandardValidator {
    /// Validates the entire configuration.
    ///
    /// It checks:
    /// - Version compatibility.
    /// - Every language's rules, see [`ConfigValidator::validate_rules`].
    /// - That languages without rules of their own can fall back on `"*"`.
    fn validate_config(&self, config: &FoldingConfig) -> Result<ValidationReport> {
        let mut report = ValidationReport::default();

        if config.version != config::CONFIG_VERSION {
            report
                .errors
                .push(format!("Unsupported config version: {}", config.version));
        }

        for (language, rules) in &config.rules {
            report.extend(self.validate_rules(language, rules));
        }

        if !config.rules.is_empty() && !config.rules.contains_key(config::DEFAULT_LANGUAGE) {
            report.warnings.push(format!(
                "No '{}' rules: languages without their own rules fold nothing",
                config::DEFAULT_LANGUAGE
            ));
        }

        let default_language = &config.global_settings.default_language;
        if default_language != config::DEFAULT_LANGUAGE
            && !config.rules.contains_key(default_language)
        {
            report.warnings.push(format!(
                "Default language '{default_language}' has no rules configured"
            ));
        }

        Ok(report)
    }

    fn validate_rules(&self, language: &str, rules: &[MarkerConfig]) -> ValidationReport {
        let mut report = ValidationReport::default();

        if rules.is_empty() {
            report
                .warnings
                .push(format!("[{language}] no rules configured"));
            return report;
        }

        // Compiling the whole list also catches rules that only fail once
        // combined with the others.
        let compiled = master::compile(rules);
        for rejected in compiled.rejected() {
            report.errors.push(format!(
                "[{language}] rule #{}: {}",
                rejected.position, rejected.reason
            ));
        }

        for (index, rule) in rules.iter().enumerate() {
            for issue in self.check_ignored_fields(rule) {
                report.warnings.push(format!("[{language}] rule #{index}: {issue}"));
            }
            if rule.compile_rule().is_ok() && rule.begin_pattern().as_deref() == Some(".*") {
                report.warnings.push(format!(
                    "[{language}] rule #{index}: begin pattern '.*' opens a block on every line"
                ));
            }
        }

        report
    }
}
