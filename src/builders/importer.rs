use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::builders::markers::MarkerConfig;
use crate::core::config::DEFAULT_LANGUAGE;

/// The settings key editors store explicit folding rules under.
pub const SETTINGS_KEY: &str = "explicitFolding.rules";

/// A trait that defines the behavior for importing marker rules from a source.
///
/// This trait allows different importers (editor settings, shared rule
/// collections) to be used interchangeably by the `ConfigManager`.
pub trait RuleImporter {
    /// Imports rules from a file and returns them grouped by language.
    ///
    /// # Arguments
    /// * `file_path`: The path to the file to be imported.
    /// * `language`: The language to file the rules under when the source does
    ///   not say which language they belong to.
    ///
    /// # Returns
    /// A `Result<BTreeMap<String, Vec<MarkerConfig>>>` mapping language
    /// identifiers to rules, ready to be merged into the configuration.
    fn import_from_file(
        &self,
        file_path: &Path,
        language: Option<&str>,
    ) -> Result<BTreeMap<String, Vec<MarkerConfig>>>;
}

/// Imports rules from editor settings files.
///
/// Two layouts are understood:
/// - a settings object, with rules under `"explicitFolding.rules"` keyed by
///   language (`"[rust]"` or `"rust"`, and `"*"` for every language), or under
///   a per-language section such as `"[rust]": { "explicitFolding.rules": [...] }`;
/// - a bare list of rules, in JSON or YAML, filed under the requested language.
///
/// Records that are not valid rules are skipped with a warning.
pub struct SettingsImporter;

impl RuleImporter for SettingsImporter {
    fn import_from_file(
        &self,
        file_path: &Path,
        language: Option<&str>,
    ) -> Result<BTreeMap<String, Vec<MarkerConfig>>> {
        let content = fs::read_to_string(file_path).context("Failed to read import file")?;
        let is_yaml = file_path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| matches!(ext, "yaml" | "yml"));

        let value: Value = if is_yaml {
            serde_yaml::from_str(&content).context("Failed to parse YAML import file")?
        } else {
            serde_json::from_str(&content).context("Failed to parse JSON import file")?
        };

        self.import_value(&value, language)
    }
}

impl SettingsImporter {
    /// Constructs a new `SettingsImporter` instance.
    pub fn new() -> Self {
        Self
    }

    /// Extracts rules from an already parsed settings document.
    ///
    /// # Arguments
    /// * `value`: The parsed settings, either an object or a list of rules.
    /// * `language`: The language bare lists are filed under (defaults to `"*"`).
    ///
    /// # Returns
    /// The rules found, grouped by normalized language identifier.
    pub fn import_value(
        &self,
        value: &Value,
        language: Option<&str>,
    ) -> Result<BTreeMap<String, Vec<MarkerConfig>>> {
        let mut result: BTreeMap<String, Vec<MarkerConfig>> = BTreeMap::new();

        match value {
            Value::Array(_) => {
                let language = language.unwrap_or(DEFAULT_LANGUAGE);
                result.insert(normalize_language(language), self.parse_rules(value));
            }
            Value::Object(settings) => {
                if let Some(rules) = settings.get(SETTINGS_KEY) {
                    self.collect(rules, language, &mut result);
                }

                // Language-specific sections: "[rust]": { "explicitFolding.rules": [...] }
                for (key, section) in settings {
                    if let Some(rules) = section.get(SETTINGS_KEY)
                        && is_language_section(key)
                    {
                        let parsed = self.parse_rules(rules);
                        result
                            .entry(normalize_language(key))
                            .or_default()
                            .extend(parsed);
                    }
                }
            }
            _ => anyhow::bail!("Expected a settings object or a list of rules"),
        }

        result.retain(|_, rules| !rules.is_empty());
        if result.is_empty() {
            anyhow::bail!("No folding rules found in import file");
        }
        Ok(result)
    }

    /// Handles the value of a top-level `"explicitFolding.rules"` entry: either
    /// a map keyed by language or a plain list.
    fn collect(
        &self,
        rules: &Value,
        language: Option<&str>,
        result: &mut BTreeMap<String, Vec<MarkerConfig>>,
    ) {
        match rules {
            Value::Object(by_language) => {
                for (key, value) in by_language {
                    let parsed = self.parse_rules(value);
                    result
                        .entry(normalize_language(key))
                        .or_default()
                        .extend(parsed);
                }
            }
            other => {
                let language = normalize_language(language.unwrap_or(DEFAULT_LANGUAGE));
                let parsed = self.parse_rules(other);
                result.entry(language).or_default().extend(parsed);
            }
        }
    }

    /// Parses a list of rule records, or a single record.
    fn parse_rules(&self, value: &Value) -> Vec<MarkerConfig> {
        let records: Vec<&Value> = match value {
            Value::Array(items) => items.iter().collect(),
            Value::Object(_) => vec![value],
            _ => Vec::new(),
        };

        records
            .into_iter()
            .enumerate()
            .filter_map(|(index, record)| {
                match serde_json::from_value::<MarkerConfig>(record.clone()) {
                    Ok(rule) if rule.shape().is_some() => Some(rule),
                    Ok(_) => {
                        warn!(index, "skipping rule without usable patterns");
                        None
                    }
                    Err(e) => {
                        warn!(index, error = %e, "skipping malformed rule");
                        None
                    }
                }
            })
            .inspect(|rule| debug!(?rule, "imported rule"))
            .collect()
    }
}

impl Default for SettingsImporter {
    fn default() -> Self {
        Self::new()
    }
}

fn is_language_section(key: &str) -> bool {
    key.len() > 2 && key.starts_with('[') && key.ends_with(']')
}

/// `"[rust]"` becomes `"rust"`; everything else is only trimmed.
fn normalize_language(key: &str) -> String {
    let key = key.trim();
    if is_language_section(key) {
        key[1..key.len() - 1].trim().to_string()
    } else {
        key.to_string()
    }
}
