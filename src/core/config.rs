use anyhow::{Context, Result};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::builders::importer::{RuleImporter, SettingsImporter};
use crate::builders::markers::{MarkerConfig, RuleCompiler};
use crate::builders::validator::{ConfigValidator, StandardValidator};
use crate::core::range::FoldingRangeKind;

pub const CONFIG_FILE_NAME: &str = ".explicit-folding.toml";
pub const CONFIG_VERSION: &str = "1.0";

/// The language key whose rules apply to every language without rules of its own.
pub const DEFAULT_LANGUAGE: &str = "*";

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
    Toml,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct GlobalSettings {
    pub default_language: String,
    pub output_format: OutputFormat,
    pub verbose: bool,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            default_language: DEFAULT_LANGUAGE.to_string(),
            output_format: OutputFormat::Text,
            verbose: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FoldingConfig {
    pub version: String,
    #[serde(default)]
    pub rules: BTreeMap<String, Vec<MarkerConfig>>,
    #[serde(default)]
    pub global_settings: GlobalSettings,
}

impl Default for FoldingConfig {
    fn default() -> Self {
        let mut rules = BTreeMap::new();
        rules.insert(
            DEFAULT_LANGUAGE.to_string(),
            vec![
                MarkerConfig::literal("{{{", "}}}"),
                MarkerConfig::regex(r"#region\b", r"#endregion\b"),
            ],
        );

        Self {
            version: CONFIG_VERSION.to_string(),
            rules,
            global_settings: GlobalSettings::default(),
        }
    }
}

impl FoldingConfig {
    /// An empty configuration: no rules at all.
    pub fn empty() -> Self {
        Self {
            rules: BTreeMap::new(),
            ..Self::default()
        }
    }

    /// The rules for `language`, or the `"*"` rules when that language has
    /// none configured.
    pub fn rules_for(&self, language: &str) -> &[MarkerConfig] {
        self.rules
            .get(language)
            .filter(|rules| !rules.is_empty())
            .or_else(|| self.rules.get(DEFAULT_LANGUAGE))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Appends `incoming` to the rules already configured, language by language.
    pub fn merge_rules(&mut self, incoming: BTreeMap<String, Vec<MarkerConfig>>) -> usize {
        let mut added = 0;
        for (language, rules) in incoming {
            added += rules.len();
            self.rules.entry(language).or_default().extend(rules);
        }
        added
    }

    /// Parses a configuration, picking the format from the file extension.
    /// Anything that is not `.json`, `.yaml` or `.yml` is read as TOML.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        match extension(path).as_deref() {
            Some("json") => serde_json::from_str(content).context("Failed to parse JSON config"),
            Some("yaml" | "yml") => {
                serde_yaml::from_str(content).context("Failed to parse YAML config")
            }
            _ => toml::from_str(content).context("Failed to parse TOML config"),
        }
    }

    pub fn render(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(self).context("Failed to serialize to JSON")
            }
            OutputFormat::Yaml => serde_yaml::to_string(self).context("Failed to serialize to YAML"),
            OutputFormat::Toml | OutputFormat::Text => {
                toml::to_string_pretty(self).context("Failed to serialize to TOML")
            }
        }
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// The serialization format implied by a file extension, TOML by default.
pub fn format_for(path: &Path) -> OutputFormat {
    match extension(path).as_deref() {
        Some("json") => OutputFormat::Json,
        Some("yaml" | "yml") => OutputFormat::Yaml,
        _ => OutputFormat::Toml,
    }
}

pub struct ConfigManager {
    config_path: PathBuf,
    root: PathBuf,
}

impl ConfigManager {
    /// Uses the nearest `.explicit-folding.toml` above the current directory,
    /// or one in the current directory when there is none yet.
    pub fn new() -> Result<Self> {
        let root = find_config_root()?;
        Ok(Self::new_at(root.join(CONFIG_FILE_NAME)))
    }

    pub fn new_at(config_path: impl Into<PathBuf>) -> Self {
        let config_path = config_path.into();
        let root = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Self { config_path, root }
    }

    pub fn initialize(&self) -> Result<()> {
        if self.config_path.exists() {
            debug!(path = %self.config_path.display(), "configuration already present");
            return Ok(());
        }

        self.save_config(&FoldingConfig::default())
    }

    pub fn validate_config(&self) -> Result<()> {
        let config = self.load_config()?;
        let validator = StandardValidator::new();
        let report = validator.validate_config(&config)?;

        for warning in &report.warnings {
            println!("  {} {warning}", "warning:".yellow());
        }

        if report.errors.is_empty() {
            println!("{} Configuration is valid.", "✓".green());
            Ok(())
        } else {
            println!("{} Found issues in configuration:", "✗".red());
            for issue in &report.errors {
                println!("  - {issue}");
            }
            anyhow::bail!("Configuration validation failed.");
        }
    }

    /// Adds a rule for `language`. Rules that cannot compile are refused.
    pub fn add_rule(&mut self, language: String, rule: MarkerConfig) -> Result<()> {
        rule.compile_rule()
            .with_context(|| format!("Refusing marker rule for '{language}'"))?;

        let mut config = self.load_config()?;
        config.rules.entry(language).or_default().push(rule);
        self.save_config(&config)
    }

    /// Removes the rule at `index` in the list of `language`, returning it.
    pub fn remove_rule(&mut self, language: &str, index: usize) -> Result<MarkerConfig> {
        let mut config = self.load_config()?;

        let Some(rules) = config.rules.get_mut(language) else {
            anyhow::bail!("No rules configured for '{language}'");
        };
        if index >= rules.len() {
            anyhow::bail!(
                "Rule index {index} out of range, '{language}' has {} rule(s)",
                rules.len()
            );
        }

        let removed = rules.remove(index);
        if rules.is_empty() {
            config.rules.remove(language);
        }

        self.save_config(&config)?;
        Ok(removed)
    }

    pub fn list_rules(&self) -> Result<()> {
        let config = self.load_config()?;

        if config.rules.is_empty() {
            println!("No folding rules configured.");
            return Ok(());
        }

        for (language, rules) in &config.rules {
            println!("\n{} {}", "Language:".bold(), language.cyan());
            for (index, rule) in rules.iter().enumerate() {
                println!("  [{index}] {}", describe_rule(rule));
            }
        }
        Ok(())
    }

    /// Merges rules read from editor settings into the configuration.
    pub fn import_rules(&mut self, file_path: &Path, language: Option<&str>) -> Result<usize> {
        let importer = SettingsImporter::new();
        let imported = importer.import_from_file(file_path, language)?;

        let mut config = self.load_config()?;
        let added = config.merge_rules(imported);
        self.save_config(&config)?;
        Ok(added)
    }

    pub fn export_config(&self, file_path: &Path, format: OutputFormat) -> Result<()> {
        let config = self.load_config()?;
        let content = config.render(format)?;
        fs::write(file_path, content).context("Failed to write export file")?;
        Ok(())
    }

    pub fn get_root(&self) -> &Path {
        &self.root
    }
}

/// One-line summary of a rule for listings.
pub fn describe_rule(rule: &MarkerConfig) -> String {
    let shape = rule
        .shape()
        .map_or_else(|| "invalid".to_string(), |shape| shape.to_string());

    let mut parts = vec![format!("{shape:<12}")];
    let mut field = |name: &str, value: Option<String>| {
        if let Some(value) = value {
            parts.push(format!("{name}: {value}"));
        }
    };
    field("begin", rule.begin_pattern());
    field("middle", rule.middle_pattern());
    field("end", rule.end_pattern());
    field("continuation", rule.continuation_pattern());
    field("separator", rule.separator_pattern());

    if !rule.nested {
        parts.push("not nested".to_string());
    }
    if !rule.fold_last_line {
        parts.push("last line excluded".to_string());
    }
    if rule.kind != FoldingRangeKind::Region {
        parts.push(format!("kind: {}", rule.kind));
    }
    parts.join(" | ")
}

pub trait ConfigProvider {
    fn load_config(&self) -> Result<FoldingConfig>;
    fn save_config(&self, config: &FoldingConfig) -> Result<()>;
    fn get_config_path(&self) -> Result<PathBuf>;
}

impl ConfigProvider for ConfigManager {
    fn load_config(&self) -> Result<FoldingConfig> {
        if !self.config_path.exists() {
            warn!(path = %self.config_path.display(), "no configuration file, using defaults");
            return Ok(FoldingConfig::default());
        }

        let content =
            fs::read_to_string(&self.config_path).context("Failed to read config file")?;

        FoldingConfig::parse(&content, &self.config_path)
            .with_context(|| format!("Invalid config file {}", self.config_path.display()))
    }

    fn save_config(&self, config: &FoldingConfig) -> Result<()> {
        let content = config.render(format_for(&self.config_path))?;
        fs::write(&self.config_path, content).context("Failed to write config file")?;
        Ok(())
    }

    fn get_config_path(&self) -> Result<PathBuf> {
        Ok(self.config_path.clone())
    }
}

fn find_config_root() -> Result<PathBuf> {
    let current_dir = std::env::current_dir().context("Failed to read current directory")?;
    let mut dir = current_dir.as_path();

    loop {
        if dir.join(CONFIG_FILE_NAME).exists() {
            return Ok(dir.to_path_buf());
        }

        match dir.parent() {
            Some(parent) => dir = parent,
            None => return Ok(current_dir),
        }
    }
}
