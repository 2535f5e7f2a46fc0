use anyhow::{Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::builders::markers::MarkerConfig;
use crate::builders::reporter::{ConsoleReporter, FoldingReport, RangeReporter};
use crate::core::cache::RuleSetCache;
use crate::core::config::{ConfigManager, ConfigProvider, OutputFormat, describe_rule, format_for};
use crate::core::document::TextDocument;

pub mod language;
pub mod logging;

pub use language::{detect_language, resolve_language};
pub use logging::init_tracing;

pub fn initialize(config_path: Option<PathBuf>) -> Result<()> {
    let config_manager = get_config_manager(config_path)?;
    config_manager.initialize()?;
    println!(
        "{} Initialized explicit folding rules in {}",
        "✓".green(),
        config_manager.get_config_path()?.display()
    );
    println!("Run 'explicit-folding fold <FILE>' to see the folding ranges of a file");
    Ok(())
}

/// Computes and prints the folding ranges of `file`.
pub fn fold_file(
    config_path: Option<PathBuf>,
    file: &Path,
    language: Option<&str>,
    format: Option<OutputFormat>,
) -> Result<()> {
    let config_manager = get_config_manager(config_path)?;
    let config = config_manager.load_config()?;
    let document = TextDocument::from_file(file)?;

    let language = resolve_language(language, file, &config);
    let rule_set = RuleSetCache::new().get_or_compile(&language, &config);
    debug!(
        language = %language,
        rules = rule_set.rules().len(),
        rejected = rule_set.rejected().len(),
        "folding {}",
        file.display()
    );

    let ranges = rule_set.compute_folding_ranges(&document);
    let report = FoldingReport::new(file.display().to_string(), language, ranges);

    match format.unwrap_or(config.global_settings.output_format) {
        OutputFormat::Text => {
            ConsoleReporter::new(config.global_settings.verbose)
                .generate_range_report(&report, &document)?;
        }
        format => println!("{}", report.render(format)?),
    }
    Ok(())
}

pub fn validate(config_path: Option<PathBuf>) -> Result<()> {
    get_config_manager(config_path)?.validate_config()
}

pub fn list_rules(config_path: Option<PathBuf>) -> Result<()> {
    get_config_manager(config_path)?.list_rules()
}

pub fn add_rule(config_path: Option<PathBuf>, language: String, rule: MarkerConfig) -> Result<()> {
    let mut config_manager = get_config_manager(config_path)?;
    println!("Adding rule for '{language}': {}", describe_rule(&rule));
    config_manager.add_rule(language, rule)?;
    println!("{} Rule added", "✓".green());
    Ok(())
}

pub fn remove_rule(config_path: Option<PathBuf>, language: &str, index: usize) -> Result<()> {
    let mut config_manager = get_config_manager(config_path)?;
    config_manager.remove_rule(language, index)?;
    println!("{} Removed rule #{index} of '{language}'", "✓".green());
    Ok(())
}

pub fn export_config(config_path: Option<PathBuf>, file: &Path, format: Option<OutputFormat>) -> Result<()> {
    let config_manager = get_config_manager(config_path)?;
    let format = format.unwrap_or_else(|| format_for(file));
    config_manager.export_config(file, format)?;
    println!("{} Exported configuration to {}", "✓".green(), file.display());
    Ok(())
}

pub fn import_rules(config_path: Option<PathBuf>, file: &Path, language: Option<&str>) -> Result<()> {
    let mut config_manager = get_config_manager(config_path)?;
    let added = config_manager
        .import_rules(file, language)
        .with_context(|| format!("Failed to import rules from {}", file.display()))?;
    println!("{} Imported {added} rule(s) from {}", "✓".green(), file.display());
    Ok(())
}

// Helper function to create ConfigManager instance
fn get_config_manager(config_path: Option<PathBuf>) -> Result<ConfigManager> {
    match config_path {
        Some(path) => Ok(ConfigManager::new_at(path)),
        None => ConfigManager::new(),
    }
}
