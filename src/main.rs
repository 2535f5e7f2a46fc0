/// explicit-folding:
/// Editors fold code by indentation or by what a language server knows about
/// the syntax. Sometimes neither is what you want: you want a block to fold
/// because *you* marked it, with `{{{`/`}}}`, `#region`/`#endregion`, a
/// docstring, a `---` separator or a chain of `\`-continued lines.
/// This tool keeps those marker rules per language and shows the folding
/// ranges they produce for any file.
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use explicit_folding::core::config::{DEFAULT_LANGUAGE, OutputFormat};
use explicit_folding::{FoldingRangeKind, MarkerConfig, utils};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "explicit-folding")]
#[command(about = "Compute folding ranges from explicit begin/end markers")]
struct Cli {
    /// Configuration file to use instead of the nearest .explicit-folding.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter configuration file
    Init,
    /// Print the folding ranges of a file
    Fold {
        file: PathBuf,
        /// Language whose rules apply (defaults to the file extension)
        #[arg(short, long)]
        language: Option<String>,
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
    },
    /// Check the configuration for rules that cannot be used
    Validate,
    /// List the configured rules, per language
    List,
    /// Add a rule for a language
    Add(AddArgs),
    /// Remove a rule by its index in the listing
    Remove {
        #[arg(short, long)]
        language: String,
        #[arg(short, long)]
        index: usize,
    },
    /// Export the configuration
    Export {
        file: PathBuf,
        /// Output format (defaults to the file extension)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
    },
    /// Import rules from editor settings or a list of rules (JSON or YAML)
    Import {
        file: PathBuf,
        /// Language for rules the file does not assign to one
        #[arg(short, long)]
        language: Option<String>,
    },
}

#[derive(Args)]
struct AddArgs {
    #[arg(short, long, default_value = DEFAULT_LANGUAGE)]
    language: String,
    #[arg(long)]
    begin: Option<String>,
    #[arg(long)]
    middle: Option<String>,
    #[arg(long)]
    end: Option<String>,
    /// Suffix that continues a block on the next line
    #[arg(long)]
    continuation: Option<String>,
    #[arg(long)]
    separator: Option<String>,
    /// Treat the patterns as regular expressions instead of literal text
    #[arg(long)]
    regex: bool,
    /// Ignore every other marker inside this rule's blocks
    #[arg(long)]
    not_nested: bool,
    /// Leave the line holding the end marker out of the range
    #[arg(long)]
    exclude_last_line: bool,
    #[arg(long, value_enum, default_value_t = FoldingRangeKind::Region)]
    kind: FoldingRangeKind,
}

impl AddArgs {
    fn into_rule(self) -> MarkerConfig {
        let mut rule = MarkerConfig::default()
            .with_nested(!self.not_nested)
            .with_fold_last_line(!self.exclude_last_line)
            .with_kind(self.kind);

        if self.regex {
            rule.begin_regex = self.begin;
            rule.middle_regex = self.middle;
            rule.end_regex = self.end;
            rule.continuation_regex = self.continuation;
            rule.separator_regex = self.separator;
        } else {
            rule.begin = self.begin;
            rule.middle = self.middle;
            rule.end = self.end;
            rule.continuation = self.continuation;
            rule.separator = self.separator;
        }
        rule
    }
}

fn main() -> Result<()> {
    utils::init_tracing();
    let cli = Cli::parse();
    let config = cli.config;

    match cli.command {
        Commands::Init => utils::initialize(config),
        Commands::Fold {
            file,
            language,
            format,
        } => utils::fold_file(config, &file, language.as_deref(), format),
        Commands::Validate => utils::validate(config),
        Commands::List => utils::list_rules(config),
        Commands::Add(args) => {
            let language = args.language.clone();
            utils::add_rule(config, language, args.into_rule())
        }
        Commands::Remove { language, index } => utils::remove_rule(config, &language, index),
        Commands::Export { file, format } => utils::export_config(config, &file, format),
        Commands::Import { file, language } => {
            utils::import_rules(config, &file, language.as_deref())
        }
    }
}
