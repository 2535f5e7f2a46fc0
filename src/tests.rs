use crate::builders::markers::MarkerConfig;
use crate::builders::master::compile;
use crate::core::cache::RuleSetCache;
use crate::core::config::{CONFIG_FILE_NAME, ConfigManager, ConfigProvider, FoldingConfig};
use crate::core::document::TextDocument;
use crate::core::range::{FoldingRange, FoldingRangeKind};
use std::fs;
use tempfile::tempdir;

fn spans(ranges: &[FoldingRange]) -> Vec<(usize, usize)> {
    ranges.iter().map(|range| (range.start, range.end)).collect()
}

fn c_rules() -> Vec<MarkerConfig> {
    vec![
        MarkerConfig::literal("/*", "*/")
            .with_nested(false)
            .with_kind(FoldingRangeKind::Comment),
        MarkerConfig::regex(r"^\s*#if", r"^\s*#endif").with_middle_regex(r"^\s*#el(?:se|if)"),
        MarkerConfig::continued(r"^\s*#define", "\\"),
        MarkerConfig::literal("{", "}"),
    ]
}

#[test]
fn test_initialization() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join(CONFIG_FILE_NAME);

    let config_manager = ConfigManager::new_at(&config_path);
    config_manager.initialize().unwrap();
    assert!(config_path.exists());

    // A second initialization keeps the edited file.
    fs::write(&config_path, "version = \"1.0\"\n").unwrap();
    config_manager.initialize().unwrap();
    let config = config_manager.load_config().unwrap();
    assert!(config.rules.is_empty());
}

#[test]
fn test_c_source_folds() {
    let source = "\
/* Licensed under
 * the usual terms. */
#define SWAP(a, b) \\
    tmp = a; \\
    a = b; b = tmp
#if DEBUG
int level = 2;
#else
int level = 0;
#endif
int main() {
    /* { not a block */
    return 0;
}";
    let document = TextDocument::new(source);
    let ranges = compile(&c_rules()).compute_folding_ranges(&document);

    assert_eq!(
        spans(&ranges),
        vec![(0, 1), (2, 4), (5, 6), (7, 9), (10, 13)]
    );
    assert_eq!(ranges[0].kind, FoldingRangeKind::Comment);
    assert!(ranges[1..].iter().all(|r| r.kind == FoldingRangeKind::Region));
}

#[test]
fn test_markdown_sections_with_html_tags() {
    let rules = vec![
        MarkerConfig::regex(r"<(\w+)[^>]*>", r"</\1>"),
        MarkerConfig::separated_by(r"^#{1,2}\s"),
    ];
    let source = "\
intro
# Title
text
<details>
<summary>more</summary>
hidden
</details>
## Next
end";
    let ranges = compile(&rules).compute_folding_ranges(&TextDocument::new(source));
    assert_eq!(spans(&ranges), vec![(3, 6), (1, 6), (7, 8)]);
}

#[test]
fn test_config_drives_the_cache() {
    let dir = tempdir().unwrap();
    let config_manager = ConfigManager::new_at(dir.path().join("rules.json"));

    let mut config = FoldingConfig::empty();
    config.rules.insert("c".to_string(), c_rules());
    config.rules.insert(
        "*".to_string(),
        vec![MarkerConfig::literal("{{{", "}}}")],
    );
    config_manager.save_config(&config).unwrap();

    let loaded = config_manager.load_config().unwrap();
    assert_eq!(loaded, config);

    let cache = RuleSetCache::new();
    let document = TextDocument::new("/*\n{{{\n*/\n}}}");
    let c = cache.get_or_compile("c", &loaded).compute_folding_ranges(&document);
    let other = cache.get_or_compile("text", &loaded).compute_folding_ranges(&document);

    assert_eq!(spans(&c), vec![(0, 2)]);
    assert_eq!(spans(&other), vec![(1, 3)]);
}
