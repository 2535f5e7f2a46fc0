use std::path::Path;

use crate::core::config::FoldingConfig;

/// Maps a file extension to the language identifier rules are configured under.
pub fn detect_language(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();

    let language = match extension.as_str() {
        "rs" => "rust",
        "py" | "pyi" => "python",
        "c" | "h" => "c",
        "cpp" | "cc" | "cxx" | "hpp" | "hh" => "cpp",
        "cs" => "csharp",
        "js" | "mjs" | "cjs" => "javascript",
        "ts" | "mts" => "typescript",
        "md" | "markdown" => "markdown",
        "sh" | "bash" | "zsh" => "shellscript",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "html" | "htm" => "html",
        "xml" => "xml",
        "lua" => "lua",
        "go" => "go",
        "java" => "java",
        "rb" => "ruby",
        _ => return None,
    };
    Some(language)
}

/// Picks the language a file is folded as: the explicit choice, then the file
/// extension, then the configured default language.
pub fn resolve_language(explicit: Option<&str>, path: &Path, config: &FoldingConfig) -> String {
    explicit
        .or_else(|| detect_language(path))
        .unwrap_or(config.global_settings.default_language.as_str())
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language(Path::new("src/main.rs")), Some("rust"));
        assert_eq!(detect_language(Path::new("include/Util.HPP")), Some("cpp"));
        assert_eq!(detect_language(Path::new("Makefile")), None);
        assert_eq!(detect_language(Path::new("data.bin")), None);
    }

    #[test]
    fn test_resolve_language_order() {
        let mut config = FoldingConfig::default();
        assert_eq!(resolve_language(Some("lua"), Path::new("a.rs"), &config), "lua");
        assert_eq!(resolve_language(None, Path::new("a.rs"), &config), "rust");
        assert_eq!(resolve_language(None, Path::new("notes"), &config), "*");

        config.global_settings.default_language = "markdown".to_string();
        assert_eq!(resolve_language(None, Path::new("notes"), &config), "markdown");
    }
}
