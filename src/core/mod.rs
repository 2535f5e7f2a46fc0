// This file is the module declaration file for the `core` module.
// It declares the submodules under `src/core/` and exposes them to the rest
// of the crate.

// `cache` module:
// Keeps one compiled rule set per language in a concurrent map so that the
// regexes of a language are only built once, no matter how many documents
// (or threads) are folded with them.
pub mod cache;

// `config` module:
// Defines the configuration file (`FoldingConfig`: rules per language plus
// global settings), the `ConfigProvider` trait abstracting its storage, and
// the `ConfigManager` that loads, saves, edits, validates, imports and
// exports it.
pub mod config;

// `document` module:
// The `Document` trait the engine reads lines through, and `TextDocument`,
// an owned document split into lines.
pub mod document;

// `engine` module:
// The line scanner. It walks a document once, feeding every marker found by
// the master pattern (or by a non-nesting rule's own matcher) through a stack
// of open blocks, and emits the folding ranges.
pub mod engine;

// `range` module:
// The output types: `FoldingRange` and `FoldingRangeKind`.
pub mod range;
