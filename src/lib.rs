//! Explicit folding: folding ranges driven by user-declared markers.
//!
//! Marker rules (begin/end pairs, docstring delimiters, continuation lines and
//! section separators) are compiled once into a [`CompiledRuleSet`], which
//! then folds any number of documents:
//!
//! ```
//! use explicit_folding::{MarkerConfig, TextDocument, compile};
//!
//! let rules = compile(&[MarkerConfig::literal("{{{", "}}}")]);
//! let document = TextDocument::new("{{{ setup\nlet x = 1;\n}}}");
//! let ranges = rules.compute_folding_ranges(&document);
//! assert_eq!((ranges[0].start, ranges[0].end), (0, 2));
//! ```
pub mod builders;
pub mod core;
pub mod utils;

pub use crate::builders::markers::{MarkerConfig, MarkerError};
pub use crate::builders::master::{CompiledRuleSet, compile};
pub use crate::core::document::{Document, TextDocument};
pub use crate::core::range::{FoldingRange, FoldingRangeKind};

#[cfg(test)]
mod tests;
