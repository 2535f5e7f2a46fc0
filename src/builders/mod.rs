// This file is the module declaration file for the `builders` module.
// It declares and makes public all the sub-modules within the `src/builders`
// directory. These modules turn configuration into something the engine can
// run, and turn the engine's output back into something people can read.

// `importer` module:
// Imports marker rules from external sources, such as editor settings files
// or shared lists of rules, and converts them into `MarkerConfig` records
// grouped by language.
pub mod importer;

// `markers` module:
// This is a fundamental module. It defines `MarkerConfig` (one rule as
// written in the configuration), classifies it into a shape, and compiles it
// into a `MarkerRule` with validated regexes. It also handles end markers that
// back-reference the groups captured by their begin marker.
pub mod markers;

// `master` module:
// Combines the compiled rules of a language into one master alternation with
// uniquely named groups, so that a single regex scan finds the next marker of
// any rule. The result is the immutable `CompiledRuleSet`.
pub mod master;

// `reporter` module:
// Presents folding results. It defines the `RangeReporter` trait with a
// colored `ConsoleReporter`, and the serializable `FoldingReport`.
pub mod reporter;

// `validator` module:
// Checks a configuration for rules the engine would drop (invalid or
// empty-matching patterns, clashing group names) and for fields a rule's
// shape ignores. The `ConfigValidator` trait and `StandardValidator` live here.
pub mod validator;
