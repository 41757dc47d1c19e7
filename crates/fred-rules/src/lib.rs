//! Rule engine for FRED, a rule-driven conversational responder.
//!
//! Provides the rule-file parser, the compiled rule base with its trigger
//! and fuzzy indexes, utterance normalization, and the selector that turns
//! a stimulus into a reply.

pub mod base;
pub mod engine;
pub mod error;
pub mod fuzzy;
pub mod language;
pub mod parser;
pub mod rule;
pub mod selector;

// Re-export key types for convenience
pub use base::{RuleBase, RuleBaseSummary, RuleId};
pub use engine::Engine;
pub use error::{RuleError, RuleResult};
pub use language::{normalize, stimulus_phrase};
pub use parser::{RuleBaseBuilder, parse_block, parse_rule_base};
pub use rule::{ActionAttrs, Attributes, FuzzyAttrs, RegexAttrs, Rule, RuleKind, RuleTag};
pub use selector::{DEFAULT_INTRO_PROBABILITY, Reply, Selector, SelectorOptions};
