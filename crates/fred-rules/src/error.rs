//! Rule loading and selection error types.

use thiserror::Error;

/// Errors raised while compiling a rule base or selecting a reply.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("unrecognized rule format: {0}")]
    MalformedHeader(String),

    #[error("bad rule kind: {0}")]
    BadRuleKind(String),

    #[error("unrecognized attribute `{key}` on {kind} rule `{rule}`")]
    UnrecognizedAttribute {
        rule: String,
        kind: &'static str,
        key: String,
    },

    #[error("invalid value `{value}` for attribute `{key}` on rule `{rule}`")]
    InvalidAttribute {
        rule: String,
        key: &'static str,
        value: String,
    },

    #[error("regex rule `{0}` must name the rules it invokes")]
    MissingInvokes(String),

    #[error("malformed fuzzy member `{line}` in rule `{rule}` (expected <weight><TAB><rule>)")]
    MalformedFuzzyMember { rule: String, line: String },

    #[error("rule `{rule}` references unknown rule `{reference}`")]
    UnknownRuleReference { rule: String, reference: String },

    #[error("rule `{rule}` references `{reference}`, which is a {found} rule, not an action")]
    WrongRuleKind {
        rule: String,
        reference: String,
        found: &'static str,
    },

    #[error("cannot load rule block at line {line}: {source}\n{block}")]
    RuleLoad {
        line: usize,
        block: String,
        #[source]
        source: Box<RuleError>,
    },

    #[error("rule base has no action rule to fire first")]
    NoFirstAction,

    #[error("no eligible action rule remains")]
    NoEligibleAction,

    #[error("rule `{0}` has an empty response template")]
    EmptyTemplate(String),
}

impl RuleError {
    /// The underlying error, looking through any `RuleLoad` wrapper.
    pub fn root(&self) -> &RuleError {
        match self {
            Self::RuleLoad { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Convenience alias for rule engine results.
pub type RuleResult<T> = Result<T, RuleError>;
