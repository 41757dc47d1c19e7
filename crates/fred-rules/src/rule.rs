//! Rule model: the five rule kinds, their attributes, and firing.
//!
//! A rule is a name, an ordered vector of response-template lines, a fire
//! counter, and a kind-specific payload. Kinds are a closed enum so every
//! consumer matches them exhaustively.

use std::collections::BTreeMap;
use std::fmt;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;

use crate::error::{RuleError, RuleResult};

/// Attribute keys a rule block may carry. Any other `key: value` line is
/// rejected by the parser.
pub const ATTRIBUTE_KEYS: &[&str] = &[
    "priority", "requires", "equals", "bind", "invokes", "url", "next", "repeat", "expect",
];

// ── Rule tag ──────────────────────────────────────────────────

/// The kind named in a block header, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleTag {
    Intro,
    Action,
    Response,
    Regex,
    Fuzzy,
}

impl RuleTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Intro => "intro",
            Self::Action => "action",
            Self::Response => "response",
            Self::Regex => "regex",
            Self::Fuzzy => "fuzzy",
        }
    }

    /// Map a header keyword (case-insensitive) to a tag.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_lowercase().as_str() {
            "intro" => Some(Self::Intro),
            "action" => Some(Self::Action),
            "response" => Some(Self::Response),
            "regex" => Some(Self::Regex),
            "fuzzy" => Some(Self::Fuzzy),
            _ => None,
        }
    }
}

impl fmt::Display for RuleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Attributes ────────────────────────────────────────────────

/// `key: value` lines collected from one block, consumed by the kind
/// constructors. Whatever is left after construction is an error.
#[derive(Debug, Default, Clone)]
pub struct Attributes(BTreeMap<String, String>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an attribute. A repeated key keeps the last value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn take(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    fn take_lower(&mut self, key: &str) -> Option<String> {
        self.take(key).map(|v| v.to_lowercase())
    }

    fn finish(self, rule: &str, tag: RuleTag) -> RuleResult<()> {
        match self.0.into_keys().next() {
            Some(key) => Err(RuleError::UnrecognizedAttribute {
                rule: rule.to_string(),
                kind: tag.as_str(),
                key,
            }),
            None => Ok(()),
        }
    }
}

// ── Kind payloads ─────────────────────────────────────────────

/// Attributes of an action rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActionAttrs {
    pub priority: i32,
    /// Stays eligible for fallback selection after it has fired.
    pub repeat: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub expect: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ActionAttrs {
    fn take_from(rule: &str, attrs: &mut Attributes) -> RuleResult<Self> {
        let priority = match attrs.take("priority") {
            Some(value) => value.parse().map_err(|_| RuleError::InvalidAttribute {
                rule: rule.to_string(),
                key: "priority",
                value,
            })?,
            None => 0,
        };

        Ok(Self {
            priority,
            repeat: attrs
                .take("repeat")
                .is_some_and(|v| v.eq_ignore_ascii_case("true")),
            requires: attrs.take_lower("requires"),
            expect: attrs
                .take_lower("expect")
                .map(|v| v.split_whitespace().map(String::from).collect())
                .unwrap_or_default(),
            bind: attrs.take_lower("bind"),
            next: attrs.take_lower("next"),
            url: attrs.take_lower("url"),
        })
    }
}

/// Attributes of a regex rule: the action rules its trigger phrases invoke.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegexAttrs {
    pub invokes: Vec<String>,
}

impl RegexAttrs {
    fn take_from(rule: &str, attrs: &mut Attributes) -> RuleResult<Self> {
        let invokes: Vec<String> = attrs
            .take_lower("invokes")
            .map(|v| v.split_whitespace().map(String::from).collect())
            .unwrap_or_default();

        if invokes.is_empty() {
            return Err(RuleError::MissingInvokes(rule.to_string()));
        }
        Ok(Self { invokes })
    }
}

/// Weighted membership of a fuzzy rule.
///
/// `weights` are normalized to sum to 1.0; `raw_weights` keep the integers
/// from the rule file so the rule renders back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FuzzyAttrs {
    pub members: Vec<String>,
    pub weights: Vec<f64>,
    pub raw_weights: Vec<u32>,
}

impl FuzzyAttrs {
    /// Compile `<weight>\t<rule>` lines into normalized memberships.
    fn compile(rule: &str, lines: &[String]) -> RuleResult<Self> {
        let mut members = Vec::with_capacity(lines.len());
        let mut raw_weights = Vec::with_capacity(lines.len());

        for line in lines {
            let malformed = || RuleError::MalformedFuzzyMember {
                rule: rule.to_string(),
                line: line.clone(),
            };
            let (weight, member) = line.split_once('\t').ok_or_else(malformed)?;
            let weight: u32 = weight.trim().parse().map_err(|_| malformed())?;
            let member = member.trim();
            if weight == 0 || member.is_empty() || member.contains(char::is_whitespace) {
                return Err(malformed());
            }
            members.push(member.to_lowercase());
            raw_weights.push(weight);
        }

        if members.is_empty() {
            return Err(RuleError::EmptyTemplate(rule.to_string()));
        }

        let total: f64 = raw_weights.iter().map(|&w| f64::from(w)).sum();
        let weights = raw_weights.iter().map(|&w| f64::from(w) / total).collect();

        Ok(Self {
            members,
            weights,
            raw_weights,
        })
    }
}

/// Kind-specific payload of a rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RuleKind {
    Intro,
    Action(ActionAttrs),
    Response,
    Regex(RegexAttrs),
    Fuzzy(FuzzyAttrs),
}

// ── Rule ──────────────────────────────────────────────────────

/// One compiled rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rule {
    /// Lower-cased, unique within a rule base.
    pub name: String,
    /// Response-template lines. Always empty for fuzzy rules.
    pub vector: Vec<String>,
    /// Number of times the rule has produced output.
    pub fire_count: u32,
    #[serde(flatten)]
    pub kind: RuleKind,
}

impl Rule {
    /// Build a rule of kind `tag` from its header name, template lines, and
    /// attributes. Every attribute must be consumed by the kind.
    pub fn compile(
        tag: RuleTag,
        name: &str,
        vector: Vec<String>,
        mut attrs: Attributes,
    ) -> RuleResult<Self> {
        let name = name.to_lowercase();

        let kind = match tag {
            RuleTag::Intro => RuleKind::Intro,
            RuleTag::Response => RuleKind::Response,
            RuleTag::Action => RuleKind::Action(ActionAttrs::take_from(&name, &mut attrs)?),
            RuleTag::Regex => RuleKind::Regex(RegexAttrs::take_from(&name, &mut attrs)?),
            RuleTag::Fuzzy => {
                attrs.finish(&name, tag)?;
                let fuzzy = FuzzyAttrs::compile(&name, &vector)?;
                return Ok(Self {
                    name,
                    vector: Vec::new(),
                    fire_count: 0,
                    kind: RuleKind::Fuzzy(fuzzy),
                });
            }
        };
        attrs.finish(&name, tag)?;

        if vector.is_empty() {
            return Err(RuleError::EmptyTemplate(name));
        }

        Ok(Self {
            name,
            vector,
            fire_count: 0,
            kind,
        })
    }

    pub fn tag(&self) -> RuleTag {
        match self.kind {
            RuleKind::Intro => RuleTag::Intro,
            RuleKind::Action(_) => RuleTag::Action,
            RuleKind::Response => RuleTag::Response,
            RuleKind::Regex(_) => RuleTag::Regex,
            RuleKind::Fuzzy(_) => RuleTag::Fuzzy,
        }
    }

    pub fn as_action(&self) -> Option<&ActionAttrs> {
        match &self.kind {
            RuleKind::Action(attrs) => Some(attrs),
            _ => None,
        }
    }

    /// Whether the fallback pool may pick this rule: a repeatable action, or
    /// one that has never fired.
    pub fn is_eligible(&self) -> bool {
        self.as_action()
            .is_some_and(|a| a.repeat || self.fire_count < 1)
    }

    /// Pick a template line uniformly at random without touching the counter.
    pub fn draw_line<R: Rng + ?Sized>(&self, rng: &mut R) -> RuleResult<&str> {
        self.vector
            .choose(rng)
            .map(String::as_str)
            .ok_or_else(|| RuleError::EmptyTemplate(self.name.clone()))
    }

    /// Produce output: draw a template line and bump the fire counter.
    pub fn fire<R: Rng + ?Sized>(&mut self, rng: &mut R) -> RuleResult<String> {
        let line = self.draw_line(rng)?.to_string();
        self.fire_count += 1;
        Ok(line)
    }
}

/// Renders the rule back into rule-file block syntax.
impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: {}", self.tag(), self.name)?;

        match &self.kind {
            RuleKind::Intro | RuleKind::Response => {}
            RuleKind::Action(a) => {
                if a.priority != 0 {
                    writeln!(f, "priority: {}", a.priority)?;
                }
                if a.repeat {
                    writeln!(f, "repeat: true")?;
                }
                if let Some(requires) = &a.requires {
                    writeln!(f, "requires: {requires}")?;
                }
                if !a.expect.is_empty() {
                    writeln!(f, "expect: {}", a.expect.join(" "))?;
                }
                if let Some(bind) = &a.bind {
                    writeln!(f, "bind: {bind}")?;
                }
                if let Some(next) = &a.next {
                    writeln!(f, "next: {next}")?;
                }
                if let Some(url) = &a.url {
                    writeln!(f, "url: {url}")?;
                }
            }
            RuleKind::Regex(r) => writeln!(f, "invokes: {}", r.invokes.join(" "))?,
            RuleKind::Fuzzy(z) => {
                for (weight, member) in z.raw_weights.iter().zip(&z.members) {
                    writeln!(f, "{weight}\t{member}")?;
                }
            }
        }

        for line in &self.vector {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}
