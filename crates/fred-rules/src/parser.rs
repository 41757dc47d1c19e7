//! Rule-file parser.
//!
//! A rule file is a sequence of blocks separated by blank lines. The first
//! line of a block is `<kind>: <name>`; later lines are either `<key>: <value>`
//! attributes or verbatim template lines. Lines starting with `#` are
//! comments and are dropped before blocks are formed.

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::Regex;

use crate::base::RuleBase;
use crate::error::{RuleError, RuleResult};
use crate::rule::{ATTRIBUTE_KEYS, Attributes, Rule, RuleTag};

static RE_HEADER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\S+):\s+(\S+)$").unwrap());

static RE_ATTRIBUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\S+):\s+(\S.*)$").unwrap());

/// Parse one block of trimmed, non-blank, non-comment lines into a rule.
pub fn parse_block(lines: &[&str]) -> RuleResult<Rule> {
    let (header, body) = lines
        .split_first()
        .ok_or_else(|| RuleError::MalformedHeader(String::new()))?;

    let caps = RE_HEADER
        .captures(header)
        .ok_or_else(|| RuleError::MalformedHeader((*header).to_string()))?;
    let tag = RuleTag::from_keyword(&caps[1])
        .ok_or_else(|| RuleError::BadRuleKind(caps[1].to_lowercase()))?;
    let name = caps[2].to_lowercase();

    let mut vector = Vec::new();
    let mut attrs = Attributes::new();

    for line in body {
        match RE_ATTRIBUTE.captures(line) {
            Some(caps) => {
                let key = caps[1].to_lowercase();
                if !ATTRIBUTE_KEYS.contains(&key.as_str()) {
                    return Err(RuleError::UnrecognizedAttribute {
                        rule: name,
                        kind: tag.as_str(),
                        key,
                    });
                }
                attrs.insert(key, caps[2].trim());
            }
            None => vector.push((*line).to_string()),
        }
    }

    Rule::compile(tag, &name, vector, attrs)
}

/// Parse a whole rule file into a compiled rule base.
///
/// Any failing block aborts the load; no partial rule base is returned.
pub fn parse_rule_base(text: &str) -> RuleResult<RuleBase> {
    let mut builder = RuleBaseBuilder::new();
    builder.add_text(text)?;
    builder.build()
}

#[derive(Debug, Clone)]
struct SourceBlock {
    line: usize,
    text: String,
}

/// Accumulates rule blocks from one or more sources, then compiles them.
///
/// Later definitions of a name replace earlier ones. The first action block
/// seen becomes the rule base's first action, even if its name is reused
/// later.
#[derive(Debug, Default)]
pub struct RuleBaseBuilder {
    rules: BTreeMap<String, Rule>,
    blocks: HashMap<String, SourceBlock>,
    first_action: Option<Rule>,
}

impl RuleBaseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct rule names collected so far.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Split `text` into blocks and add each of them.
    pub fn add_text(&mut self, text: &str) -> RuleResult<()> {
        let mut block: Vec<&str> = Vec::new();
        let mut start = 0;

        for (i, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.starts_with('#') {
                continue;
            }
            if line.is_empty() {
                if !block.is_empty() {
                    self.add_block(start, &block)?;
                    block.clear();
                }
                continue;
            }
            if block.is_empty() {
                start = i + 1;
            }
            block.push(line);
        }

        if !block.is_empty() {
            self.add_block(start, &block)?;
        }
        Ok(())
    }

    /// Parse and add one block that starts on 1-based line `line`.
    pub fn add_block(&mut self, line: usize, lines: &[&str]) -> RuleResult<()> {
        let text = lines.join("\n");
        let rule = parse_block(lines).map_err(|e| RuleError::RuleLoad {
            line,
            block: text.clone(),
            source: Box::new(e),
        })?;

        if self.first_action.is_none() && rule.tag() == RuleTag::Action {
            self.first_action = Some(rule.clone());
        }

        let name = rule.name.clone();
        if let Some(previous) = self.rules.insert(name.clone(), rule) {
            tracing::warn!(
                rule = %name,
                line,
                previous_kind = %previous.tag(),
                "duplicate rule name, earlier definition discarded"
            );
        }
        self.blocks.insert(name, SourceBlock { line, text });
        Ok(())
    }

    /// Compile the collected rules. Reference errors carry the block of the
    /// rule that made the reference.
    pub fn build(self) -> RuleResult<RuleBase> {
        let Self {
            rules,
            blocks,
            first_action,
        } = self;

        RuleBase::build(rules, first_action).map_err(|err| {
            let referrer = match &err {
                RuleError::UnknownRuleReference { rule, .. } | RuleError::WrongRuleKind { rule, .. } => {
                    Some(rule.clone())
                }
                _ => None,
            };
            match referrer.and_then(|rule| blocks.get(&rule).cloned()) {
                Some(block) => RuleError::RuleLoad {
                    line: block.line,
                    block: block.text,
                    source: Box::new(err),
                },
                None => err,
            }
        })
    }
}
