//! Compiled rule base: every rule plus the lookup indexes built at load.
//!
//! Indexes refer to rules by [`RuleId`] (a position in the owned rule
//! vector), so firing only ever needs a mutable borrow of one rule.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rand::Rng;
use serde::Serialize;

use crate::error::{RuleError, RuleResult};
use crate::fuzzy::{FuzzyIndex, FuzzySet};
use crate::rule::{Rule, RuleKind, RuleTag};

/// Position of a rule inside its [`RuleBase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub(crate) usize);

/// The action that opens a conversation.
///
/// Usually it is still the indexed rule of that name and shares its fire
/// counter. When a later block replaced the name, the first-parsed rule is
/// kept on its own.
#[derive(Debug, Clone)]
enum FirstAction {
    Indexed(RuleId),
    Detached(Box<Rule>),
}

/// All rules of one load plus the indexes the selector queries.
#[derive(Debug, Clone)]
pub struct RuleBase {
    rules: Vec<Rule>,
    by_name: HashMap<String, RuleId>,
    first_action: Option<FirstAction>,
    actions: Vec<RuleId>,
    intros: Vec<RuleId>,
    fuzzy: FuzzyIndex,
    regex_phrases: BTreeMap<String, BTreeSet<RuleId>>,
}

/// Serializable overview of a rule base.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleBaseSummary {
    pub rules: usize,
    pub intros: usize,
    pub actions: usize,
    pub responses: usize,
    pub regexes: usize,
    pub fuzzies: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_action: Option<String>,
    pub trigger_phrases: Vec<String>,
}

impl RuleBase {
    /// Compile a name → rule mapping into a rule base.
    ///
    /// `first_action` is the first action rule parsed, fired by
    /// [`RuleBase::fire_first`]. It need not still be in `rules`; a rule that
    /// is not an action is ignored.
    pub fn build(rules: BTreeMap<String, Rule>, first_action: Option<Rule>) -> RuleResult<Self> {
        let rules: Vec<Rule> = rules.into_values().collect();
        let by_name: HashMap<String, RuleId> = rules
            .iter()
            .enumerate()
            .map(|(i, r)| (r.name.clone(), RuleId(i)))
            .collect();

        let ids_of = |tag: RuleTag| -> Vec<RuleId> {
            rules
                .iter()
                .enumerate()
                .filter(|(_, r)| r.tag() == tag)
                .map(|(i, _)| RuleId(i))
                .collect()
        };
        let actions = ids_of(RuleTag::Action);
        let intros = ids_of(RuleTag::Intro);

        let first_action = first_action
            .filter(|rule| rule.tag() == RuleTag::Action)
            .map(|rule| match by_name.get(&rule.name) {
                Some(&id) if rules[id.0] == rule => FirstAction::Indexed(id),
                _ => {
                    tracing::debug!(rule = %rule.name, "first action was redefined, keeping original");
                    FirstAction::Detached(Box::new(rule))
                }
            });

        let mut fuzzy = FuzzyIndex::default();
        let mut regex_phrases: BTreeMap<String, BTreeSet<RuleId>> = BTreeMap::new();

        for rule in &rules {
            match &rule.kind {
                RuleKind::Fuzzy(z) => {
                    let members = z
                        .members
                        .iter()
                        .zip(&z.weights)
                        .map(|(member, weight)| {
                            resolve_action(&rules, &by_name, &rule.name, member).map(|id| (id, *weight))
                        })
                        .collect::<RuleResult<Vec<_>>>()?;
                    fuzzy.insert(rule.name.clone(), FuzzySet::new(&rule.name, members)?);
                }
                RuleKind::Regex(r) => {
                    let invoked = r
                        .invokes
                        .iter()
                        .map(|name| resolve_action(&rules, &by_name, &rule.name, name))
                        .collect::<RuleResult<BTreeSet<_>>>()?;
                    for phrase in &rule.vector {
                        regex_phrases
                            .entry(phrase.to_lowercase())
                            .or_default()
                            .extend(invoked.iter().copied());
                    }
                }
                RuleKind::Intro | RuleKind::Action(_) | RuleKind::Response => {}
            }
        }

        tracing::debug!(
            rules = rules.len(),
            actions = actions.len(),
            intros = intros.len(),
            fuzzy_sets = fuzzy.len(),
            trigger_phrases = regex_phrases.len(),
            "rule base compiled"
        );

        Ok(Self {
            rules,
            by_name,
            first_action,
            actions,
            intros,
            fuzzy,
            regex_phrases,
        })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.by_name.get(name).map(|id| &self.rules[id.0])
    }

    pub fn id_of(&self, name: &str) -> Option<RuleId> {
        self.by_name.get(name).copied()
    }

    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id.0]
    }

    pub(crate) fn rule_mut(&mut self, id: RuleId) -> &mut Rule {
        &mut self.rules[id.0]
    }

    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn first_action(&self) -> Option<&Rule> {
        match self.first_action.as_ref()? {
            FirstAction::Indexed(id) => Some(self.rule(*id)),
            FirstAction::Detached(rule) => Some(rule),
        }
    }

    pub fn actions(&self) -> &[RuleId] {
        &self.actions
    }

    pub fn intros(&self) -> &[RuleId] {
        &self.intros
    }

    pub fn fuzzy_index(&self) -> &FuzzyIndex {
        &self.fuzzy
    }

    /// Trigger phrase → invoked actions.
    pub fn regex_phrases(&self) -> &BTreeMap<String, BTreeSet<RuleId>> {
        &self.regex_phrases
    }

    /// Actions the fallback pool may pick right now.
    pub fn eligible_actions(&self) -> Vec<RuleId> {
        self.actions
            .iter()
            .copied()
            .filter(|id| self.rule(*id).is_eligible())
            .collect()
    }

    /// Fire the designated first action and return its text.
    pub fn fire_first<R: Rng + ?Sized>(&mut self, rng: &mut R) -> RuleResult<String> {
        let rule = match self.first_action.as_mut().ok_or(RuleError::NoFirstAction)? {
            FirstAction::Indexed(id) => &mut self.rules[id.0],
            FirstAction::Detached(rule) => rule.as_mut(),
        };
        let text = rule.fire(rng)?;
        tracing::debug!(rule = %rule.name, fire_count = rule.fire_count, "fired first action");
        Ok(text)
    }

    pub fn summary(&self) -> RuleBaseSummary {
        let count = |tag: RuleTag| self.rules.iter().filter(|r| r.tag() == tag).count();
        RuleBaseSummary {
            rules: self.rules.len(),
            intros: self.intros.len(),
            actions: self.actions.len(),
            responses: count(RuleTag::Response),
            regexes: count(RuleTag::Regex),
            fuzzies: self.fuzzy.len(),
            first_action: self.first_action().map(|r| r.name.clone()),
            trigger_phrases: self.regex_phrases.keys().cloned().collect(),
        }
    }
}

fn resolve_action(
    rules: &[Rule],
    by_name: &HashMap<String, RuleId>,
    referrer: &str,
    name: &str,
) -> RuleResult<RuleId> {
    let id = by_name
        .get(name)
        .copied()
        .ok_or_else(|| RuleError::UnknownRuleReference {
            rule: referrer.to_string(),
            reference: name.to_string(),
        })?;

    let found = rules[id.0].tag();
    if found != RuleTag::Action {
        return Err(RuleError::WrongRuleKind {
            rule: referrer.to_string(),
            reference: name.to_string(),
            found: found.as_str(),
        });
    }
    Ok(id)
}
