//! Stimulus → response selection.
//!
//! One call per utterance, in fixed order:
//! 1. optional intro, drawn with a small probability;
//! 2. trigger phrases found in the stimulus add their invoked actions;
//! 3. fuzzy rules named in the stimulus add one member each, by weight;
//! 4. a uniform pick among the candidates, or among eligible actions when
//!    nothing matched;
//! 5. the chosen action fires and its text (after the intro) is the reply.

use std::collections::BTreeSet;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::base::{RuleBase, RuleId};
use crate::error::{RuleError, RuleResult};
use crate::language::stimulus_phrase;

/// Probability of prefixing a reply with an intro line.
pub const DEFAULT_INTRO_PROBABILITY: f64 = 0.03;

/// Tunables for [`Selector`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectorOptions {
    /// Chance in `[0, 1]` of drawing an intro. Out-of-range values are clamped.
    pub intro_probability: f64,
}

impl Default for SelectorOptions {
    fn default() -> Self {
        Self {
            intro_probability: DEFAULT_INTRO_PROBABILITY,
        }
    }
}

impl SelectorOptions {
    fn intro_chance(&self) -> f64 {
        if self.intro_probability.is_nan() {
            0.0
        } else {
            self.intro_probability.clamp(0.0, 1.0)
        }
    }
}

/// Outcome of one selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Full reply text: intro line (if any) directly followed by the action
    /// line.
    pub text: String,
    /// Name of the action rule that fired.
    pub rule: String,
    /// Name of the intro rule drawn, if any.
    pub intro: Option<String>,
    /// True when no trigger matched and the eligible pool was used.
    pub fallback: bool,
}

/// Borrows a rule base and a random source for the duration of a selection.
pub struct Selector<'a, R: Rng + ?Sized> {
    base: &'a mut RuleBase,
    rng: &'a mut R,
    options: SelectorOptions,
}

impl<'a, R: Rng + ?Sized> Selector<'a, R> {
    pub fn new(base: &'a mut RuleBase, rng: &'a mut R) -> Self {
        Self {
            base,
            rng,
            options: SelectorOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SelectorOptions) -> Self {
        self.options = options;
        self
    }

    /// Select a reply for `tokens` and return its text.
    pub fn select<S: AsRef<str>>(&mut self, tokens: &[S]) -> RuleResult<String> {
        self.select_reply(tokens).map(|reply| reply.text)
    }

    /// Select a reply for `tokens`, reporting which rules produced it.
    pub fn select_reply<S: AsRef<str>>(&mut self, tokens: &[S]) -> RuleResult<Reply> {
        let intro = self.draw_intro()?;
        let phrase = stimulus_phrase(tokens);

        let mut candidates = self.triggered_actions(&phrase);
        self.add_fuzzy_members(&phrase, &mut candidates);

        let fallback = candidates.is_empty();
        let chosen = if fallback {
            self.base
                .eligible_actions()
                .choose(&mut *self.rng)
                .copied()
                .ok_or(RuleError::NoEligibleAction)?
        } else {
            candidates
                .iter()
                .copied()
                .collect::<Vec<_>>()
                .choose(&mut *self.rng)
                .copied()
                .ok_or(RuleError::NoEligibleAction)?
        };

        let rule = self.base.rule_mut(chosen);
        let body = rule.fire(&mut *self.rng)?;
        let name = rule.name.clone();

        tracing::debug!(
            rule = %name,
            fire_count = rule.fire_count,
            candidates = candidates.len(),
            fallback,
            intro = ?intro.as_ref().map(|(n, _)| n),
            "action selected"
        );

        let (intro, text) = match intro {
            Some((intro_name, intro_text)) => (Some(intro_name), format!("{intro_text}{body}")),
            None => (None, body),
        };

        Ok(Reply {
            text,
            rule: name,
            intro,
            fallback,
        })
    }

    /// Intros are drawn without touching their fire counter.
    fn draw_intro(&mut self) -> RuleResult<Option<(String, String)>> {
        if self.base.intros().is_empty() || !self.rng.gen_bool(self.options.intro_chance()) {
            return Ok(None);
        }
        let Some(&id) = self.base.intros().choose(&mut *self.rng) else {
            return Ok(None);
        };
        let rule = self.base.rule(id);
        let text = rule.draw_line(&mut *self.rng)?.to_string();
        Ok(Some((rule.name.clone(), text)))
    }

    fn triggered_actions(&self, phrase: &str) -> BTreeSet<RuleId> {
        self.base
            .regex_phrases()
            .iter()
            .filter(|(trigger, _)| phrase.contains(trigger.as_str()))
            .flat_map(|(_, actions)| actions.iter().copied())
            .collect()
    }

    fn add_fuzzy_members(&mut self, phrase: &str, candidates: &mut BTreeSet<RuleId>) {
        for set in self.base.fuzzy_index().matching(phrase) {
            candidates.insert(set.draw(&mut *self.rng));
        }
    }
}
