//! A rule base paired with its own random source.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::base::RuleBase;
use crate::error::RuleResult;
use crate::language::normalize;
use crate::selector::{Reply, Selector, SelectorOptions};

/// Owns a rule base for one conversation (or several, when shared) and
/// turns raw utterances into replies.
#[derive(Debug, Clone)]
pub struct Engine<R = StdRng> {
    base: RuleBase,
    rng: R,
    options: SelectorOptions,
}

impl Engine<StdRng> {
    /// Engine seeded from OS entropy.
    pub fn new(base: RuleBase) -> Self {
        Self::with_rng(base, StdRng::from_entropy())
    }

    /// Engine with a fixed seed, for reproducible conversations.
    pub fn seeded(base: RuleBase, seed: u64) -> Self {
        Self::with_rng(base, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> Engine<R> {
    pub fn with_rng(base: RuleBase, rng: R) -> Self {
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

    pub fn options(&self) -> SelectorOptions {
        self.options
    }

    pub fn base(&self) -> &RuleBase {
        &self.base
    }

    /// Fire the first action, which opens every conversation.
    pub fn first_greeting(&mut self) -> RuleResult<String> {
        self.base.fire_first(&mut self.rng)
    }

    /// Normalize `utterance` and select a reply for it.
    pub fn respond(&mut self, utterance: &str) -> RuleResult<String> {
        self.respond_reply(utterance).map(|reply| reply.text)
    }

    pub fn respond_reply(&mut self, utterance: &str) -> RuleResult<Reply> {
        let tokens = normalize(utterance);
        Selector::new(&mut self.base, &mut self.rng)
            .with_options(self.options)
            .select_reply(&tokens)
    }
}
