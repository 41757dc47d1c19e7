//! Weighted associations from a fuzzy rule's name to actions.

use std::collections::BTreeMap;

use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};

use crate::base::RuleId;
use crate::error::{RuleError, RuleResult};

/// Resolved members of one fuzzy rule with a cumulative-weight sampler.
#[derive(Debug, Clone)]
pub struct FuzzySet {
    members: Vec<(RuleId, f64)>,
    sampler: WeightedIndex<f64>,
}

impl FuzzySet {
    /// Build a set from resolved `(action, normalized weight)` pairs.
    pub fn new(rule: &str, members: Vec<(RuleId, f64)>) -> RuleResult<Self> {
        let sampler = WeightedIndex::new(members.iter().map(|(_, w)| *w))
            .map_err(|_| RuleError::EmptyTemplate(rule.to_string()))?;
        Ok(Self { members, sampler })
    }

    pub fn members(&self) -> &[(RuleId, f64)] {
        &self.members
    }

    /// Pick one member with probability proportional to its weight.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> RuleId {
        self.members[self.sampler.sample(rng)].0
    }
}

/// Fuzzy-rule name → weighted member set.
#[derive(Debug, Clone, Default)]
pub struct FuzzyIndex {
    sets: BTreeMap<String, FuzzySet>,
}

impl FuzzyIndex {
    pub fn insert(&mut self, key: String, set: FuzzySet) {
        self.sets.insert(key, set);
    }

    pub fn get(&self, key: &str) -> Option<&FuzzySet> {
        self.sets.get(key)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FuzzySet)> {
        self.sets.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Entries whose key occurs as a substring of `phrase`.
    pub fn matching<'a>(&'a self, phrase: &'a str) -> impl Iterator<Item = &'a FuzzySet> + 'a {
        self.sets
            .iter()
            .filter(move |(key, _)| phrase.contains(key.as_str()))
            .map(|(_, set)| set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn empty_index() {
        let index = FuzzyIndex::default();
        assert!(index.is_empty());
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn draw_follows_weights() {
        let set = FuzzySet::new("pets", vec![(RuleId(0), 0.75), (RuleId(1), 0.25)]).unwrap();
        let mut rng = StdRng::seed_from_u64(42);

        let mut first = 0;
        for _ in 0..4000 {
            if set.draw(&mut rng) == RuleId(0) {
                first += 1;
            }
        }
        // 3000 expected; allow generous slack.
        assert!((2700..3300).contains(&first), "drew first member {first} times");
    }

    #[test]
    fn single_member_always_drawn() {
        let set = FuzzySet::new("only", vec![(RuleId(3), 1.0)]).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..10 {
            assert_eq!(set.draw(&mut rng), RuleId(3));
        }
    }

    #[test]
    fn no_members_is_an_error() {
        assert!(FuzzySet::new("none", Vec::new()).is_err());
    }

    #[test]
    fn matching_uses_substring_containment() {
        let mut index = FuzzyIndex::default();
        index.insert("cat".into(), FuzzySet::new("cat", vec![(RuleId(0), 1.0)]).unwrap());
        index.insert("dog".into(), FuzzySet::new("dog", vec![(RuleId(1), 1.0)]).unwrap());

        assert_eq!(index.matching("i like cats").count(), 1);
        assert_eq!(index.matching("cat and dog").count(), 2);
        assert_eq!(index.matching("birds").count(), 0);
        assert!(index.get("dog").is_some());
        assert!(!index.is_empty());
    }
}
