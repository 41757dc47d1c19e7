//! Utterance normalization into lower-case word tokens.

use std::sync::LazyLock;

use regex::Regex;

static RE_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\w\d]+").unwrap());

/// Split `utterance` on whitespace and keep the run of word characters each
/// segment starts with, lower-cased. Segments that start with anything else
/// (`"(maybe)"`, `"'quoted'"`, pure punctuation) are dropped.
pub fn normalize(utterance: &str) -> Vec<String> {
    utterance
        .split_whitespace()
        .filter_map(|segment| RE_WORD.find(segment))
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// The stimulus phrase the selector matches trigger phrases against.
pub fn stimulus_phrase<S: AsRef<str>>(tokens: &[S]) -> String {
    tokens
        .iter()
        .map(|t| t.as_ref())
        .collect::<Vec<&str>>()
        .join(" ")
}
