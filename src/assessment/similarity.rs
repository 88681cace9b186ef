//! Near-duplicate detection for questions.
//!
//! Generated follow-ups often rephrase earlier questions, so plain string
//! equality misses most repeats. Three checks are applied in order:
//! normalized equality, containment between long normalized forms, and
//! token overlap.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::AssessmentConfig;

/// Lower-cased text with every non-alphanumeric character removed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedText(String);

impl NormalizedText {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn char_len(&self) -> usize {
        self.0.chars().count()
    }
}

impl fmt::Display for NormalizedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalize for comparison. Idempotent.
pub fn normalize(text: &str) -> NormalizedText {
    NormalizedText(
        text.to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect(),
    )
}

/// Content tokens: lower-cased words stripped of punctuation, longer than 2 chars.
fn tokens(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|w| w.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
        .filter(|w| w.chars().count() > 2)
        .collect()
}

/// Shared tokens divided by the larger token-set size.
pub fn token_overlap(a: &str, b: &str) -> f64 {
    let ta = tokens(a);
    let tb = tokens(b);
    let larger = ta.len().max(tb.len());
    if larger == 0 {
        return 0.0;
    }
    let shared = ta.intersection(&tb).count();
    shared as f64 / larger as f64
}

/// Question comparator with tunable thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityChecker {
    pub threshold: f64,
    pub containment_min_len: usize,
}

impl Default for SimilarityChecker {
    fn default() -> Self {
        Self {
            threshold: 0.8,
            containment_min_len: 10,
        }
    }
}

impl SimilarityChecker {
    pub fn from_config(config: &AssessmentConfig) -> Self {
        Self {
            threshold: config.similarity_threshold,
            containment_min_len: config.containment_min_len,
        }
    }

    pub fn are_similar(&self, a: &str, b: &str) -> bool {
        let na = normalize(a);
        let nb = normalize(b);

        if na == nb {
            return true;
        }

        if na.char_len() > self.containment_min_len
            && nb.char_len() > self.containment_min_len
            && (na.as_str().contains(nb.as_str()) || nb.as_str().contains(na.as_str()))
        {
            return true;
        }

        token_overlap(a, b) > self.threshold
    }

    /// True when `candidate` is similar to any previously asked question.
    pub fn is_already_asked<I, S>(&self, candidate: &str, asked: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        asked
            .into_iter()
            .any(|previous| self.are_similar(candidate, previous.as_ref()))
    }
}

/// `SimilarityChecker::default().are_similar(a, b)`.
pub fn are_similar(a: &str, b: &str) -> bool {
    SimilarityChecker::default().are_similar(a, b)
}

/// `SimilarityChecker::default().is_already_asked(candidate, asked)`.
pub fn is_already_asked<I, S>(candidate: &str, asked: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    SimilarityChecker::default().is_already_asked(candidate, asked)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_and_lowercases() {
        assert_eq!(normalize("How long? (Days)").as_str(), "howlongdays");
        assert_eq!(normalize("  ").as_str(), "");
    }

    #[test]
    fn normalize_is_idempotent() {
        for text in [
            "Where is the PAIN located?",
            "İstanbul — ÅNGSTRÖM 42°C",
            "",
            "!!!",
            "ß and ǅ",
        ] {
            let once = normalize(text);
            let twice = normalize(once.as_str());
            assert_eq!(once, twice, "{text}");
        }
    }

    #[test]
    fn equal_after_normalization() {
        assert!(are_similar("Where is the pain?", "where is the pain"));
    }

    #[test]
    fn containment_requires_long_strings() {
        assert!(are_similar(
            "Do you have a fever?",
            "Do you have a fever or chills at night?"
        ));
        // "pain" / "painful" are too short for containment.
        assert!(!are_similar("Pain?", "Painful?"));
    }

    #[test]
    fn token_overlap_catches_reordering() {
        assert!(are_similar(
            "How severe is your chest pain today?",
            "Today, how severe is your chest pain?"
        ));
    }

    #[test]
    fn different_questions_are_not_similar() {
        assert!(!are_similar(
            "Does the pain spread to your arm or jaw?",
            "Have you had a fever in the last two days?"
        ));
    }

    #[test]
    fn short_tokens_do_not_count() {
        // "is", "it" and "a" are dropped; only "cat" is shared.
        assert_eq!(token_overlap("is it a cat", "is it a cat and"), 0.5);
        assert_eq!(token_overlap("is it", "or a"), 0.0);
    }

    #[test]
    fn overlap_uses_larger_set() {
        // 3 shared of max(3, 5) tokens.
        let ratio = token_overlap("sharp chest pain", "sharp chest pain when breathing");
        assert!((ratio - 0.6).abs() < 1e-9);
    }

    #[test]
    fn already_asked_checks_every_entry() {
        let asked = vec![
            "How long have you had the symptoms?".to_string(),
            "Where is the pain located?".to_string(),
        ];
        assert!(is_already_asked("where is the pain located", &asked));
        assert!(!is_already_asked("Do you feel short of breath?", &asked));
        assert!(!is_already_asked("Anything else?", Vec::<String>::new()));
    }

    #[test]
    fn threshold_is_configurable() {
        let strict = SimilarityChecker {
            threshold: 0.5,
            containment_min_len: 10,
        };
        let a = "Is the chest pain sharp?";
        let b = "Would you call the chest pain sharp?";
        assert!(strict.are_similar(a, b));
        assert!(!are_similar(a, b));
    }
}
