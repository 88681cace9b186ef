//! Fixed intake questions asked before any generated follow-up.

use std::sync::LazyLock;

use super::similarity::{normalize, NormalizedText};
use crate::models::Question;

const FIXED_QUESTIONS: &[(&str, &[&str])] = &[
    (
        "How long have you been experiencing these symptoms?",
        &[
            "Less than 24 hours",
            "1-3 days",
            "4-7 days",
            "1-4 weeks",
            "More than a month",
        ],
    ),
    (
        "How severe are your symptoms right now?",
        &[
            "Mild - noticeable but manageable",
            "Moderate - affects daily activities",
            "Severe - hard to function",
            "Very severe - unbearable",
        ],
    ),
    (
        "What seems to trigger or worsen your symptoms?",
        &[
            "Physical activity",
            "Eating or drinking",
            "Stress or anxiety",
            "Certain positions or movements",
            "Time of day",
            "Nothing specific",
        ],
    ),
    (
        "Do you have any relevant medical history?",
        &[
            "No known conditions",
            "Chronic condition (diabetes, hypertension, asthma)",
            "Previous similar episodes",
            "Recent surgery or injury",
            "Taking regular medication",
        ],
    ),
];

static BANK: LazyLock<Vec<Question>> = LazyLock::new(|| {
    FIXED_QUESTIONS
        .iter()
        .map(|&(text, labels)| Question::from_labels(text, labels))
        .collect()
});

static BANK_NORMALIZED: LazyLock<Vec<NormalizedText>> =
    LazyLock::new(|| BANK.iter().map(|q| normalize(&q.text)).collect());

/// Fixed question at `index`, or `None` once the bank is exhausted.
pub fn next_fixed(index: usize) -> Option<Question> {
    BANK.get(index).cloned()
}

/// Number of fixed questions.
pub fn len() -> usize {
    BANK.len()
}

/// All fixed questions in asking order.
pub fn questions() -> &'static [Question] {
    &BANK
}

/// Bank position of a question, matched on normalized text.
pub fn position_of(text: &str) -> Option<usize> {
    let normalized = normalize(text);
    BANK_NORMALIZED.iter().position(|n| *n == normalized)
}

pub fn is_fixed(text: &str) -> bool {
    position_of(text).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn four_fixed_questions_in_order() {
        assert_eq!(len(), 4);
        assert!(next_fixed(0).unwrap().text.contains("How long"));
        assert!(next_fixed(1).unwrap().text.contains("severe"));
        assert!(next_fixed(2).unwrap().text.contains("trigger"));
        assert!(next_fixed(3).unwrap().text.contains("medical history"));
        assert!(next_fixed(4).is_none());
    }

    #[test]
    fn every_question_has_three_to_six_unique_options() {
        for q in questions() {
            assert!((3..=6).contains(&q.options.len()), "{}", q.text);
            let values: HashSet<_> = q.options.iter().map(|o| &o.value).collect();
            assert_eq!(values.len(), q.options.len(), "{}", q.text);
            assert!(q.allows_custom_answer());
        }
    }

    #[test]
    fn position_ignores_case_and_punctuation() {
        assert_eq!(position_of("how severe are your symptoms right now"), Some(1));
        assert!(is_fixed("DO YOU HAVE ANY RELEVANT MEDICAL HISTORY??"));
        assert!(!is_fixed("Where is the pain?"));
    }
}
