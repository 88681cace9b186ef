use serde::{Deserialize, Serialize};

use super::enums::QuestionSource;

/// One selectable answer. `value` is unique within its question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub label: String,
    pub value: String,
}

impl QuestionOption {
    pub fn new(label: &str, value: &str) -> Self {
        Self {
            label: label.to_string(),
            value: value.to_string(),
        }
    }
}

/// A question with options in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    pub options: Vec<QuestionOption>,
}

impl Question {
    pub fn new(text: &str, options: Vec<QuestionOption>) -> Self {
        Self {
            text: text.to_string(),
            options,
        }
    }

    /// Build a question whose option values are derived from the labels.
    ///
    /// Labels that slug to an already-used value are dropped so values stay unique.
    pub fn from_labels<S: AsRef<str>>(text: &str, labels: &[S]) -> Self {
        let mut options: Vec<QuestionOption> = Vec::with_capacity(labels.len());
        for label in labels {
            let label = label.as_ref().trim();
            let value = option_value(label);
            if value.is_empty() || options.iter().any(|o| o.value == value) {
                continue;
            }
            options.push(QuestionOption::new(label, &value));
        }
        Self::new(text, options)
    }

    pub fn option_by_value(&self, value: &str) -> Option<&QuestionOption> {
        self.options.iter().find(|o| o.value == value)
    }

    /// Every question accepts a typed answer in place of its options.
    pub fn allows_custom_answer(&self) -> bool {
        true
    }
}

/// Slug used as an option value: lowercase alphanumerics joined by `_`.
pub fn option_value(label: &str) -> String {
    label
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// The patient's reply to a presented question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Answer {
    /// Value of one of the question's options.
    Option(String),
    /// Free text typed by the patient.
    Custom(String),
}

/// A question together with exactly one recorded answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnsweredQuestion {
    pub question: Question,
    pub selected_value: Option<String>,
    pub free_text_answer: Option<String>,
}

impl AnsweredQuestion {
    pub fn with_option(question: Question, value: &str) -> Self {
        Self {
            question,
            selected_value: Some(value.to_string()),
            free_text_answer: None,
        }
    }

    pub fn with_free_text(question: Question, text: &str) -> Self {
        Self {
            question,
            selected_value: None,
            free_text_answer: Some(text.to_string()),
        }
    }

    /// Text used in prompts and the event log: the option label or the typed answer.
    pub fn answer_text(&self) -> String {
        if let Some(text) = &self.free_text_answer {
            return text.clone();
        }
        self.selected_value
            .as_deref()
            .map(|value| {
                self.question
                    .option_by_value(value)
                    .map(|o| o.label.clone())
                    .unwrap_or_else(|| value.to_string())
            })
            .unwrap_or_default()
    }
}

/// A question currently shown to the patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentedQuestion {
    pub question: Question,
    pub source: QuestionSource,
    /// 1-based position of this question in the session.
    pub turn: usize,
    pub max_turns: usize,
    pub allows_custom_answer: bool,
}

impl PresentedQuestion {
    /// Fraction of the question cap used, in `0.0..=1.0`.
    pub fn progress(&self) -> f32 {
        if self.max_turns == 0 {
            return 1.0;
        }
        (self.turn as f32 / self.max_turns as f32).min(1.0)
    }
}
