use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::QuestionSource;

/// Heading stored with the complaint event.
pub const COMPLAINT_QUESTION: &str = "Chief complaint";

/// One entry of the persisted session log.
///
/// The log is the only thing persisted; phase, fixed index, asked history
/// and answers are recomputed from it on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnsweredEvent {
    pub question: String,
    pub answer: String,
    pub source: QuestionSource,
    pub answered_at: DateTime<Utc>,
}

impl AnsweredEvent {
    pub fn complaint(text: &str) -> Self {
        Self {
            question: COMPLAINT_QUESTION.to_string(),
            answer: text.to_string(),
            source: QuestionSource::Complaint,
            answered_at: Utc::now(),
        }
    }

    pub fn answer(question: &str, answer: &str, source: QuestionSource) -> Self {
        Self {
            question: question.to_string(),
            answer: answer.to_string(),
            source,
            answered_at: Utc::now(),
        }
    }
}
