//! Per-session conversation state and its rebuild from a persisted log.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::question_bank;
use super::similarity::{normalize, NormalizedText};
use super::AssessmentError;
use crate::models::{AnsweredEvent, Phase, Question, QuestionSource};

/// Question text and the answer given, as used in prompts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedAnswer {
    pub question: String,
    pub answer: String,
}

impl RecordedAnswer {
    pub fn new(question: &str, answer: &str) -> Self {
        Self {
            question: question.to_string(),
            answer: answer.to_string(),
        }
    }
}

/// Mutable state of one assessment.
///
/// `asked_questions` only grows, `fixed_index` only increases and never
/// passes the bank size, and `phase` only moves forward. The asked history
/// holds answered questions; a question still awaiting its answer is
/// tracked by the controller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationState {
    complaint: String,
    phase: Phase,
    fixed_index: usize,
    asked_questions: Vec<String>,
    asked_normalized: BTreeSet<NormalizedText>,
    answers: Vec<RecordedAnswer>,
    turn_count: usize,
    log: Vec<AnsweredEvent>,
}

impl ConversationState {
    pub fn new(complaint: &str) -> Self {
        let complaint = complaint.trim().to_string();
        Self {
            log: vec![AnsweredEvent::complaint(&complaint)],
            complaint,
            phase: Phase::Fixed,
            fixed_index: 0,
            asked_questions: Vec::new(),
            asked_normalized: BTreeSet::new(),
            answers: Vec::new(),
            turn_count: 0,
        }
    }

    /// Rebuild state from a persisted event log.
    ///
    /// The fixed index is restored by counting answered bank questions and
    /// then skipping any bank question already asked. Phase is derived:
    /// `Summarizing` at the question cap, `Dynamic` once the bank is used
    /// up, `Fixed` otherwise.
    pub fn replay(events: &[AnsweredEvent], max_total_questions: usize) -> Result<Self, AssessmentError> {
        let complaint = events
            .iter()
            .find(|e| e.source == QuestionSource::Complaint)
            .ok_or(AssessmentError::MissingComplaint)?;

        let mut state = Self::new(&complaint.answer);
        state.log = vec![complaint.clone()];

        let mut fixed_answered: BTreeSet<usize> = BTreeSet::new();
        for event in events.iter().filter(|e| e.source != QuestionSource::Complaint) {
            if let Some(position) = question_bank::position_of(&event.question) {
                fixed_answered.insert(position);
            }
            state.apply_answer(event.clone());
            state.turn_count += 1;
        }

        state.fixed_index = fixed_answered.len().min(question_bank::len());
        state.settle_fixed_index();

        state.phase = if state.turn_count >= max_total_questions {
            Phase::Summarizing
        } else if state.fixed_index >= question_bank::len() {
            Phase::Dynamic
        } else {
            Phase::Fixed
        };

        tracing::debug!(
            events = events.len(),
            fixed_index = state.fixed_index,
            turn = state.turn_count,
            phase = %state.phase,
            "Conversation state replayed"
        );
        Ok(state)
    }

    pub fn complaint(&self) -> &str {
        &self.complaint
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn fixed_index(&self) -> usize {
        self.fixed_index
    }

    /// Answered question texts in asking order.
    pub fn asked_questions(&self) -> &[String] {
        &self.asked_questions
    }

    /// Normalized form of every asked question.
    pub fn asked_set(&self) -> &BTreeSet<NormalizedText> {
        &self.asked_normalized
    }

    pub fn answers(&self) -> &[RecordedAnswer] {
        &self.answers
    }

    pub fn turn_count(&self) -> usize {
        self.turn_count
    }

    /// Ordered event log, complaint first.
    pub fn log(&self) -> &[AnsweredEvent] {
        &self.log
    }

    pub fn has_asked(&self, text: &str) -> bool {
        self.asked_normalized.contains(&normalize(text))
    }

    /// Record an answer to `question`. Answers to a question already on
    /// record replace the earlier answer in place.
    pub fn record_answer(&mut self, question: &str, answer: &str, source: QuestionSource) {
        self.apply_answer(AnsweredEvent::answer(question, answer, source));
    }

    fn apply_answer(&mut self, event: AnsweredEvent) {
        if self.asked_normalized.insert(normalize(&event.question)) {
            self.asked_questions.push(event.question.clone());
        }

        match self.answers.iter_mut().find(|a| a.question == event.question) {
            Some(existing) => existing.answer = event.answer.clone(),
            None => self
                .answers
                .push(RecordedAnswer::new(&event.question, &event.answer)),
        }

        self.log.push(event);
    }

    /// Count a question as presented.
    pub fn mark_presented(&mut self) {
        self.turn_count += 1;
    }

    /// Move past the current fixed question, then past any already asked.
    pub fn advance_fixed(&mut self) {
        if self.fixed_index < question_bank::len() {
            self.fixed_index += 1;
        }
        self.settle_fixed_index();
    }

    /// Skip bank questions already asked (for example after a resume).
    pub fn settle_fixed_index(&mut self) {
        while let Some(question) = question_bank::next_fixed(self.fixed_index) {
            if !self.has_asked(&question.text) {
                break;
            }
            tracing::debug!(index = self.fixed_index, "Skipping fixed question already asked");
            self.fixed_index += 1;
        }
    }

    /// Fixed question at the current index, if the bank is not exhausted.
    pub fn next_fixed_question(&self) -> Option<Question> {
        question_bank::next_fixed(self.fixed_index)
    }

    /// Move to `to` if it is later than the current phase. Returns whether it moved.
    pub fn set_phase(&mut self, to: Phase) -> bool {
        if to.ordinal() <= self.phase.ordinal() {
            return false;
        }
        self.phase = to;
        true
    }
}
