//! Assessment conversation state machine.
//!
//! Fixed → Dynamic → Summarizing → Done. The only suspension points are the
//! completion calls in Dynamic and Summarizing; callers either drive them
//! synchronously with [`AssessmentController::advance`] and
//! [`AssessmentController::summarize`], or take a [`CompletionTicket`] and
//! hand the result back later through
//! [`AssessmentController::apply_completion`].

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::follow_up::{fallback_candidates, is_enough_info, parse_follow_up};
use super::prompt::{
    build_follow_up_prompt, build_summary_prompt, contains_error_marker, SUMMARY_HEADINGS,
};
use super::similarity::SimilarityChecker;
use super::state::ConversationState;
use super::summary_parser::{self, FALLBACK_SECTION};
use super::{specialty, AssessmentError};
use crate::completion::{CompletionClient, CompletionError};
use crate::config::AssessmentConfig;
use crate::models::{
    Answer, AnsweredEvent, AnsweredQuestion, AssessmentOutcome, Phase, PresentedQuestion,
    Question, QuestionSource, SummarySection,
};
use crate::store::{SessionStore, SessionWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionKind {
    FollowUp,
    Summary,
}

/// A pending completion request.
///
/// The phase, turn, attempt and serial it was issued with are checked when
/// the result comes back; a ticket that no longer matches is dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionTicket {
    pub kind: CompletionKind,
    pub prompt: String,
    pub phase: Phase,
    pub turn_count: usize,
    pub attempt: usize,
    /// Issue number within the session; a reissued request gets a new one.
    pub serial: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionReason {
    FixedQuestionsExhausted,
    EnoughInformation,
    DuplicateQuestionExhausted,
    MaxQuestionsReached,
    FallbackExhausted,
    SummaryProduced,
}

/// Notifications for the presentation layer, read with `drain_events`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssessmentEvent {
    QuestionPresented {
        question: PresentedQuestion,
    },
    PhaseChanged {
        from: Phase,
        to: Phase,
        reason: TransitionReason,
    },
    SummaryReady {
        outcome: AssessmentOutcome,
    },
    ErrorOccurred {
        message: String,
    },
}

/// What the caller should do next.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Show this question and wait for `submit_answer`.
    Question(PresentedQuestion),
    /// A completion call is needed before anything else can happen.
    AwaitingCompletion(CompletionKind),
    Complete(AssessmentOutcome),
}

pub struct AssessmentController {
    session_id: Uuid,
    config: AssessmentConfig,
    similarity: SimilarityChecker,
    state: ConversationState,
    pending: Option<PresentedQuestion>,
    in_flight: Option<u64>,
    next_serial: u64,
    dynamic_attempts: usize,
    summary_attempts: usize,
    outcome: Option<AssessmentOutcome>,
    events: Vec<AssessmentEvent>,
}

impl AssessmentController {
    /// Start a new assessment. The first fixed question is presented immediately.
    pub fn new(complaint: &str, config: AssessmentConfig) -> Result<Self, AssessmentError> {
        if complaint.trim().is_empty() {
            return Err(AssessmentError::MissingComplaint);
        }
        let state = ConversationState::new(complaint);
        let mut controller = Self::with_state(Uuid::new_v4(), state, config);
        tracing::info!(session_id = %controller.session_id, "Assessment started");
        controller.prepare_next();
        Ok(controller)
    }

    /// Rebuild a session from its persisted event log.
    pub fn resume(
        session_id: Uuid,
        events: &[AnsweredEvent],
        config: AssessmentConfig,
    ) -> Result<Self, AssessmentError> {
        let state = ConversationState::replay(events, config.max_total_questions)?;
        let mut controller = Self::with_state(session_id, state, config);
        tracing::info!(
            session_id = %session_id,
            phase = %controller.state.phase(),
            turn = controller.state.turn_count(),
            "Assessment resumed"
        );
        controller.prepare_next();
        Ok(controller)
    }

    /// Load and resume a stored session. `Ok(None)` if the store has no such session.
    pub fn load(
        store: &dyn SessionStore,
        session_id: Uuid,
        config: AssessmentConfig,
    ) -> Result<Option<Self>, AssessmentError> {
        match store.load_session(session_id)? {
            Some(events) => Ok(Some(Self::resume(session_id, &events, config)?)),
            None => Ok(None),
        }
    }

    /// Persist the event log synchronously.
    pub fn save(&self, store: &dyn SessionStore) -> Result<(), AssessmentError> {
        store.save_session(self.session_id, self.state.log())?;
        Ok(())
    }

    /// Hand the current log to a background writer without waiting.
    pub fn queue_save(&self, writer: &SessionWriter) -> Result<(), AssessmentError> {
        writer.submit(self.session_id, self.state.log().to_vec())?;
        Ok(())
    }

    fn with_state(session_id: Uuid, state: ConversationState, config: AssessmentConfig) -> Self {
        Self {
            session_id,
            similarity: SimilarityChecker::from_config(&config),
            config,
            state,
            pending: None,
            in_flight: None,
            next_serial: 1,
            dynamic_attempts: 0,
            summary_attempts: 0,
            outcome: None,
            events: Vec::new(),
        }
    }

    // ── Accessors ──────────────────────────────────────────

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn turn_count(&self) -> usize {
        self.state.turn_count()
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn config(&self) -> &AssessmentConfig {
        &self.config
    }

    pub fn current_question(&self) -> Option<&PresentedQuestion> {
        self.pending.as_ref()
    }

    pub fn outcome(&self) -> Option<&AssessmentOutcome> {
        self.outcome.as_ref()
    }

    /// Ordered log to persist. Complaint first.
    pub fn event_log(&self) -> &[AnsweredEvent] {
        self.state.log()
    }

    /// Take all notifications emitted since the last call.
    pub fn drain_events(&mut self) -> Vec<AssessmentEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn step(&self) -> Step {
        if let Some(outcome) = &self.outcome {
            return Step::Complete(outcome.clone());
        }
        if let Some(question) = &self.pending {
            return Step::Question(question.clone());
        }
        match self.state.phase() {
            Phase::Fixed | Phase::Dynamic => Step::AwaitingCompletion(CompletionKind::FollowUp),
            Phase::Summarizing | Phase::Done => Step::AwaitingCompletion(CompletionKind::Summary),
        }
    }

    // ── Answers ────────────────────────────────────────────

    /// Record an answer to the pending question and move the conversation on.
    pub fn submit_answer(&mut self, answer: Answer) -> Result<Step, AssessmentError> {
        if self.state.phase() == Phase::Done {
            return Err(AssessmentError::SessionFinished);
        }
        let pending = self.pending.as_ref().ok_or(AssessmentError::NoPendingQuestion)?;

        let answered = match answer {
            Answer::Option(value) => {
                if pending.question.option_by_value(&value).is_none() {
                    return Err(AssessmentError::InvalidAnswer(format!(
                        "'{value}' is not an option of the current question"
                    )));
                }
                AnsweredQuestion::with_option(pending.question.clone(), &value)
            }
            Answer::Custom(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return Err(AssessmentError::InvalidAnswer(
                        "typed answer is empty".to_string(),
                    ));
                }
                AnsweredQuestion::with_free_text(pending.question.clone(), text)
            }
        };

        let source = pending.source;
        self.pending = None;
        self.state
            .record_answer(&answered.question.text, &answered.answer_text(), source);
        if source == QuestionSource::Fixed {
            self.state.advance_fixed();
        }

        tracing::info!(
            turn = self.state.turn_count(),
            source = %source,
            custom = answered.free_text_answer.is_some(),
            "Answer recorded"
        );

        self.prepare_next();
        Ok(self.step())
    }

    /// Present the next fixed question, or move phase when none is due.
    fn prepare_next(&mut self) {
        loop {
            match self.state.phase() {
                Phase::Fixed => {
                    if self.at_question_cap() {
                        self.transition(Phase::Summarizing, TransitionReason::MaxQuestionsReached);
                        return;
                    }
                    match self.state.next_fixed_question() {
                        Some(question) => {
                            self.present(question, QuestionSource::Fixed);
                            return;
                        }
                        None => {
                            self.transition(Phase::Dynamic, TransitionReason::FixedQuestionsExhausted)
                        }
                    }
                }
                Phase::Dynamic => {
                    if self.at_question_cap() {
                        self.transition(Phase::Summarizing, TransitionReason::MaxQuestionsReached);
                    } else {
                        self.dynamic_attempts = 0;
                    }
                    return;
                }
                Phase::Summarizing | Phase::Done => return,
            }
        }
    }

    fn at_question_cap(&self) -> bool {
        self.state.turn_count() >= self.config.max_total_questions
    }

    fn present(&mut self, question: Question, source: QuestionSource) {
        self.state.mark_presented();
        self.dynamic_attempts = 0;

        let presented = PresentedQuestion {
            allows_custom_answer: question.allows_custom_answer(),
            question,
            source,
            turn: self.state.turn_count(),
            max_turns: self.config.max_total_questions,
        };
        tracing::info!(
            turn = presented.turn,
            source = %source,
            options = presented.question.options.len(),
            "Question presented"
        );

        self.events.push(AssessmentEvent::QuestionPresented {
            question: presented.clone(),
        });
        self.pending = Some(presented);
    }

    fn transition(&mut self, to: Phase, reason: TransitionReason) {
        let from = self.state.phase();
        if self.state.set_phase(to) {
            tracing::info!(from = %from, to = %to, reason = ?reason, "Phase changed");
            self.events
                .push(AssessmentEvent::PhaseChanged { from, to, reason });
        }
    }

    // ── Completion calls ───────────────────────────────────

    /// Build the next completion request, if one is due.
    ///
    /// Returns `None` while a question awaits an answer, while an earlier
    /// ticket is still outstanding, or after the assessment is finished.
    /// The ticket stays outstanding until it is applied or abandoned.
    pub fn begin_completion(&mut self) -> Option<CompletionTicket> {
        if self.pending.is_some() || self.in_flight.is_some() {
            return None;
        }
        let phase = self.state.phase();
        let (kind, prompt, attempt) = match phase {
            Phase::Dynamic => (
                CompletionKind::FollowUp,
                build_follow_up_prompt(
                    self.state.complaint(),
                    self.state.answers(),
                    self.state.asked_questions(),
                ),
                self.dynamic_attempts + 1,
            ),
            Phase::Summarizing => (
                CompletionKind::Summary,
                build_summary_prompt(self.state.complaint(), self.state.answers()),
                self.summary_attempts + 1,
            ),
            Phase::Fixed | Phase::Done => return None,
        };

        let ticket = CompletionTicket {
            kind,
            prompt,
            phase,
            turn_count: self.state.turn_count(),
            attempt,
            serial: self.next_serial,
        };
        self.next_serial += 1;
        self.in_flight = Some(ticket.serial);
        Some(ticket)
    }

    /// Release the outstanding ticket without a result, e.g. when the
    /// caller cancelled the request. Its result is discarded if it arrives later.
    pub fn abandon_completion(&mut self) -> bool {
        match self.in_flight.take() {
            Some(serial) => {
                tracing::debug!(serial, "Completion abandoned");
                true
            }
            None => false,
        }
    }

    /// Whether a ticket has been handed out and not yet applied or abandoned.
    pub fn has_completion_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    fn is_current(&self, ticket: &CompletionTicket) -> bool {
        let expected_attempt = match ticket.kind {
            CompletionKind::FollowUp => self.dynamic_attempts + 1,
            CompletionKind::Summary => self.summary_attempts + 1,
        };
        self.in_flight == Some(ticket.serial)
            && self.pending.is_none()
            && self.state.phase() != Phase::Done
            && self.state.phase() == ticket.phase
            && self.state.turn_count() == ticket.turn_count
            && expected_attempt == ticket.attempt
    }

    /// Apply the result of a ticket's completion call.
    ///
    /// Stale tickets are discarded and the current step is returned
    /// unchanged. A failed or rejected summary returns
    /// `CompletionUnavailable` and leaves the phase at `Summarizing`.
    pub fn apply_completion(
        &mut self,
        ticket: CompletionTicket,
        result: Result<String, CompletionError>,
    ) -> Result<Step, AssessmentError> {
        if !self.is_current(&ticket) {
            tracing::debug!(
                kind = ?ticket.kind,
                ticket_turn = ticket.turn_count,
                ticket_attempt = ticket.attempt,
                ticket_serial = ticket.serial,
                phase = %self.state.phase(),
                "Discarding stale completion"
            );
            if self.in_flight == Some(ticket.serial) {
                self.in_flight = None;
            }
            return Ok(self.step());
        }
        self.in_flight = None;

        match ticket.kind {
            CompletionKind::FollowUp => {
                self.apply_follow_up(result);
                Ok(self.step())
            }
            CompletionKind::Summary => self.apply_summary(result),
        }
    }

    fn apply_follow_up(&mut self, result: Result<String, CompletionError>) {
        self.dynamic_attempts += 1;
        let attempt = self.dynamic_attempts;

        let text = match result {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(error = %err, attempt, "Follow-up generation failed, using fallback question");
                self.present_fallback();
                return;
            }
        };

        if is_enough_info(&text) {
            self.transition(Phase::Summarizing, TransitionReason::EnoughInformation);
            return;
        }

        match parse_follow_up(&text, &self.config) {
            Some(question)
                if !self
                    .similarity
                    .is_already_asked(&question.text, self.state.asked_questions()) =>
            {
                self.present(question, QuestionSource::Dynamic);
                return;
            }
            Some(_) => tracing::debug!(attempt, "Generated question repeats an earlier one"),
            None => tracing::debug!(attempt, response_len = text.len(), "No question found in reply"),
        }

        if attempt >= self.config.max_dynamic_attempts {
            tracing::info!(attempts = attempt, "No new follow-up question after retries");
            self.transition(Phase::Summarizing, TransitionReason::DuplicateQuestionExhausted);
        }
    }

    /// First canned question not already asked, or Summarizing when none is left.
    fn present_fallback(&mut self) {
        let candidate = fallback_candidates(self.state.complaint(), self.state.answers().len())
            .into_iter()
            .find(|q| {
                !self
                    .similarity
                    .is_already_asked(&q.text, self.state.asked_questions())
            });

        match candidate {
            Some(question) => self.present(question, QuestionSource::Dynamic),
            None => self.transition(Phase::Summarizing, TransitionReason::FallbackExhausted),
        }
    }

    fn apply_summary(
        &mut self,
        result: Result<String, CompletionError>,
    ) -> Result<Step, AssessmentError> {
        self.summary_attempts += 1;

        let text = match result {
            Ok(text) => text,
            Err(err) => return Err(self.summary_failed(err.to_string())),
        };
        if text.trim().is_empty() {
            return Err(self.summary_failed("summary response was empty".to_string()));
        }
        // Error phrases only count in replies without the requested headings.
        let parsed = summary_parser::parse(&text);
        if !has_requested_heading(&parsed)
            && contains_error_marker(&text, &self.config.error_markers)
        {
            return Err(self.summary_failed(
                "summary response looks like a provider error".to_string(),
            ));
        }

        let outcome = build_outcome(&text, parsed, self.state.complaint());
        tracing::info!(
            sections = outcome.sections.len(),
            specialties = outcome.specialties.len(),
            attempt = self.summary_attempts,
            "Assessment summary ready"
        );

        self.outcome = Some(outcome.clone());
        self.transition(Phase::Done, TransitionReason::SummaryProduced);
        self.events.push(AssessmentEvent::SummaryReady {
            outcome: outcome.clone(),
        });
        Ok(Step::Complete(outcome))
    }

    fn summary_failed(&mut self, message: String) -> AssessmentError {
        tracing::warn!(attempt = self.summary_attempts, reason = %message, "Summary generation failed");
        self.events.push(AssessmentEvent::ErrorOccurred {
            message: message.clone(),
        });
        AssessmentError::CompletionUnavailable(message)
    }

    // ── Synchronous driving ────────────────────────────────

    /// Run follow-up generation until a question is presented or the
    /// conversation reaches Summarizing.
    pub fn advance(&mut self, client: &dyn CompletionClient) -> Result<Step, AssessmentError> {
        loop {
            let Some(ticket) = self.begin_completion() else {
                return Ok(self.step());
            };
            if ticket.kind == CompletionKind::Summary {
                self.abandon_completion();
                return Ok(Step::AwaitingCompletion(CompletionKind::Summary));
            }

            let result = client.complete(&ticket.prompt);
            match self.apply_completion(ticket, result)? {
                Step::AwaitingCompletion(CompletionKind::FollowUp) => continue,
                step => return Ok(step),
            }
        }
    }

    /// Request the summary. On failure the phase stays `Summarizing` and
    /// the call can be repeated; the prompt is the same every time.
    pub fn summarize(
        &mut self,
        client: &dyn CompletionClient,
    ) -> Result<AssessmentOutcome, AssessmentError> {
        if let Some(outcome) = &self.outcome {
            return Ok(outcome.clone());
        }
        let phase = self.state.phase();
        if phase != Phase::Summarizing {
            return Err(AssessmentError::InvalidPhase {
                expected: Phase::Summarizing,
                actual: phase,
            });
        }
        let ticket = self
            .begin_completion()
            .ok_or(AssessmentError::CompletionInFlight)?;

        let result = client.complete(&ticket.prompt);
        match self.apply_completion(ticket, result)? {
            Step::Complete(outcome) => Ok(outcome),
            _ => Err(AssessmentError::InvalidPhase {
                expected: Phase::Summarizing,
                actual: self.state.phase(),
            }),
        }
    }
}

fn has_requested_heading(sections: &[SummarySection]) -> bool {
    sections.iter().any(|section| {
        SUMMARY_HEADINGS
            .iter()
            .any(|heading| section.section_type.eq_ignore_ascii_case(heading))
    })
}

/// Split off the specialty section of a parsed summary and resolve specialties.
fn build_outcome(
    raw_text: &str,
    mut parsed: Vec<SummarySection>,
    complaint: &str,
) -> AssessmentOutcome {
    if parsed.is_empty() {
        parsed.push(SummarySection::new(FALLBACK_SECTION, raw_text.trim()));
    }

    let (specialty_sections, sections): (Vec<SummarySection>, Vec<SummarySection>) =
        parsed.into_iter().partition(SummarySection::is_specialty);

    let specialty_text = specialty_sections
        .iter()
        .map(|s| s.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    AssessmentOutcome {
        sections,
        specialties: specialty::extract(&specialty_text, Some(complaint)),
        raw_text: raw_text.to_string(),
    }
}
