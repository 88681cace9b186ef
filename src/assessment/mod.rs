pub mod question_bank;
pub mod similarity;
pub mod summary_parser;
pub mod specialty;
pub mod follow_up;
pub mod prompt;
pub mod state;
pub mod controller;

pub use controller::{
    AssessmentController, AssessmentEvent, CompletionKind, CompletionTicket, Step,
    TransitionReason,
};
pub use state::{ConversationState, RecordedAnswer};

use thiserror::Error;

use crate::models::Phase;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum AssessmentError {
    #[error("Completion service unavailable: {0}")]
    CompletionUnavailable(String),

    #[error("Invalid phase: expected {expected}, currently {actual}")]
    InvalidPhase { expected: Phase, actual: Phase },

    #[error("Invalid answer: {0}")]
    InvalidAnswer(String),

    #[error("No question is awaiting an answer")]
    NoPendingQuestion,

    #[error("Assessment already finished")]
    SessionFinished,

    #[error("A completion request is already in flight")]
    CompletionInFlight,

    #[error("Session log has no chief complaint")]
    MissingComplaint,

    #[error("Session store error: {0}")]
    Store(#[from] StoreError),
}

impl AssessmentError {
    /// Summary failures can be retried with the same answers.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::CompletionUnavailable(_) | Self::CompletionInFlight
        )
    }
}
