pub mod assessment;
pub mod completion;
pub mod config;
pub mod models;
pub mod store;

pub use assessment::{
    AssessmentController, AssessmentError, AssessmentEvent, CompletionKind, CompletionTicket,
    Step, TransitionReason,
};
pub use completion::{CompletionClient, CompletionError};
pub use config::{AssessmentConfig, OllamaConfig};
pub use models::{Answer, AssessmentOutcome, Phase, PresentedQuestion, Specialty, SummarySection};
pub use store::{SessionStore, SessionWriter, StoreError};

use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins over the default filter. Safe to call more than once;
/// later calls (or an embedding app's own subscriber) are left alone.
pub fn init_tracing() {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("{} assessment core v{}", config::APP_NAME, config::APP_VERSION);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
    }
}
