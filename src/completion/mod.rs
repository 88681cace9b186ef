//! Text-completion collaborator.
//!
//! The assessment core only needs `complete(prompt) -> text`. Provider
//! choice and failover are decorators around that single capability.

pub mod fallback;
pub mod ollama;
pub mod scripted;

pub use fallback::*;
pub use ollama::*;
pub use scripted::*;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompletionError {
    #[error("Completion provider rate limited: {0}")]
    RateLimited(String),

    #[error("Completion provider rejected credentials: {0}")]
    AuthFailed(String),

    #[error("Completion provider unreachable: {0}")]
    NetworkError(String),

    #[error("Invalid completion response: {0}")]
    InvalidResponse(String),
}

impl CompletionError {
    /// Failures that may succeed if the same prompt is sent again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::NetworkError(_))
    }
}

/// Prompt in, free text out.
pub trait CompletionClient {
    fn complete(&self, prompt: &str) -> Result<String, CompletionError>;

    /// Provider name for logs.
    fn name(&self) -> &str {
        "completion"
    }
}

impl<C: CompletionClient + ?Sized> CompletionClient for &C {
    fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        (**self).complete(prompt)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<C: CompletionClient + ?Sized> CompletionClient for Box<C> {
    fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        (**self).complete(prompt)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
