use super::{CompletionClient, CompletionError};

/// Tries each provider in order and returns the first success.
///
/// When every provider fails, the last provider's error is returned.
pub struct FallbackCompletion {
    providers: Vec<Box<dyn CompletionClient + Send + Sync>>,
}

impl FallbackCompletion {
    pub fn new() -> Self {
        Self { providers: Vec::new() }
    }

    pub fn with(mut self, provider: impl CompletionClient + Send + Sync + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for FallbackCompletion {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionClient for FallbackCompletion {
    fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let mut last_error =
            CompletionError::NetworkError("no completion provider configured".into());

        for provider in &self.providers {
            match provider.complete(prompt) {
                Ok(text) => return Ok(text),
                Err(e) => {
                    tracing::warn!(provider = provider.name(), error = %e, "Completion provider failed, trying next");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    fn name(&self) -> &str {
        "fallback"
    }
}
