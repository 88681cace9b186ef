use std::collections::VecDeque;
use std::sync::Mutex;

use super::{CompletionClient, CompletionError};

/// Scripted completion client for tests and demos.
///
/// Replies are consumed in order. Once the script runs out, the
/// `then_repeat` reply (if any) is returned forever, otherwise an
/// `InvalidResponse` error. Every received prompt is recorded.
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<Result<String, CompletionError>>>,
    repeat: Option<Result<String, CompletionError>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedCompletion {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_results(replies.into_iter().map(|r| Ok(r.into())))
    }

    pub fn from_results<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = Result<String, CompletionError>>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            repeat: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Client that always fails with `error`.
    pub fn failing(error: CompletionError) -> Self {
        Self::from_results(std::iter::empty()).then_repeat(Err(error))
    }

    pub fn then_repeat(mut self, reply: Result<String, CompletionError>) -> Self {
        self.repeat = Some(reply);
        self
    }

    pub fn push(&self, reply: Result<String, CompletionError>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }
}

impl CompletionClient for ScriptedCompletion {
    fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        let next = self.replies.lock().ok().and_then(|mut r| r.pop_front());
        match next {
            Some(reply) => reply,
            None => self.repeat.clone().unwrap_or_else(|| {
                Err(CompletionError::InvalidResponse("script exhausted".into()))
            }),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replies_in_order_then_errors() {
        let client = ScriptedCompletion::new(["one", "two"]);
        assert_eq!(client.complete("a").unwrap(), "one");
        assert_eq!(client.complete("b").unwrap(), "two");
        assert!(matches!(
            client.complete("c"),
            Err(CompletionError::InvalidResponse(_))
        ));
        assert_eq!(client.prompts(), vec!["a", "b", "c"]);
    }

    #[test]
    fn repeat_reply_after_script() {
        let client = ScriptedCompletion::new(["first"]).then_repeat(Ok("again".into()));
        client.complete("x").unwrap();
        assert_eq!(client.complete("y").unwrap(), "again");
        assert_eq!(client.complete("z").unwrap(), "again");
        assert_eq!(client.call_count(), 3);
    }

    #[test]
    fn failing_client_always_errors() {
        let client = ScriptedCompletion::failing(CompletionError::RateLimited("quota".into()));
        assert!(client.complete("p").is_err());
        assert!(client.complete("p").is_err());
    }

    #[test]
    fn pushed_replies_are_appended() {
        let client = ScriptedCompletion::new(Vec::<String>::new());
        client.push(Ok("late".into()));
        assert_eq!(client.complete("p").unwrap(), "late");
    }
}
