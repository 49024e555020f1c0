//! Stateless Chat-Completions Handler
//!
//! Holds no state between messages; every call is independent. The first
//! exchange primes the model with system instructions embedding the context
//! summary plus a few canned example exchanges. Later exchanges send only
//! the user's message.

use std::sync::Arc;
use tracing::warn;

use super::HandlerError;
use crate::config::Config;
use crate::openai::{ChatMessage, OpenAiClient};
use crate::tokens;

pub struct CompletionsHandler {
    client: Arc<OpenAiClient>,
    model: String,
    context_token_budget: u32,
}

impl CompletionsHandler {
    pub fn new(client: Arc<OpenAiClient>, config: &Config) -> Self {
        Self {
            client,
            model: config.model.clone(),
            context_token_budget: config.context_token_budget,
        }
    }

    pub async fn get_response(
        &self,
        context: &str,
        message: &str,
        first_exchange: bool,
    ) -> Result<String, HandlerError> {
        if first_exchange && tokens::exceeds_budget(context, self.context_token_budget) {
            warn!(
                budget = self.context_token_budget,
                "Priming context exceeds the configured token budget"
            );
        }

        let messages = build_messages(context, message, first_exchange);
        let response = self.client.chat_completion(&self.model, &messages).await?;
        Ok(response)
    }
}

/// Build the outgoing message sequence for one exchange.
pub fn build_messages(context: &str, message: &str, first_exchange: bool) -> Vec<ChatMessage> {
    if !first_exchange {
        return vec![ChatMessage::new("user", message)];
    }

    vec![
        ChatMessage::new(
            "system",
            format!(
                "You are DirChat, a filesystem assistant that knows everything about the \
                 specified directory. Using only the following context: {}, answer the \
                 resulting queries. Answer queries briefly, in a sentence or less.",
                context
            ),
        ),
        ChatMessage::new("user", "Who are you?"),
        ChatMessage::new("assistant", "I'm DirChat, your filesystem assistant bro!"),
        ChatMessage::named("system", "example_user", "What info do you have on my files?"),
        ChatMessage::named(
            "system",
            "example_assistant",
            "I can tell you the name, full path, and the last modified/updated time of \
             your files, based on the context you've given me.",
        ),
        ChatMessage::named("system", "example_user", "When was the last updated file?"),
        ChatMessage::named(
            "system",
            "example_assistant",
            "notes.md, which was updated on 6/1/2024 at 6:18 PM.",
        ),
        ChatMessage::named("system", "example_user", "What is the path to notes.md?"),
        ChatMessage::named(
            "system",
            "example_assistant",
            "/Users/example_user/docs/notes.md",
        ),
        ChatMessage::new("user", message),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subsequent_exchange_is_single_user_message() {
        let messages = build_messages("Files:\n", "what changed?", false);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[0].content, "what changed?");
    }

    #[test]
    fn test_first_exchange_primes_with_context() {
        let messages = build_messages("Files:\na.md (/p/a.md, 3 bytes)\n", "hello", true);

        assert!(messages.len() > 2);
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.contains("a.md (/p/a.md, 3 bytes)"));
        // user's message comes last
        let last = messages.last().unwrap();
        assert_eq!(last.role, "user");
        assert_eq!(last.content, "hello");
    }

    #[test]
    fn test_priming_examples_are_tagged() {
        let messages = build_messages("ctx", "q", true);
        let tagged = messages
            .iter()
            .filter(|m| m.name == Some("example_user") || m.name == Some("example_assistant"))
            .count();
        assert!(tagged >= 4);
    }
}
