//! AI Handler abstraction
//!
//! Two handler variants answer chat messages: a stateless one backed by the
//! chat-completions API (context resent on every priming) and a stateful one
//! backed by the assistants API (remote assistant, vector store, and thread
//! persisted per conversation). The variant is chosen once, at session
//! start, and both expose the same `get_response` contract.

pub mod assistant;
pub mod completions;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;
use crate::openai::{OpenAiClient, OpenAiError};
use crate::session::SessionContext;

pub use assistant::AssistantHandler;
pub use completions::CompletionsHandler;

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("Backend error: {0}")]
    Backend(#[from] OpenAiError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HandlerError {
    /// Whether this error is a failed context upload, which is fatal for
    /// the session being started.
    pub fn is_upload_failure(&self) -> bool {
        matches!(self, HandlerError::Backend(OpenAiError::UploadFailed(_)))
    }
}

/// Which backend API a thread talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AiKind {
    #[default]
    Assistants,
    ChatCompletions,
}

impl AiKind {
    /// Parse the wire tag used by the session-start request.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "assistants" => Some(AiKind::Assistants),
            "chat_completions" => Some(AiKind::ChatCompletions),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AiKind::Assistants => "assistants",
            AiKind::ChatCompletions => "chat_completions",
        }
    }
}

impl fmt::Display for AiKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A handler bound to one thread
pub enum AiHandler {
    Completions(CompletionsHandler),
    Assistant(Box<AssistantHandler>),
}

impl AiHandler {
    /// Construct the handler for `kind`. The stateful variant performs its
    /// full remote setup (assistant, vector store, context upload, thread)
    /// before returning.
    pub async fn create(
        kind: AiKind,
        client: Arc<OpenAiClient>,
        config: &Config,
        session_id: Uuid,
        context: &SessionContext,
    ) -> Result<Self, HandlerError> {
        match kind {
            AiKind::ChatCompletions => {
                Ok(AiHandler::Completions(CompletionsHandler::new(client, config)))
            }
            AiKind::Assistants => Ok(AiHandler::Assistant(Box::new(
                AssistantHandler::setup(client, config, session_id, context).await?,
            ))),
        }
    }

    /// Answer a chat message. The stateless variant consumes the context
    /// summary when priming; the stateful variant ignores it and relies on
    /// its previously uploaded context file.
    pub async fn get_response(
        &self,
        context_summary: &str,
        message: &str,
        first_exchange: bool,
    ) -> Result<String, HandlerError> {
        match self {
            AiHandler::Completions(h) => {
                h.get_response(context_summary, message, first_exchange).await
            }
            AiHandler::Assistant(h) => h.get_response(message).await,
        }
    }

    pub fn kind(&self) -> AiKind {
        match self {
            AiHandler::Completions(_) => AiKind::ChatCompletions,
            AiHandler::Assistant(_) => AiKind::Assistants,
        }
    }
}
