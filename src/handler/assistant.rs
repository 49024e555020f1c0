//! Stateful Assistants Handler
//!
//! Persists conversation state in backend resources: a per-deployment
//! assistant (found-or-created by configured name), a per-session vector
//! store holding the uploaded context file, and a remote thread per local
//! conversation. Runs are polled to completion with a bounded wait.

use std::fs;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

use super::HandlerError;
use crate::config::Config;
use crate::openai::{MessageContent, OpenAiClient, OpenAiError, Run, ThreadMessage};
use crate::session::SessionContext;

/// Instructions the assistant is created with
const ASSISTANT_INSTRUCTIONS: &str = "You are DirChat, an expert filesystem detective. \
    Answer queries very accurately, according to the files uploaded in the vector stores. \
    To read the file contents, open the <id>_context.json file and load the entire file \
    content. <id> is the id at the end of the name of the vector store attached to the \
    current thread. All responses should be text. If not, send a url link to the asset \
    instead of the asset itself. When the user references 'this folder' or 'this project', \
    assume they are referring to the information about the uploaded directory captured in \
    the previously mentioned json file.";

/// Extra instructions attached to every run
const RUN_INSTRUCTIONS: &str = "Ignore any file beginning with a '.', or any file in a \
    folder starting with a '.', like .git or .ssh for example. When the user asks about \
    anything related to a file or folder's time, use the lastModified value of the \
    respective file or folder. Answer the query by looking at the uploaded file content.";

/// Returned when a run produces no usable content items
const FALLBACK_RESPONSE: &str = "Error occurred. Please repeat your message.";

/// Vector store names are this prefix plus the session id
const VECTOR_STORE_PREFIX: &str = "Directory Context Files ";
/// Vector stores expire this many days after last activity
const VECTOR_STORE_EXPIRY_DAYS: u32 = 2;

/// Staged context file name for a session. The session-id prefix is the
/// convention used to find and delete a session's stale uploads.
pub fn session_file_name(session_id: Uuid) -> String {
    format!("{}_context.json", session_id)
}

pub struct AssistantHandler {
    client: Arc<OpenAiClient>,
    session_id: Uuid,
    assistant_id: String,
    vector_store_id: String,
    thread_id: String,
    poll_interval: Duration,
    run_timeout: Duration,
}

impl AssistantHandler {
    /// Set up the full remote state for one conversation: find-or-create
    /// the assistant and the session's vector store, upload the context,
    /// and open a remote thread bound to the store.
    pub async fn setup(
        client: Arc<OpenAiClient>,
        config: &Config,
        session_id: Uuid,
        context: &SessionContext,
    ) -> Result<Self, HandlerError> {
        let assistant = match client.find_assistant(&config.assistant_name).await? {
            Some(assistant) => assistant,
            None => {
                client
                    .create_assistant(&config.assistant_name, ASSISTANT_INSTRUCTIONS, &config.model)
                    .await?
            }
        };

        let store_name = format!("{}{}", VECTOR_STORE_PREFIX, session_id);
        let existing = client
            .list_vector_stores()
            .await?
            .into_iter()
            .find(|s| {
                s.name.as_deref() == Some(store_name.as_str())
                    && s.status.as_deref() != Some("expired")
            });
        let store = match existing {
            Some(store) => store,
            None => {
                client
                    .create_vector_store(&store_name, VECTOR_STORE_EXPIRY_DAYS)
                    .await?
            }
        };

        let mut handler = Self {
            client,
            session_id,
            assistant_id: assistant.id,
            vector_store_id: store.id,
            thread_id: String::new(),
            poll_interval: config.poll_interval,
            run_timeout: config.run_timeout,
        };
        handler.upload_context(&config.scratch_dir, context).await?;

        let thread = handler.client.create_thread(&handler.vector_store_id).await?;
        handler.thread_id = thread.id;
        info!(
            session = %session_id,
            thread = %handler.thread_id,
            store = %handler.vector_store_id,
            "Assistant handler ready"
        );
        Ok(handler)
    }

    /// Stage the context to the scratch directory, replace any previously
    /// uploaded files for this session, and attach the fresh upload to the
    /// session's vector store.
    async fn upload_context(
        &self,
        scratch_dir: &std::path::Path,
        context: &SessionContext,
    ) -> Result<(), HandlerError> {
        let filename = session_file_name(self.session_id);
        let bytes = serde_json::to_vec(context)?;

        fs::create_dir_all(scratch_dir)?;
        let staged = scratch_dir.join(&filename);
        fs::write(&staged, &bytes)?;

        delete_session_files(&self.client, self.session_id).await?;

        let uploaded = self.client.upload_file(&filename, bytes).await?;
        self.client
            .wait_for_file_processing(&uploaded.id, self.poll_interval, self.run_timeout)
            .await?;
        self.client
            .attach_file_to_vector_store(&self.vector_store_id, &uploaded.id)
            .await?;
        self.client
            .wait_for_vector_store_file(
                &self.vector_store_id,
                &uploaded.id,
                self.poll_interval,
                self.run_timeout,
            )
            .await?;

        // staged copy is no longer needed once uploaded
        let _ = fs::remove_file(&staged);
        Ok(())
    }

    /// Append the message to the remote thread, run the assistant over it,
    /// and combine the reply messages into one response string.
    pub async fn get_response(&self, message: &str) -> Result<String, HandlerError> {
        let user_message = self
            .client
            .create_message(&self.thread_id, message.trim())
            .await?;

        let run = self
            .client
            .create_run(&self.thread_id, &self.assistant_id, RUN_INSTRUCTIONS)
            .await?;
        let run = self.wait_for_run(run).await?;
        debug!(run = %run.id, status = %run.status, "Run finished");

        let steps = self.client.list_run_steps(&self.thread_id, &run.id).await?;
        for step in &steps {
            debug!(step = %step.id, details = %step.step_details, "Run step");
        }

        let replies = self
            .client
            .list_messages(&self.thread_id, Some(&user_message.id))
            .await?;
        Ok(combine_message_content(&replies)
            .unwrap_or_else(|| FALLBACK_RESPONSE.to_string()))
    }

    /// Poll the run at the configured interval until it leaves the
    /// queued/in-progress states, or the configured timeout elapses.
    async fn wait_for_run(&self, mut run: Run) -> Result<Run, HandlerError> {
        let deadline = Instant::now() + self.run_timeout;
        while run.in_flight() {
            if Instant::now() >= deadline {
                return Err(OpenAiError::Timeout(format!("run {}", run.id)).into());
            }
            tokio::time::sleep(self.poll_interval).await;
            run = self.client.retrieve_run(&self.thread_id, &run.id).await?;
        }
        Ok(run)
    }

    /// Release this conversation's remote resources: the session's uploaded
    /// files and the remote thread. The vector store is left to expire on
    /// its own.
    pub async fn teardown(&self) -> Result<(), HandlerError> {
        delete_session_files(&self.client, self.session_id).await?;
        self.client.delete_thread(&self.thread_id).await?;
        Ok(())
    }
}

/// Concatenate the text and image-reference content of reply messages into
/// one response string, joined by single spaces. `None` when nothing usable
/// was found.
fn combine_message_content(messages: &[ThreadMessage]) -> Option<String> {
    let mut parts = Vec::new();
    for message in messages {
        for item in &message.content {
            match item {
                MessageContent::Text { text } => parts.push(text.value.clone()),
                MessageContent::ImageUrl { image_url } => parts.push(image_url.url.clone()),
                MessageContent::ImageFile { image_file } => {
                    parts.push(format!("File ID: {}", image_file.file_id))
                }
                MessageContent::Other(_) => {}
            }
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

// ---- administrative operations ----
//
// Bulk maintenance over the backend account, exposed through the CLI `admin`
// subcommands rather than the request lifecycle.

/// Delete every vector store in the account. Returns the number deleted.
pub async fn delete_all_vector_stores(client: &OpenAiClient) -> Result<usize, OpenAiError> {
    let stores = client.list_vector_stores().await?;
    let mut deleted = 0;
    for store in stores {
        client.delete_vector_store(&store.id).await?;
        deleted += 1;
    }
    info!(count = deleted, "Deleted vector stores");
    Ok(deleted)
}

/// Delete every uploaded assistants file. Returns the number deleted.
pub async fn delete_all_files(client: &OpenAiClient) -> Result<usize, OpenAiError> {
    let files = client.list_files().await?;
    let mut deleted = 0;
    for file in files {
        client.delete_file(&file.id).await?;
        deleted += 1;
    }
    info!(count = deleted, "Deleted files");
    Ok(deleted)
}

/// Delete the uploaded files belonging to one session, matched by the
/// session-id filename prefix. Returns the number deleted.
pub async fn delete_session_files(
    client: &OpenAiClient,
    session_id: Uuid,
) -> Result<usize, OpenAiError> {
    let prefix = format!("{}_", session_id);
    let files = client.list_files().await?;
    let mut deleted = 0;
    for file in files {
        if file.filename.starts_with(&prefix) {
            client.delete_file(&file.id).await?;
            deleted += 1;
        }
    }
    info!(session = %session_id, count = deleted, "Deleted session files");
    Ok(deleted)
}

/// Fetch the readable history of an arbitrary remote thread, one line per
/// content item with a speaker prefix.
pub async fn thread_history(
    client: &OpenAiClient,
    thread_id: &str,
) -> Result<Vec<String>, OpenAiError> {
    let messages = client.list_messages(thread_id, None).await?;
    let mut lines = Vec::new();
    for message in &messages {
        let speaker = if message.role == "assistant" {
            "DirChat:"
        } else {
            "Me:"
        };
        for item in &message.content {
            match item {
                MessageContent::Text { text } => lines.push(format!("{} {}", speaker, text.value)),
                MessageContent::ImageUrl { image_url } => {
                    lines.push(format!("{} {}", speaker, image_url.url))
                }
                MessageContent::ImageFile { image_file } => {
                    lines.push(format!("{} File ID: {}", speaker, image_file.file_id))
                }
                MessageContent::Other(_) => {}
            }
        }
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openai::{ImageFileRef, MessageText};

    fn text_message(id: &str, value: &str) -> ThreadMessage {
        ThreadMessage {
            id: id.to_string(),
            role: "assistant".to_string(),
            content: vec![MessageContent::Text {
                text: MessageText {
                    value: value.to_string(),
                },
            }],
        }
    }

    #[test]
    fn test_session_file_name_prefix() {
        let session_id = Uuid::new_v4();
        let name = session_file_name(session_id);
        assert!(name.starts_with(&format!("{}_", session_id)));
        assert!(name.ends_with(".json"));
    }

    #[test]
    fn test_combine_joins_with_spaces() {
        let messages = vec![text_message("m1", "part one"), text_message("m2", "part two")];
        assert_eq!(
            combine_message_content(&messages).as_deref(),
            Some("part one part two")
        );
    }

    #[test]
    fn test_combine_renders_image_file_placeholder() {
        let messages = vec![ThreadMessage {
            id: "m1".to_string(),
            role: "assistant".to_string(),
            content: vec![MessageContent::ImageFile {
                image_file: ImageFileRef {
                    file_id: "file-xyz".to_string(),
                },
            }],
        }];
        assert_eq!(
            combine_message_content(&messages).as_deref(),
            Some("File ID: file-xyz")
        );
    }

    #[test]
    fn test_combine_empty_yields_none() {
        assert!(combine_message_content(&[]).is_none());

        let unusable = vec![ThreadMessage {
            id: "m1".to_string(),
            role: "assistant".to_string(),
            content: vec![MessageContent::Other(serde_json::json!({"type": "refusal"}))],
        }];
        assert!(combine_message_content(&unusable).is_none());
    }
}
