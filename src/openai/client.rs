//! OpenAI HTTP Client
//!
//! Direct HTTP client for the OpenAI REST API. Uses reqwest instead of
//! third-party wrapper crates for stability and full API control. The
//! assistants surface (assistants, vector stores, threads, messages, runs)
//! requires the v2 beta header; plain file and chat-completion calls do not.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info};

/// Header opting in to the assistants v2 API surface
const BETA_HEADER: (&str, &str) = ("OpenAI-Beta", "assistants=v2");

/// Chunking policy applied when attaching a context file to a vector store
const MAX_CHUNK_SIZE_TOKENS: u32 = 4096;
const CHUNK_OVERLAP_TOKENS: u32 = MAX_CHUNK_SIZE_TOKENS / 2;

#[derive(Error, Debug)]
pub enum OpenAiError {
    #[error("OpenAI HTTP error: {0}")]
    Http(String),
    #[error("Deserialization error: {0}")]
    Deserialize(String),
    #[error("File upload failed: {0}")]
    UploadFailed(String),
    #[error("Timed out waiting for {0}")]
    Timeout(String),
}

impl From<reqwest::Error> for OpenAiError {
    fn from(e: reqwest::Error) -> Self {
        OpenAiError::Http(e.to_string())
    }
}

/// Remote assistant resource
#[derive(Debug, Clone, Deserialize)]
pub struct Assistant {
    pub id: String,
    pub name: Option<String>,
}

/// Remote vector store resource
#[derive(Debug, Clone, Deserialize)]
pub struct VectorStore {
    pub id: String,
    pub name: Option<String>,
    pub status: Option<String>,
}

/// Uploaded file resource
#[derive(Debug, Clone, Deserialize)]
pub struct FileObject {
    pub id: String,
    pub filename: String,
    pub status: Option<String>,
}

/// Remote conversation thread
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteThread {
    pub id: String,
}

/// One execution of the assistant over a thread
#[derive(Debug, Clone, Deserialize)]
pub struct Run {
    pub id: String,
    pub status: String,
}

impl Run {
    /// Whether the backend is still working on this run
    pub fn in_flight(&self) -> bool {
        self.status == "queued" || self.status == "in_progress"
    }
}

/// Diagnostic detail of a run step
#[derive(Debug, Clone, Deserialize)]
pub struct RunStep {
    pub id: String,
    pub step_details: Value,
}

/// A message stored on a remote thread
#[derive(Debug, Clone, Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    pub role: String,
    pub content: Vec<MessageContent>,
}

/// One content item of a thread message. Unknown item types deserialize to
/// `Other` and are skipped by callers.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: MessageText },
    ImageUrl { image_url: ImageUrlRef },
    ImageFile { image_file: ImageFileRef },
    #[serde(untagged)]
    Other(Value),
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageText {
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageUrlRef {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageFileRef {
    pub file_id: String,
}

/// Outgoing chat-completion message. `name` carries the example-speaker tag
/// used in the priming sequence.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'static str>,
}

impl ChatMessage {
    pub fn new(role: &'static str, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
        }
    }

    pub fn named(role: &'static str, name: &'static str, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            name: Some(name),
        }
    }
}

#[derive(Deserialize)]
struct ListResponse<T> {
    data: Vec<T>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// OpenAI HTTP client
#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
    }

    fn delete(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .delete(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
    }

    /// Parse a response, surfacing non-success statuses as HTTP errors with
    /// the response body attached.
    async fn parse<T: serde::de::DeserializeOwned>(
        resp: reqwest::Response,
        what: &str,
    ) -> Result<T, OpenAiError> {
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            error!(status = %status, body = %text, "OpenAI HTTP error");
            return Err(OpenAiError::Http(format!(
                "{} failed ({}): {}",
                what, status, text
            )));
        }

        serde_json::from_str(&text).map_err(|e| OpenAiError::Deserialize(format!("{}: {}", e, text)))
    }

    // ---- assistants ----

    pub async fn list_assistants(&self) -> Result<Vec<Assistant>, OpenAiError> {
        let resp = self
            .get("/assistants?order=desc&limit=100")
            .header(BETA_HEADER.0, BETA_HEADER.1)
            .send()
            .await?;
        let list: ListResponse<Assistant> = Self::parse(resp, "List assistants").await?;
        Ok(list.data)
    }

    /// Find an assistant by name, if one exists
    pub async fn find_assistant(&self, name: &str) -> Result<Option<Assistant>, OpenAiError> {
        let assistants = self.list_assistants().await?;
        Ok(assistants
            .into_iter()
            .find(|a| a.name.as_deref() == Some(name)))
    }

    pub async fn create_assistant(
        &self,
        name: &str,
        instructions: &str,
        model: &str,
    ) -> Result<Assistant, OpenAiError> {
        let body = json!({
            "name": name,
            "instructions": instructions,
            "tools": [{"type": "file_search"}, {"type": "code_interpreter"}],
            "model": model,
            "temperature": 0.0,
        });

        let resp = self
            .post("/assistants")
            .header(BETA_HEADER.0, BETA_HEADER.1)
            .json(&body)
            .send()
            .await?;

        let assistant: Assistant = Self::parse(resp, "Create assistant").await?;
        info!(name = %name, id = %assistant.id, "Created assistant");
        Ok(assistant)
    }

    // ---- vector stores ----

    pub async fn list_vector_stores(&self) -> Result<Vec<VectorStore>, OpenAiError> {
        let resp = self
            .get("/vector_stores?order=desc&limit=100")
            .header(BETA_HEADER.0, BETA_HEADER.1)
            .send()
            .await?;
        let list: ListResponse<VectorStore> = Self::parse(resp, "List vector stores").await?;
        Ok(list.data)
    }

    pub async fn create_vector_store(
        &self,
        name: &str,
        expires_days: u32,
    ) -> Result<VectorStore, OpenAiError> {
        let body = json!({
            "name": name,
            "expires_after": {"anchor": "last_active_at", "days": expires_days},
        });

        let resp = self
            .post("/vector_stores")
            .header(BETA_HEADER.0, BETA_HEADER.1)
            .json(&body)
            .send()
            .await?;

        let store: VectorStore = Self::parse(resp, "Create vector store").await?;
        info!(name = %name, id = %store.id, "Created vector store");
        Ok(store)
    }

    pub async fn delete_vector_store(&self, store_id: &str) -> Result<(), OpenAiError> {
        let resp = self
            .delete(&format!("/vector_stores/{}", store_id))
            .header(BETA_HEADER.0, BETA_HEADER.1)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(OpenAiError::Http(format!(
                "Delete vector store failed: {}",
                resp.status()
            )));
        }
        info!(id = %store_id, "Deleted vector store");
        Ok(())
    }

    /// Attach an uploaded file to a vector store with a static chunking
    /// policy (max chunk size with maximum overlap).
    pub async fn attach_file_to_vector_store(
        &self,
        store_id: &str,
        file_id: &str,
    ) -> Result<(), OpenAiError> {
        let body = json!({
            "file_id": file_id,
            "chunking_strategy": {
                "type": "static",
                "static": {
                    "max_chunk_size_tokens": MAX_CHUNK_SIZE_TOKENS,
                    "chunk_overlap_tokens": CHUNK_OVERLAP_TOKENS,
                }
            }
        });

        let resp = self
            .post(&format!("/vector_stores/{}/files", store_id))
            .header(BETA_HEADER.0, BETA_HEADER.1)
            .json(&body)
            .send()
            .await?;

        let _: Value = Self::parse(resp, "Attach file to vector store").await?;
        Ok(())
    }

    /// Poll until the vector store has finished indexing the file.
    pub async fn wait_for_vector_store_file(
        &self,
        store_id: &str,
        file_id: &str,
        interval: Duration,
        timeout: Duration,
    ) -> Result<(), OpenAiError> {
        let started = Instant::now();
        loop {
            let resp = self
                .get(&format!("/vector_stores/{}/files/{}", store_id, file_id))
                .header(BETA_HEADER.0, BETA_HEADER.1)
                .send()
                .await?;
            let status: Value = Self::parse(resp, "Retrieve vector store file").await?;

            match status["status"].as_str() {
                Some("completed") => return Ok(()),
                Some("failed") | Some("cancelled") => {
                    return Err(OpenAiError::UploadFailed(format!(
                        "vector store indexing ended with status {}",
                        status["status"]
                    )));
                }
                _ => {}
            }

            if started.elapsed() >= timeout {
                return Err(OpenAiError::Timeout("vector store file indexing".to_string()));
            }
            tokio::time::sleep(interval).await;
        }
    }

    // ---- files ----

    /// Upload file contents for assistants use.
    pub async fn upload_file(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<FileObject, OpenAiError> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new()
            .text("purpose", "assistants")
            .part("file", part);

        let resp = self.post("/files").multipart(form).send().await?;
        let file: FileObject = Self::parse(resp, "Upload file").await?;
        info!(filename = %filename, id = %file.id, "Uploaded file");
        Ok(file)
    }

    pub async fn retrieve_file(&self, file_id: &str) -> Result<FileObject, OpenAiError> {
        let resp = self.get(&format!("/files/{}", file_id)).send().await?;
        Self::parse(resp, "Retrieve file").await
    }

    /// Poll until the backend has processed the uploaded file. A terminal
    /// `error` status is surfaced as [`OpenAiError::UploadFailed`].
    pub async fn wait_for_file_processing(
        &self,
        file_id: &str,
        interval: Duration,
        timeout: Duration,
    ) -> Result<FileObject, OpenAiError> {
        let started = Instant::now();
        loop {
            let file = self.retrieve_file(file_id).await?;
            match file.status.as_deref() {
                Some("processed") | None => return Ok(file),
                Some("error") => {
                    return Err(OpenAiError::UploadFailed(format!(
                        "file {} failed processing",
                        file_id
                    )));
                }
                _ => {}
            }

            if started.elapsed() >= timeout {
                return Err(OpenAiError::Timeout("file processing".to_string()));
            }
            tokio::time::sleep(interval).await;
        }
    }

    pub async fn list_files(&self) -> Result<Vec<FileObject>, OpenAiError> {
        let resp = self.get("/files?purpose=assistants").send().await?;
        let list: ListResponse<FileObject> = Self::parse(resp, "List files").await?;
        Ok(list.data)
    }

    pub async fn delete_file(&self, file_id: &str) -> Result<(), OpenAiError> {
        let resp = self.delete(&format!("/files/{}", file_id)).send().await?;

        if !resp.status().is_success() {
            return Err(OpenAiError::Http(format!(
                "Delete file failed: {}",
                resp.status()
            )));
        }
        debug!(id = %file_id, "Deleted file");
        Ok(())
    }

    // ---- threads, messages, runs ----

    /// Create a remote thread bound to a vector store for file search.
    pub async fn create_thread(&self, vector_store_id: &str) -> Result<RemoteThread, OpenAiError> {
        let body = json!({
            "tool_resources": {
                "file_search": {"vector_store_ids": [vector_store_id]}
            }
        });

        let resp = self
            .post("/threads")
            .header(BETA_HEADER.0, BETA_HEADER.1)
            .json(&body)
            .send()
            .await?;

        let thread: RemoteThread = Self::parse(resp, "Create thread").await?;
        info!(id = %thread.id, "Created remote thread");
        Ok(thread)
    }

    pub async fn delete_thread(&self, thread_id: &str) -> Result<(), OpenAiError> {
        let resp = self
            .delete(&format!("/threads/{}", thread_id))
            .header(BETA_HEADER.0, BETA_HEADER.1)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(OpenAiError::Http(format!(
                "Delete thread failed: {}",
                resp.status()
            )));
        }
        info!(id = %thread_id, "Deleted remote thread");
        Ok(())
    }

    pub async fn create_message(
        &self,
        thread_id: &str,
        text: &str,
    ) -> Result<ThreadMessage, OpenAiError> {
        let body = json!({"role": "user", "content": text});

        let resp = self
            .post(&format!("/threads/{}/messages", thread_id))
            .header(BETA_HEADER.0, BETA_HEADER.1)
            .json(&body)
            .send()
            .await?;

        Self::parse(resp, "Create message").await
    }

    /// List messages oldest-first, optionally only those after a message id.
    pub async fn list_messages(
        &self,
        thread_id: &str,
        after: Option<&str>,
    ) -> Result<Vec<ThreadMessage>, OpenAiError> {
        let mut path = format!("/threads/{}/messages?order=asc&limit=100", thread_id);
        if let Some(after) = after {
            path.push_str(&format!("&after={}", after));
        }

        let resp = self
            .get(&path)
            .header(BETA_HEADER.0, BETA_HEADER.1)
            .send()
            .await?;
        let list: ListResponse<ThreadMessage> = Self::parse(resp, "List messages").await?;
        Ok(list.data)
    }

    pub async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
        additional_instructions: &str,
    ) -> Result<Run, OpenAiError> {
        let body = json!({
            "assistant_id": assistant_id,
            "additional_instructions": additional_instructions,
        });

        let resp = self
            .post(&format!("/threads/{}/runs", thread_id))
            .header(BETA_HEADER.0, BETA_HEADER.1)
            .json(&body)
            .send()
            .await?;

        Self::parse(resp, "Create run").await
    }

    pub async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, OpenAiError> {
        let resp = self
            .get(&format!("/threads/{}/runs/{}", thread_id, run_id))
            .header(BETA_HEADER.0, BETA_HEADER.1)
            .send()
            .await?;
        Self::parse(resp, "Retrieve run").await
    }

    pub async fn list_run_steps(
        &self,
        thread_id: &str,
        run_id: &str,
    ) -> Result<Vec<RunStep>, OpenAiError> {
        let resp = self
            .get(&format!("/threads/{}/runs/{}/steps", thread_id, run_id))
            .header(BETA_HEADER.0, BETA_HEADER.1)
            .send()
            .await?;
        let list: ListResponse<RunStep> = Self::parse(resp, "List run steps").await?;
        Ok(list.data)
    }

    // ---- chat completions ----

    /// One-shot chat completion with deterministic sampling.
    pub async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<String, OpenAiError> {
        let body = json!({
            "model": model,
            "messages": messages,
            "temperature": 0,
        });

        let resp = self.post("/chat/completions").json(&body).send().await?;
        let completion: ChatCompletionResponse = Self::parse(resp, "Chat completion").await?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| OpenAiError::Http("Chat completion returned no content".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_content_variants_deserialize() {
        let raw = r#"[
            {"type": "text", "text": {"value": "hello", "annotations": []}},
            {"type": "image_url", "image_url": {"url": "https://example.com/x.png"}},
            {"type": "image_file", "image_file": {"file_id": "file-abc"}},
            {"type": "refusal", "refusal": "no"}
        ]"#;

        let content: Vec<MessageContent> = serde_json::from_str(raw).unwrap();
        assert!(matches!(&content[0], MessageContent::Text { text } if text.value == "hello"));
        assert!(matches!(&content[1], MessageContent::ImageUrl { .. }));
        assert!(matches!(&content[2], MessageContent::ImageFile { .. }));
        assert!(matches!(&content[3], MessageContent::Other(_)));
    }

    #[test]
    fn test_run_in_flight() {
        let run = Run {
            id: "run_1".to_string(),
            status: "queued".to_string(),
        };
        assert!(run.in_flight());

        let done = Run {
            id: "run_1".to_string(),
            status: "completed".to_string(),
        };
        assert!(!done.in_flight());
    }

    #[test]
    fn test_chat_message_name_serialization() {
        let plain = ChatMessage::new("user", "hi");
        let tagged = ChatMessage::named("system", "example_user", "hi");

        let plain_json = serde_json::to_value(&plain).unwrap();
        let tagged_json = serde_json::to_value(&tagged).unwrap();

        assert!(plain_json.get("name").is_none());
        assert_eq!(tagged_json["name"], "example_user");
    }
}
