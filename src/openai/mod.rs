//! OpenAI Backend Integration
//!
//! Resource-oriented client for the conversational AI backend: assistants,
//! vector stores, file upload, threads, messages, and runs.

pub mod client;

pub use client::{
    Assistant, ChatMessage, FileObject, ImageFileRef, ImageUrlRef, MessageContent, MessageText,
    OpenAiClient, OpenAiError, RemoteThread, Run, ThreadMessage, VectorStore,
};
