// DirChat Library
// Exports core modules for use by the server and CLI binaries

pub mod config;
pub mod handler;
pub mod openai;
pub mod scanner;
pub mod server;
pub mod session;
pub mod tokens;

// Re-export commonly used types
pub use config::{Config, ConfigError};
pub use handler::{AiHandler, AiKind, AssistantHandler, CompletionsHandler, HandlerError};
pub use openai::{OpenAiClient, OpenAiError};
pub use scanner::{read_ignore_rules, scan_directory, FileRecord, ScanError};
pub use server::{router, ApiError, AppState};
pub use session::{
    session_id_for_path, summarize_files, ChatEntry, HandlerRegistry, Session, SessionContext,
    SessionRegistry, Speaker, Thread, GREETING,
};
