//! DirChat CLI
//!
//! Command-line interface for directory scans, token checks, and backend
//! maintenance. Every subcommand prints JSON; failures print an error
//! object and exit nonzero.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use uuid::Uuid;

use dirchat::config::Config;
use dirchat::handler::assistant;
use dirchat::openai::OpenAiClient;
use dirchat::scanner::{read_ignore_rules, scan_directory};
use dirchat::tokens;

#[derive(Parser)]
#[command(name = "dirchat")]
#[command(about = "DirChat CLI - directory scans and backend maintenance", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a directory and print its file records
    Scan {
        /// Directory to scan (defaults to the current directory)
        path: Option<PathBuf>,
        /// Where ignore files are read from (defaults to the current directory)
        #[arg(long)]
        ignore_location: Option<PathBuf>,
    },
    /// Token counting commands
    Tokens {
        #[command(subcommand)]
        action: TokensAction,
    },
    /// Backend maintenance commands
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum TokensAction {
    /// Count tokens in text
    Count {
        /// Text to count (or - to read from stdin)
        text: String,
    },
    /// Check text against a token budget; exits nonzero when over
    Validate {
        /// Maximum allowed tokens
        #[arg(short, long, default_value = "1000")]
        max_tokens: u32,
        /// Text to check (or - to read from stdin)
        text: String,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Delete every vector store in the backend account
    CleanupStores,
    /// Delete every uploaded assistants file
    CleanupFiles,
    /// Delete the uploaded files belonging to one session
    CleanupSession {
        /// Session ID whose files should be removed
        session_id: Uuid,
    },
    /// Print the message history of a remote thread
    ThreadHistory {
        /// Remote thread identifier
        thread_id: String,
    },
}

// ============ Output Types ============

#[derive(Serialize)]
struct TokenCountOutput {
    tokens: u32,
}

#[derive(Serialize)]
struct TokenValidateOutput {
    tokens: u32,
    max_tokens: u32,
    valid: bool,
}

#[derive(Serialize)]
struct CleanupOutput {
    deleted: usize,
}

#[derive(Serialize)]
struct ErrorOutput {
    error: String,
}

// ============ Main ============

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Scan {
            path,
            ignore_location,
        } => handle_scan(path, ignore_location),
        Commands::Tokens { action } => handle_tokens(action),
        Commands::Admin { action } => handle_admin(action).await,
    };

    match result {
        Ok(json) => println!("{}", json),
        Err(e) => {
            let error = ErrorOutput {
                error: e.to_string(),
            };
            println!("{}", serde_json::to_string(&error).unwrap());
            std::process::exit(1);
        }
    }
}

// ============ Handlers ============

fn handle_scan(
    path: Option<PathBuf>,
    ignore_location: Option<PathBuf>,
) -> Result<String, Box<dyn std::error::Error>> {
    let root = match path {
        Some(p) => p,
        None => std::env::current_dir()?,
    };
    let ignore_location = match ignore_location {
        Some(p) => p,
        None => std::env::current_dir()?,
    };

    let omit = read_ignore_rules(&ignore_location)?;
    let records = scan_directory(&root, &omit)?;

    Ok(serde_json::to_string_pretty(&records)?)
}

fn handle_tokens(action: TokensAction) -> Result<String, Box<dyn std::error::Error>> {
    match action {
        TokensAction::Count { text } => {
            let input = read_input(text)?;
            let output = TokenCountOutput {
                tokens: tokens::count_tokens(&input),
            };
            Ok(serde_json::to_string(&output)?)
        }

        TokensAction::Validate { max_tokens, text } => {
            let input = read_input(text)?;
            let counted = tokens::count_tokens(&input);
            if counted > max_tokens {
                return Err(format!(
                    "text exceeds the token budget: {} tokens counted, {} allowed",
                    counted, max_tokens
                )
                .into());
            }
            let output = TokenValidateOutput {
                tokens: counted,
                max_tokens,
                valid: true,
            };
            Ok(serde_json::to_string(&output)?)
        }
    }
}

async fn handle_admin(action: AdminAction) -> Result<String, Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    let client = OpenAiClient::new(&config.openai_base_url, &config.openai_api_key);

    match action {
        AdminAction::CleanupStores => {
            let deleted = assistant::delete_all_vector_stores(&client).await?;
            Ok(serde_json::to_string(&CleanupOutput { deleted })?)
        }

        AdminAction::CleanupFiles => {
            let deleted = assistant::delete_all_files(&client).await?;
            Ok(serde_json::to_string(&CleanupOutput { deleted })?)
        }

        AdminAction::CleanupSession { session_id } => {
            let deleted = assistant::delete_session_files(&client, session_id).await?;
            Ok(serde_json::to_string(&CleanupOutput { deleted })?)
        }

        AdminAction::ThreadHistory { thread_id } => {
            let lines = assistant::thread_history(&client, &thread_id).await?;
            Ok(serde_json::to_string_pretty(&lines)?)
        }
    }
}

/// Resolve a positional text argument, reading stdin when it is `-`.
fn read_input(text: String) -> Result<String, std::io::Error> {
    if text == "-" {
        use std::io::Read;
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(text)
    }
}
