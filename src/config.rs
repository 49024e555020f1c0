//! Server Configuration
//!
//! Environment-driven configuration for the server and CLI. Every knob has a
//! documented default; only the OpenAI API key is required.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default bind address for the HTTP front end
const DEFAULT_BIND: &str = "127.0.0.1:5000";
/// Default OpenAI API base URL
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
/// Default model for both handler variants
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
/// Default remote assistant name. The assistant is found-or-created by this
/// name, so two deployments sharing a backend account must configure
/// distinct names to keep their assistants separate.
const DEFAULT_ASSISTANT_NAME: &str = "DirChat Directory Assistant";
/// Default run-status poll interval in milliseconds
const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
/// Default maximum time to wait for a run to finish, in seconds
const DEFAULT_RUN_TIMEOUT_SECS: u64 = 120;
/// Default token budget for the priming context sent to the stateless handler
const DEFAULT_CONTEXT_TOKEN_BUDGET: u32 = 16_000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

/// Runtime configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub model: String,
    pub assistant_name: String,
    pub poll_interval: Duration,
    pub run_timeout: Duration,
    /// Scratch directory where context files are staged before upload
    pub scratch_dir: PathBuf,
    pub context_token_budget: u32,
}

impl Config {
    /// Resolve configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind = env_or("DIRCHAT_BIND", DEFAULT_BIND);
        let bind_addr: SocketAddr = bind
            .parse()
            .map_err(|_| ConfigError::InvalidValue("DIRCHAT_BIND", bind.clone()))?;

        let openai_api_key =
            std::env::var("OPENAI_API_KEY").map_err(|_| ConfigError::MissingApiKey)?;

        let poll_ms = parse_env("DIRCHAT_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?;
        let timeout_secs = parse_env("DIRCHAT_RUN_TIMEOUT_SECS", DEFAULT_RUN_TIMEOUT_SECS)?;
        let token_budget =
            parse_env("DIRCHAT_CONTEXT_TOKEN_BUDGET", DEFAULT_CONTEXT_TOKEN_BUDGET)?;

        Ok(Self {
            bind_addr,
            openai_api_key,
            openai_base_url: env_or("OPENAI_BASE_URL", DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            model: env_or("DIRCHAT_MODEL", DEFAULT_MODEL),
            assistant_name: env_or("DIRCHAT_ASSISTANT_NAME", DEFAULT_ASSISTANT_NAME),
            poll_interval: Duration::from_millis(poll_ms),
            run_timeout: Duration::from_secs(timeout_secs),
            scratch_dir: scratch_dir(),
            context_token_budget: token_budget,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key, raw)),
        Err(_) => Ok(default),
    }
}

/// Scratch directory for staged context files. `DIRCHAT_SCRATCH_DIR`
/// overrides; otherwise a `dirchat` subdirectory of the user cache dir,
/// falling back to the system temp dir.
fn scratch_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("DIRCHAT_SCRATCH_DIR") {
        return PathBuf::from(dir);
    }
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("dirchat")
}
