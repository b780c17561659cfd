use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FgError {
    // Stage I/O errors
    #[error("Failed to read input document {}: {source}", path.display())]
    InputRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Filesystem error at {}: {message}", path.display())]
    Filesystem { path: PathBuf, message: String },

    // Oracle errors
    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    #[error("LLM streaming error: {0}")]
    LlmStream(String),

    #[error("LLM provider not supported: {0}")]
    UnsupportedProvider(String),

    // Capability errors (reported back to the oracle)
    #[error("Operation not found: {0}")]
    UnknownOperation(String),

    #[error("Operation {op} is not permitted for agent {agent}")]
    OperationNotPermitted { agent: String, op: String },

    #[error("Invalid arguments for {op}: {message}")]
    InvalidArguments { op: String, message: String },

    // Driver errors
    #[error("Agent {agent} exceeded max turns ({max_turns})")]
    MaxTurnsExceeded { agent: String, max_turns: usize },

    #[error("Run exceeded total turn budget ({0})")]
    RunTurnBudgetExceeded(usize),

    #[error("Timed out after {secs}s: {scope}")]
    Timeout { scope: String, secs: u64 },

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Run cancelled")]
    Cancelled,

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FgError {
    /// Whether this error aborts the run instead of being handed back to the
    /// oracle as a failed operation result.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            FgError::UnknownOperation(_)
                | FgError::OperationNotPermitted { .. }
                | FgError::InvalidArguments { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FgError>;
