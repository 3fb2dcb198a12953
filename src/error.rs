//! Error types for mail-digest.

/// Top-level error type for the digest run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Mailbox (IMAP) errors.
#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("Failed to connect to {host}:{port}: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("Login failed for {username}")]
    LoginFailed { username: String },

    #[error("IMAP command {command} failed: {reason}")]
    Command { command: String, reason: String },

    #[error("Failed to fetch message {id}: {reason}")]
    Fetch { id: String, reason: String },

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Inference collaborator errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Request to {endpoint} failed: {reason}")]
    RequestFailed { endpoint: String, reason: String },

    #[error("Invalid response from model {model}: {reason}")]
    InvalidResponse { model: String, reason: String },

    #[error("Model {model} returned an empty completion")]
    EmptyCompletion { model: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Checkpoint persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("Failed to read checkpoint at {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Failed to write checkpoint at {path}: {reason}")]
    Write { path: String, reason: String },

    #[error("Checkpoint at {path} is corrupt: {reason}")]
    Corrupt { path: String, reason: String },
}

/// Pipeline-stage errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Categorization failed: {0}")]
    Categorize(String),

    #[error("Summarization failed for batch {batch_key}: {reason}")]
    Summarize { batch_key: String, reason: String },

    #[error("No messages to report on")]
    EmptyMailbox,

    #[error("Run interrupted")]
    Interrupted,

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
}

/// Outbound-mail errors.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build outbound message: {0}")]
    Build(String),

    #[error("SMTP send failed: {0}")]
    Send(String),
}

/// Result type alias for the digest run.
pub type Result<T> = std::result::Result<T, Error>;
