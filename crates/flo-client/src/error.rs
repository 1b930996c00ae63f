//! Error types for the flo client

use thiserror::Error;

/// Errors that can occur while signing, resolving or invoking workflows
#[derive(Error, Debug)]
pub enum FloError {
    #[error("Missing credentials: both an access key and an access secret are required")]
    MissingCredentials,

    #[error("Configuration error: {0}")]
    ConfigParse(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("Invalid response body: {0}")]
    InvalidResponse(#[from] serde_json::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FloError {
    /// Maps a reqwest failure into a transport error, keeping the timeout/connect distinction visible
    pub fn from_http(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            FloError::Transport(format!("Request timeout: {}", error))
        } else if error.is_connect() {
            FloError::Transport(format!("Connection error: {}", error))
        } else {
            FloError::Transport(format!("HTTP error: {}", error))
        }
    }

    /// True for errors that come from configuration rather than the remote side
    pub fn is_configuration(&self) -> bool {
        matches!(self, FloError::MissingCredentials | FloError::ConfigParse(_))
    }
}

/// Result type for flo client operations
pub type FloResult<T> = Result<T, FloError>;
