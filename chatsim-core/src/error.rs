// Error type shared by every chatsim-core operation
// All variants are recoverable and meant to be shown to the user

use std::path::PathBuf;

/// Library-wide error. Every fallible function returns `Result<T, Error>`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Play or preview was requested with no authored steps
    #[error("Please add at least one step to the conversation")]
    EmptyConversation,

    /// The authored step list could not be parsed
    #[error("Invalid conversation steps: {0}")]
    InvalidSteps(String),

    /// Editor rejected an edit (bad index, button limit, ...)
    #[error("Edit rejected: {0}")]
    Edit(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    /// Import/export payload was rejected
    #[error("{0}")]
    Transfer(String),

    #[error("Saved conversation not found: {0}")]
    NotFound(String),

    /// Client conversation file missing or malformed
    #[error("Failed to load conversations for client {client_id} from {}: {reason}", path.display())]
    Catalog {
        client_id: String,
        path: PathBuf,
        reason: String,
    },

    /// The async player task is gone
    #[error("Player has shut down")]
    PlayerClosed,
}

pub type Result<T> = std::result::Result<T, Error>;
