use std::path::PathBuf;
use thiserror::Error;

use crate::action::MenuAction;
use crate::episode::EpisodeId;

#[derive(Debug, Error)]
pub enum CoreError {
    // Configuration errors
    #[error("Config file not found at {path}. A template has been created - please review it and restart.")]
    ConfigNotFound { path: PathBuf },

    #[error("Invalid config: {message}")]
    ConfigInvalid { message: String },

    #[error("Failed to parse config file: {0}")]
    ConfigParseError(#[from] toml::de::Error),

    // Dispatch errors
    #[error("Unknown menu action: {id}")]
    UnknownAction { id: String },

    #[error("Action {action} requires media, but episode {episode_id} has none")]
    MissingMedia {
        action: MenuAction,
        episode_id: EpisodeId,
    },

    #[error("Episode {episode_id} has no link to open")]
    MissingLink { episode_id: EpisodeId },

    // Store errors
    #[error("State store write failed: {reason}")]
    StoreWriteFailure { reason: String },

    #[error("Episode not found: {episode_id}")]
    EpisodeNotFound { episode_id: EpisodeId },

    #[error("Store database error: {0}")]
    DatabaseError(#[from] tokio_rusqlite::Error),

    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl CoreError {
    /// Wrap any displayable failure as a store write failure.
    #[must_use]
    pub fn store_write(reason: impl std::fmt::Display) -> Self {
        Self::StoreWriteFailure {
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
