pub mod action;
pub mod collaborators;
pub mod config;
pub mod dispatcher;
pub mod episode;
pub mod error;
pub mod events;
pub mod paths;
pub mod store;
pub mod sync;
pub mod time;
pub mod undo;
pub mod visibility;

#[cfg(test)]
mod testing;

pub use action::{MenuAction, MenuLabel};
pub use collaborators::{
    Collaborators, FeedbackChannel, FeedbackMessage, LinkOpener, MediaFileStore, PlaybackControl,
    PlaybackSignal, PreferenceStore, StateStore, SyncQueue,
};
pub use config::{CastawayConfig, LoggingConfig, PlaybackConfig, SyncConfig, UndoConfig};
pub use dispatcher::{ActionDispatcher, Command, Mutation, SideEffect};
pub use episode::{Episode, EpisodeId, FeedInfo, Media, MediaId, PlayState};
pub use error::{CoreError, Result};
pub use events::ActionEvent;
pub use paths::{
    config_dir, database_path, log_file_path, CONFIG_DIR_NAME, CONFIG_FILE_NAME,
    DATABASE_FILE_NAME, LOG_FILE_NAME,
};
pub use store::EpisodeStore;
pub use sync::{SyncAction, SyncActionKind, SyncPropagator, Transition};
pub use time::DurationExt;
pub use undo::{DeferredUndoScheduler, UndoHandle, UndoState, UndoTiming};
pub use visibility::{MenuItem, VisibilityPolicy, VisibilitySet};

/// Re-export toml error type for config parsing error handling
pub use toml::de::Error as TomlParseError;
