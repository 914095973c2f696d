//! Interfaces to the systems the coordinator drives.
//!
//! The coordinator never owns storage, playback, sync transport or UI. It is
//! handed implementations of these traits and only decides what to ask of them.

use crate::episode::{Episode, EpisodeId, MediaId, PlayState};
use crate::error::Result;
use crate::sync::SyncAction;
use crate::undo::UndoHandle;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Durable episode state.
///
/// Every method is a single write that is durable once it returns `Ok`.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Persist a new play state.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StoreWriteFailure`](crate::CoreError::StoreWriteFailure)
    /// or a database error if the write fails.
    async fn set_play_state(&self, episode_id: EpisodeId, state: PlayState) -> Result<()>;

    /// Persist queue membership.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn set_queued(&self, episode_id: EpisodeId, queued: bool) -> Result<()>;

    /// Persist the favorite flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn set_favorite(&self, episode_id: EpisodeId, favorite: bool) -> Result<()>;

    /// Persist the playback position of the episode's media.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn set_media_position(&self, episode_id: EpisodeId, position: Duration) -> Result<()>;

    /// Rewind the media and mark the episode unplayed.
    ///
    /// Stores that can do both in one transaction should override this.
    ///
    /// # Errors
    ///
    /// Returns an error if either write fails.
    async fn reset_media(&self, episode_id: EpisodeId) -> Result<()> {
        self.set_media_position(episode_id, Duration::ZERO).await?;
        self.set_play_state(episode_id, PlayState::Unplayed).await
    }
}

/// Downloaded media files
#[async_trait]
pub trait MediaFileStore: Send + Sync {
    /// Delete the downloaded file of an episode.
    ///
    /// Best effort: implementations log their own failures.
    async fn delete_media(&self, episode_id: EpisodeId);
}

/// Outbound queue of episode actions for the remote sync service
#[async_trait]
pub trait SyncQueue: Send + Sync {
    /// Whether a sync service is currently connected
    async fn is_active(&self) -> bool;

    /// Persist an action for later transmission.
    ///
    /// # Errors
    ///
    /// Returns an error if the action could not be stored.
    async fn enqueue(&self, action: SyncAction) -> Result<()>;
}

/// Commands understood by the playback service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackSignal {
    /// Skip to the next queued episode
    SkipCurrent,
    /// Stop playback and tear the playback session down
    Shutdown,
}

/// The playback service
#[async_trait]
pub trait PlaybackControl: Send + Sync {
    async fn broadcast(&self, signal: PlaybackSignal);

    /// Media of the active playback session, if any
    async fn currently_playing_media_id(&self) -> Option<MediaId>;

    /// Forget the active playback session
    async fn clear_currently_playing(&self);
}

/// User preferences consulted by the coordinator
pub trait PreferenceStore: Send + Sync {
    /// Delete downloads once they have been played
    fn auto_delete_on_completion(&self) -> bool;

    /// How close to the end playback counts as finished
    fn smart_mark_as_played_secs(&self) -> u64;
}

/// Messages shown after a play state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackMessage {
    RemovedFromInbox,
    MarkedAsUnplayed,
    MarkedAsPlayed,
}

impl FeedbackMessage {
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Self::RemovedFromInbox => "removed_inbox_label",
            Self::MarkedAsUnplayed => "marked_as_unplayed_label",
            Self::MarkedAsPlayed => "marked_as_played_label",
        }
    }

    /// English fallback text for terminals
    #[must_use]
    pub const fn text(&self) -> &'static str {
        match self {
            Self::RemovedFromInbox => "Removed from inbox",
            Self::MarkedAsUnplayed => "Marked as unplayed",
            Self::MarkedAsPlayed => "Marked as played",
        }
    }
}

impl std::fmt::Display for FeedbackMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.text())
    }
}

/// Surface that shows a message with an undo affordance
pub trait FeedbackChannel: Send + Sync {
    /// Show `message` for `window`.
    ///
    /// Activating the affordance must call [`UndoHandle::undo`] on `undo`.
    fn present(&self, message: FeedbackMessage, window: Duration, undo: UndoHandle);
}

/// Outbound intents: browser and share sheet
#[async_trait]
pub trait LinkOpener: Send + Sync {
    /// Open `url` in the user's browser.
    ///
    /// # Errors
    ///
    /// Returns an error if no browser could be launched.
    async fn open_in_browser(&self, url: &url::Url) -> Result<()>;

    /// Show the share dialog for `episode`
    async fn share(&self, episode: &Episode);
}

/// Everything the dispatcher drives, bundled for construction
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn StateStore>,
    pub media_files: Arc<dyn MediaFileStore>,
    pub sync_queue: Arc<dyn SyncQueue>,
    pub playback: Arc<dyn PlaybackControl>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub feedback: Arc<dyn FeedbackChannel>,
    pub links: Arc<dyn LinkOpener>,
}
