//! Menu actions that can be performed on an episode.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// An action offered in an episode's context menu.
///
/// The kebab-case identifier returned by [`MenuAction::as_str`] is what front
/// ends pass to [`ActionDispatcher::dispatch`](crate::ActionDispatcher::dispatch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MenuAction {
    /// Skip the episode that is currently playing
    Skip,
    /// Delete the downloaded media file
    RemoveFile,
    /// Drop the episode from the inbox without playing it
    RemoveFromInbox,
    MarkRead,
    MarkUnread,
    AddToQueue,
    RemoveFromQueue,
    AddToFavorites,
    RemoveFromFavorites,
    /// Rewind to the start and mark unplayed
    ResetPosition,
    VisitWebsite,
    Share,
}

impl MenuAction {
    /// Every action, in menu order
    pub const ALL: [Self; 12] = [
        Self::Skip,
        Self::RemoveFile,
        Self::RemoveFromInbox,
        Self::MarkRead,
        Self::MarkUnread,
        Self::AddToQueue,
        Self::RemoveFromQueue,
        Self::AddToFavorites,
        Self::RemoveFromFavorites,
        Self::ResetPosition,
        Self::VisitWebsite,
        Self::Share,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::RemoveFile => "remove-file",
            Self::RemoveFromInbox => "remove-from-inbox",
            Self::MarkRead => "mark-read",
            Self::MarkUnread => "mark-unread",
            Self::AddToQueue => "add-to-queue",
            Self::RemoveFromQueue => "remove-from-queue",
            Self::AddToFavorites => "add-to-favorites",
            Self::RemoveFromFavorites => "remove-from-favorites",
            Self::ResetPosition => "reset-position",
            Self::VisitWebsite => "visit-website",
            Self::Share => "share",
        }
    }

    /// Whether the action cannot run on an episode without media
    #[must_use]
    pub const fn requires_media(&self) -> bool {
        matches!(self, Self::RemoveFile | Self::ResetPosition)
    }

    /// Default label for the action
    #[must_use]
    pub const fn label(&self) -> MenuLabel {
        match self {
            Self::Skip => MenuLabel::SkipEpisode,
            Self::RemoveFile => MenuLabel::DeleteEpisode,
            Self::RemoveFromInbox => MenuLabel::RemoveFromInbox,
            Self::MarkRead => MenuLabel::MarkRead,
            Self::MarkUnread => MenuLabel::MarkUnread,
            Self::AddToQueue => MenuLabel::AddToQueue,
            Self::RemoveFromQueue => MenuLabel::RemoveFromQueue,
            Self::AddToFavorites => MenuLabel::AddToFavorites,
            Self::RemoveFromFavorites => MenuLabel::RemoveFromFavorites,
            Self::ResetPosition => MenuLabel::ResetPosition,
            Self::VisitWebsite => MenuLabel::VisitWebsite,
            Self::Share => MenuLabel::Share,
        }
    }
}

impl std::fmt::Display for MenuAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MenuAction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| CoreError::UnknownAction { id: s.to_string() })
    }
}

/// Label keys for menu entries.
///
/// Keys are resolved to text by the front end; mark read/unread use separate
/// wording when the episode has no media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuLabel {
    SkipEpisode,
    DeleteEpisode,
    RemoveFromInbox,
    MarkRead,
    MarkReadNoMedia,
    MarkUnread,
    MarkUnreadNoMedia,
    AddToQueue,
    RemoveFromQueue,
    AddToFavorites,
    RemoveFromFavorites,
    ResetPosition,
    VisitWebsite,
    Share,
}

impl MenuLabel {
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Self::SkipEpisode => "skip_episode_label",
            Self::DeleteEpisode => "delete_label",
            Self::RemoveFromInbox => "remove_inbox_label",
            Self::MarkRead => "mark_read_label",
            Self::MarkReadNoMedia => "mark_read_no_media_label",
            Self::MarkUnread => "mark_unread_label",
            Self::MarkUnreadNoMedia => "mark_unread_label_no_media",
            Self::AddToQueue => "add_to_queue_label",
            Self::RemoveFromQueue => "remove_from_queue_label",
            Self::AddToFavorites => "add_to_favorite_label",
            Self::RemoveFromFavorites => "remove_from_favorite_label",
            Self::ResetPosition => "reset_position",
            Self::VisitWebsite => "visit_website_label",
            Self::Share => "share_label",
        }
    }

    /// English fallback text for terminals
    #[must_use]
    pub const fn text(&self) -> &'static str {
        match self {
            Self::SkipEpisode => "Skip episode",
            Self::DeleteEpisode => "Delete",
            Self::RemoveFromInbox => "Remove from inbox",
            Self::MarkRead => "Mark as played",
            Self::MarkReadNoMedia => "Mark as read",
            Self::MarkUnread => "Mark as unplayed",
            Self::MarkUnreadNoMedia => "Mark as unread",
            Self::AddToQueue => "Add to queue",
            Self::RemoveFromQueue => "Remove from queue",
            Self::AddToFavorites => "Add to favorites",
            Self::RemoveFromFavorites => "Remove from favorites",
            Self::ResetPosition => "Reset playback position",
            Self::VisitWebsite => "Visit website",
            Self::Share => "Share",
        }
    }
}
