//! Propagation of play state changes to the remote sync service.

use crate::collaborators::SyncQueue;
use crate::episode::{Episode, EpisodeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

const LOG_TARGET: &str = "castaway::sync";

/// Kind of episode action understood by the sync service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncActionKind {
    Play,
    New,
}

/// An episode action waiting to be sent to the sync service.
///
/// `started`, `position` and `total` are whole seconds and only set for
/// [`SyncActionKind::Play`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncAction {
    #[serde(rename = "action")]
    pub kind: SyncActionKind,
    pub episode_id: EpisodeId,
    /// Feed URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub podcast: Option<String>,
    /// Media URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u32>,
}

/// A play state change that may need to reach the sync service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Explicitly marked as played
    MarkedPlayed,
    /// Explicitly marked as unplayed
    MarkedUnplayed,
}

/// Decides what, if anything, to enqueue for a play state change
pub struct SyncPropagator {
    queue: Arc<dyn SyncQueue>,
    tasks: TaskTracker,
}

impl SyncPropagator {
    #[must_use]
    pub fn new(queue: Arc<dyn SyncQueue>) -> Self {
        Self {
            queue,
            tasks: TaskTracker::new(),
        }
    }

    /// Build the action describing `transition`.
    ///
    /// Returns `None` for episodes without media; the sync service only tracks
    /// downloadable episodes. Marking as played always reports the whole
    /// episode as consumed, not the current playback position.
    #[must_use]
    pub fn build_action(
        episode: &Episode,
        transition: Transition,
        timestamp: DateTime<Utc>,
    ) -> Option<SyncAction> {
        let media = episode.media.as_ref()?;

        let mut action = SyncAction {
            kind: SyncActionKind::New,
            episode_id: episode.id,
            podcast: episode.feed.download_url.clone(),
            episode: media.download_url.clone(),
            guid: episode.guid.clone(),
            timestamp,
            started: None,
            position: None,
            total: None,
        };

        if transition == Transition::MarkedPlayed {
            let total = media.duration_secs();
            action.kind = SyncActionKind::Play;
            action.started = Some(total);
            action.position = Some(total);
            action.total = Some(total);
        }

        Some(action)
    }

    /// Enqueue the action for `transition` in the background.
    ///
    /// Returns immediately. Nothing is sent when the episode has no media or
    /// no sync service is connected; enqueue failures are logged and dropped.
    /// The returned handle only exists for callers that want to wait.
    pub fn propagate(&self, episode: &Episode, transition: Transition) -> Option<JoinHandle<()>> {
        let Some(action) = Self::build_action(episode, transition, Utc::now()) else {
            debug!(
                target: LOG_TARGET,
                "Episode {} has no media, nothing to sync", episode.id
            );
            return None;
        };

        let queue = Arc::clone(&self.queue);
        Some(self.tasks.spawn(async move {
            if !queue.is_active().await {
                debug!(
                    target: LOG_TARGET,
                    "Sync inactive, dropping {:?} for episode {}", action.kind, action.episode_id
                );
                return;
            }

            let episode_id = action.episode_id;
            let kind = action.kind;
            match queue.enqueue(action).await {
                Ok(()) => debug!(target: LOG_TARGET, "Queued {:?} for episode {}", kind, episode_id),
                Err(e) => warn!(
                    target: LOG_TARGET,
                    "Failed to queue {:?} for episode {}: {}", kind, episode_id, e
                ),
            }
        }))
    }

    /// Wait for every action handed to [`propagate`](Self::propagate) so far
    pub async fn flush(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }
}
