//! Undo windows for play state changes.
//!
//! A play state change is committed immediately. For a short window afterwards
//! the user may undo it, which commits the previous state again. When the
//! window closes unused, a cleanup check may delete the finished download.
//!
//! Each window is a small state machine:
//!
//! ```text
//! Active ──undo──▶ Cancelled
//!    └───deadline──▶ Fired
//! ```
//!
//! Both exits go through a single compare-and-set on the shared state, so
//! exactly one of the two bodies ever runs no matter how undo and the timer
//! interleave.

use crate::collaborators::{FeedbackChannel, FeedbackMessage, MediaFileStore, PreferenceStore, StateStore};
use crate::episode::{Episode, EpisodeId, PlayState};
use crate::error::Result;
use crate::events::ActionEvent;
use crate::time::DurationExt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const LOG_TARGET: &str = "castaway::undo";

const ACTIVE: u8 = 0;
const CANCELLED: u8 = 1;
const FIRED: u8 = 2;

/// State of an undo window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoState {
    /// Undo is still possible
    Active,
    /// Undo was activated; the cleanup will never run
    Cancelled,
    /// The window closed; undo is no longer possible
    Fired,
}

impl UndoState {
    const fn from_u8(value: u8) -> Self {
        match value {
            CANCELLED => Self::Cancelled,
            FIRED => Self::Fired,
            _ => Self::Active,
        }
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

/// How long undo stays available
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UndoTiming {
    /// How long the feedback message is shown
    pub feedback_window: Duration,
    /// Deadline length as a percentage of the feedback window
    pub safety_margin_percent: u32,
}

impl Default for UndoTiming {
    fn default() -> Self {
        Self {
            feedback_window: Duration::from_millis(2750),
            safety_margin_percent: 105,
        }
    }
}

impl UndoTiming {
    /// Delay before the cleanup runs, rounded up to the next millisecond.
    ///
    /// Always at least as long as the feedback window so the undo affordance
    /// has disappeared before the cleanup can run.
    #[must_use]
    pub fn deadline_delay(&self) -> Duration {
        let window_ms = self.feedback_window.as_millis_u64();
        let percent = u64::from(self.safety_margin_percent.max(100));
        let scaled = window_ms.saturating_mul(percent).div_ceil(100);
        Duration::from_millis(scaled)
    }
}

/// Message for a play state change, given the state it replaced
#[must_use]
pub const fn feedback_message(prior: PlayState, target: PlayState) -> FeedbackMessage {
    match (prior, target) {
        (_, PlayState::Played) => FeedbackMessage::MarkedAsPlayed,
        (PlayState::New, _) => FeedbackMessage::RemovedFromInbox,
        _ => FeedbackMessage::MarkedAsUnplayed,
    }
}

struct PendingUndo {
    episode_id: EpisodeId,
    prior: PlayState,
    target: PlayState,
    deadline: Instant,
    state: AtomicU8,
    /// Stops the timer task early once undo wins
    timer: CancellationToken,
    /// Cancelled once the winning exit has finished its work
    settled: CancellationToken,
    store: Arc<dyn StateStore>,
    events: broadcast::Sender<ActionEvent>,
}

impl PendingUndo {
    /// Leave `Active` for `to`. Only the first caller succeeds.
    fn exit(&self, to: u8) -> bool {
        self.state
            .compare_exchange(ACTIVE, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Handle to one undo window.
///
/// Clones refer to the same window.
#[derive(Clone)]
pub struct UndoHandle {
    inner: Arc<PendingUndo>,
}

impl std::fmt::Debug for UndoHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UndoHandle")
            .field("episode_id", &self.inner.episode_id)
            .field("prior", &self.inner.prior)
            .field("target", &self.inner.target)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl UndoHandle {
    #[must_use]
    pub fn episode_id(&self) -> EpisodeId {
        self.inner.episode_id
    }

    /// State the episode had before the change
    #[must_use]
    pub fn prior_play_state(&self) -> PlayState {
        self.inner.prior
    }

    /// State committed by the change
    #[must_use]
    pub fn target_play_state(&self) -> PlayState {
        self.inner.target
    }

    /// When the window closes
    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.inner.deadline
    }

    #[must_use]
    pub fn state(&self) -> UndoState {
        UndoState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// Undo the change.
    ///
    /// Returns `Ok(false)` without doing anything when the window is no longer
    /// active, so activating undo repeatedly is harmless.
    ///
    /// # Errors
    ///
    /// Returns an error if restoring the previous play state fails. The window
    /// is cancelled regardless; the cleanup will not run.
    pub async fn undo(&self) -> Result<bool> {
        let pending = &self.inner;
        if !pending.exit(CANCELLED) {
            debug!(
                target: LOG_TARGET,
                "Undo for episode {} ignored, window is {:?}",
                pending.episode_id,
                self.state()
            );
            return Ok(false);
        }

        let _settled = pending.settled.clone().drop_guard();
        pending.timer.cancel();

        pending
            .store
            .set_play_state(pending.episode_id, pending.prior)
            .await?;

        info!(
            target: LOG_TARGET,
            "Undo: episode {} restored to {}", pending.episode_id, pending.prior
        );
        let _ = pending.events.send(ActionEvent::UndoActivated {
            episode_id: pending.episode_id,
            restored: pending.prior,
        });
        Ok(true)
    }

    /// Wait until the window has closed either way and its work is done
    pub async fn settled(&self) -> UndoState {
        self.inner.settled.cancelled().await;
        self.state()
    }
}

/// Commits play state changes that can be undone for a short while
pub struct DeferredUndoScheduler {
    store: Arc<dyn StateStore>,
    media_files: Arc<dyn MediaFileStore>,
    preferences: Arc<dyn PreferenceStore>,
    feedback: Arc<dyn FeedbackChannel>,
    timing: UndoTiming,
    events: broadcast::Sender<ActionEvent>,
}

impl DeferredUndoScheduler {
    /// Create a scheduler.
    ///
    /// # Arguments
    /// * `store` - Where play state changes are committed
    /// * `media_files` - Used by the cleanup to delete finished downloads
    /// * `preferences` - Auto-delete and near-completion settings
    /// * `feedback` - Shows the message and undo affordance
    /// * `timing` - Length of the undo window
    /// * `events` - Channel that receives undo events
    pub fn new(
        store: Arc<dyn StateStore>,
        media_files: Arc<dyn MediaFileStore>,
        preferences: Arc<dyn PreferenceStore>,
        feedback: Arc<dyn FeedbackChannel>,
        timing: UndoTiming,
        events: broadcast::Sender<ActionEvent>,
    ) -> Self {
        Self {
            store,
            media_files,
            preferences,
            feedback,
            timing,
            events,
        }
    }

    #[must_use]
    pub const fn timing(&self) -> UndoTiming {
        self.timing
    }

    /// Commit `target` for `episode` and open an undo window.
    ///
    /// The write happens before this returns. Undo is a new write of the prior
    /// state, not a rollback. With `show_feedback` the message and undo
    /// affordance are handed to the feedback channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial write fails; no window is opened then.
    pub async fn schedule(
        &self,
        episode: &Episode,
        target: PlayState,
        show_feedback: bool,
    ) -> Result<UndoHandle> {
        let prior = episode.play_state;
        debug!(
            target: LOG_TARGET,
            "Marking episode {} {} -> {} with undo", episode.id, prior, target
        );

        self.store.set_play_state(episode.id, target).await?;

        let message = feedback_message(prior, target);
        let delay = self.timing.deadline_delay();
        let pending = Arc::new(PendingUndo {
            episode_id: episode.id,
            prior,
            target,
            deadline: Instant::now() + delay,
            state: AtomicU8::new(ACTIVE),
            timer: CancellationToken::new(),
            settled: CancellationToken::new(),
            store: Arc::clone(&self.store),
            events: self.events.clone(),
        });

        self.spawn_timer(Arc::clone(&pending), episode.clone());

        let _ = self.events.send(ActionEvent::UndoScheduled {
            episode_id: episode.id,
            message,
            target,
        });

        let handle = UndoHandle { inner: pending };
        if show_feedback {
            self.feedback
                .present(message, self.timing.feedback_window, handle.clone());
        }
        Ok(handle)
    }

    fn spawn_timer(&self, pending: Arc<PendingUndo>, episode: Episode) {
        let media_files = Arc::clone(&self.media_files);
        let preferences = Arc::clone(&self.preferences);

        tokio::spawn(async move {
            tokio::select! {
                () = pending.timer.cancelled() => {}
                () = tokio::time::sleep_until(pending.deadline) => {
                    if !pending.exit(FIRED) {
                        return;
                    }
                    let _settled = pending.settled.clone().drop_guard();
                    let media_deleted =
                        cleanup_finished_download(&episode, media_files.as_ref(), preferences.as_ref()).await;
                    let _ = pending.events.send(ActionEvent::UndoExpired {
                        episode_id: pending.episode_id,
                        media_deleted,
                    });
                }
            }
        });
    }
}

/// Delete the episode's download if it was played to the end and the user
/// wants finished downloads removed. Returns whether a deletion was requested.
async fn cleanup_finished_download(
    episode: &Episode,
    media_files: &dyn MediaFileStore,
    preferences: &dyn PreferenceStore,
) -> bool {
    let Some(media) = episode.media.as_ref() else {
        return false;
    };

    let threshold = Duration::from_secs(preferences.smart_mark_as_played_secs());
    if !(media.file_exists
        && media.has_almost_ended(threshold)
        && preferences.auto_delete_on_completion())
    {
        debug!(
            target: LOG_TARGET,
            "Undo window for episode {} closed, keeping download", episode.id
        );
        return false;
    }

    info!(
        target: LOG_TARGET,
        "Deleting finished download of episode {}", episode.id
    );
    media_files.delete_media(episode.id).await;
    true
}
