//! In-memory collaborators that record what the coordinator asked of them.

use crate::collaborators::{
    FeedbackChannel, FeedbackMessage, LinkOpener, MediaFileStore, PlaybackControl,
    PlaybackSignal, PreferenceStore, StateStore, SyncQueue,
};
use crate::episode::{Episode, EpisodeId, MediaId, PlayState};
use crate::error::{CoreError, Result};
use crate::sync::SyncAction;
use crate::undo::UndoHandle;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreWrite {
    PlayState(EpisodeId, PlayState),
    Queued(EpisodeId, bool),
    Favorite(EpisodeId, bool),
    MediaPosition(EpisodeId, Duration),
}

#[derive(Default)]
pub struct RecordingStore {
    writes: Mutex<Vec<StoreWrite>>,
    fail: AtomicBool,
}

impl RecordingStore {
    pub fn writes(&self) -> Vec<StoreWrite> {
        self.writes.lock().unwrap().clone()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn record(&self, write: StoreWrite) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CoreError::store_write("disk full"));
        }
        self.writes.lock().unwrap().push(write);
        Ok(())
    }
}

#[async_trait]
impl StateStore for RecordingStore {
    async fn set_play_state(&self, episode_id: EpisodeId, state: PlayState) -> Result<()> {
        self.record(StoreWrite::PlayState(episode_id, state))
    }

    async fn set_queued(&self, episode_id: EpisodeId, queued: bool) -> Result<()> {
        self.record(StoreWrite::Queued(episode_id, queued))
    }

    async fn set_favorite(&self, episode_id: EpisodeId, favorite: bool) -> Result<()> {
        self.record(StoreWrite::Favorite(episode_id, favorite))
    }

    async fn set_media_position(&self, episode_id: EpisodeId, position: Duration) -> Result<()> {
        self.record(StoreWrite::MediaPosition(episode_id, position))
    }
}

#[derive(Default)]
pub struct RecordingMediaFiles {
    deleted: Mutex<Vec<EpisodeId>>,
}

impl RecordingMediaFiles {
    pub fn deleted(&self) -> Vec<EpisodeId> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn deletions(&self) -> usize {
        self.deleted.lock().unwrap().len()
    }
}

#[async_trait]
impl MediaFileStore for RecordingMediaFiles {
    async fn delete_media(&self, episode_id: EpisodeId) {
        self.deleted.lock().unwrap().push(episode_id);
    }
}

pub struct RecordingSyncQueue {
    active: bool,
    failing: bool,
    actions: Mutex<Vec<SyncAction>>,
}

impl RecordingSyncQueue {
    pub fn new(active: bool) -> Self {
        Self {
            active,
            failing: false,
            actions: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            active: true,
            failing: true,
            actions: Mutex::new(Vec::new()),
        }
    }

    pub fn actions(&self) -> Vec<SyncAction> {
        self.actions.lock().unwrap().clone()
    }
}

#[async_trait]
impl SyncQueue for RecordingSyncQueue {
    async fn is_active(&self) -> bool {
        self.active
    }

    async fn enqueue(&self, action: SyncAction) -> Result<()> {
        if self.failing {
            return Err(CoreError::store_write("queue unavailable"));
        }
        self.actions.lock().unwrap().push(action);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingPlayback {
    current: Mutex<Option<MediaId>>,
    signals: Mutex<Vec<PlaybackSignal>>,
}

impl RecordingPlayback {
    pub fn playing(media_id: MediaId) -> Self {
        Self {
            current: Mutex::new(Some(media_id)),
            signals: Mutex::new(Vec::new()),
        }
    }

    pub fn signals(&self) -> Vec<PlaybackSignal> {
        self.signals.lock().unwrap().clone()
    }

    pub fn current(&self) -> Option<MediaId> {
        *self.current.lock().unwrap()
    }
}

#[async_trait]
impl PlaybackControl for RecordingPlayback {
    async fn broadcast(&self, signal: PlaybackSignal) {
        self.signals.lock().unwrap().push(signal);
    }

    async fn currently_playing_media_id(&self) -> Option<MediaId> {
        self.current()
    }

    async fn clear_currently_playing(&self) {
        *self.current.lock().unwrap() = None;
    }
}

pub struct StaticPreferences {
    auto_delete: bool,
    smart_mark_as_played_secs: u64,
}

impl StaticPreferences {
    pub const fn new(auto_delete: bool, smart_mark_as_played_secs: u64) -> Self {
        Self {
            auto_delete,
            smart_mark_as_played_secs,
        }
    }
}

impl PreferenceStore for StaticPreferences {
    fn auto_delete_on_completion(&self) -> bool {
        self.auto_delete
    }

    fn smart_mark_as_played_secs(&self) -> u64 {
        self.smart_mark_as_played_secs
    }
}

#[derive(Default)]
pub struct RecordingFeedback {
    presented: Mutex<Vec<(FeedbackMessage, Duration, UndoHandle)>>,
}

impl RecordingFeedback {
    pub fn presented(&self) -> Vec<(FeedbackMessage, Duration, UndoHandle)> {
        self.presented.lock().unwrap().clone()
    }

    /// Press the undo affordance of the most recent message
    pub async fn activate_last(&self) -> bool {
        let handle = self.presented.lock().unwrap().last().map(|(_, _, h)| h.clone());
        match handle {
            Some(handle) => handle.undo().await.unwrap_or(false),
            None => false,
        }
    }
}

impl FeedbackChannel for RecordingFeedback {
    fn present(&self, message: FeedbackMessage, window: Duration, undo: UndoHandle) {
        self.presented.lock().unwrap().push((message, window, undo));
    }
}

#[derive(Default)]
pub struct RecordingLinks {
    opened: Mutex<Vec<String>>,
    shared: Mutex<Vec<EpisodeId>>,
}

impl RecordingLinks {
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    pub fn shared(&self) -> Vec<EpisodeId> {
        self.shared.lock().unwrap().clone()
    }
}

#[async_trait]
impl LinkOpener for RecordingLinks {
    async fn open_in_browser(&self, url: &url::Url) -> Result<()> {
        self.opened.lock().unwrap().push(url.to_string());
        Ok(())
    }

    async fn share(&self, episode: &Episode) {
        self.shared.lock().unwrap().push(episode.id);
    }
}
