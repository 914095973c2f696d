//! Terminal implementations of the user-facing collaborators.

use async_trait::async_trait;
use castaway_core::{Episode, FeedbackChannel, FeedbackMessage, LinkOpener, UndoHandle};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

/// An undo offer that was shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentedUndo {
    pub message: FeedbackMessage,
    pub window: Duration,
}

/// Prints feedback messages and remembers the latest undo offer.
///
/// Ctrl+C is the affordance; the caller owns the handle returned by the
/// dispatcher and undoes through it.
#[derive(Debug, Default)]
pub struct TerminalFeedback {
    pending: Mutex<Option<PresentedUndo>>,
}

impl TerminalFeedback {
    /// Take the most recent undo offer, if any
    pub fn take(&self) -> Option<PresentedUndo> {
        self.pending.lock().ok().and_then(|mut slot| slot.take())
    }
}

impl FeedbackChannel for TerminalFeedback {
    fn present(&self, message: FeedbackMessage, window: Duration, undo: UndoHandle) {
        debug!("Undo offered for episode {}", undo.episode_id());
        println!(
            "{message}. Press Ctrl+C within {:.1}s to undo.",
            window.as_secs_f64()
        );

        if let Ok(mut slot) = self.pending.lock() {
            *slot = Some(PresentedUndo { message, window });
        }
    }
}

/// Opens links with the desktop's default browser
#[derive(Debug, Default)]
pub struct BrowserLinks;

#[async_trait]
impl LinkOpener for BrowserLinks {
    async fn open_in_browser(&self, url: &url::Url) -> castaway_core::Result<()> {
        info!("Opening {}", url);
        open::that_detached(url.as_str())?;
        Ok(())
    }

    async fn share(&self, episode: &Episode) {
        debug!("Sharing episode {}", episode.id);
        match episode.link_with_fallback() {
            Some(link) => println!("{}\n{link}", episode.title),
            None => println!("{}", episode.title),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use castaway_core::{
        ActionDispatcher, Collaborators, EpisodeId, EpisodeStore, Media, MediaId, PlaybackConfig,
        PlayState, SyncConfig, UndoTiming,
    };
    use std::sync::Arc;

    #[tokio::test]
    async fn test_feedback_only_for_visible_undo() {
        let store = Arc::new(EpisodeStore::open_in_memory(SyncConfig::default()).await.unwrap());
        let episode = Episode::new(EpisodeId(1), "Pilot")
            .with_media(Media::new(MediaId(1), Duration::from_secs(600)));
        store.upsert_episode(&episode).await.unwrap();

        let feedback = Arc::new(TerminalFeedback::default());
        let dispatcher = ActionDispatcher::new(
            Collaborators {
                store: store.clone(),
                media_files: store.clone(),
                sync_queue: store.clone(),
                playback: store.clone(),
                preferences: Arc::new(PlaybackConfig::default()),
                feedback: feedback.clone(),
                links: Arc::new(BrowserLinks),
            },
            UndoTiming::default(),
        );

        dispatcher.dispatch("remove-from-inbox", &episode).await.unwrap();
        assert!(feedback.take().is_none());

        let handle = dispatcher
            .mark_played_with_undo(&episode, PlayState::Played, true)
            .await
            .unwrap();
        let offer = feedback.take().unwrap();
        assert_eq!(offer.message, FeedbackMessage::MarkedAsPlayed);
        assert_eq!(offer.window, UndoTiming::default().feedback_window);
        assert!(feedback.take().is_none());

        assert!(handle.undo().await.unwrap());
        assert_eq!(store.episode(EpisodeId(1)).await.unwrap().play_state, PlayState::New);
    }
}
