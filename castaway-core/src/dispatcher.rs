//! Turns menu actions into state changes and side effects.
//!
//! Dispatch happens in two steps. [`ActionDispatcher::plan`] is pure: it checks
//! preconditions and describes the change as a [`Command`]. Executing the
//! command applies the single mutation to the store and then hands each side
//! effect to the collaborator responsible for it. Nothing is written when
//! planning fails.

use crate::action::MenuAction;
use crate::collaborators::{Collaborators, LinkOpener, MediaFileStore, PlaybackControl, PlaybackSignal, StateStore};
use crate::episode::{Episode, EpisodeId, MediaId, PlayState};
use crate::error::{CoreError, Result};
use crate::events::ActionEvent;
use crate::sync::{SyncPropagator, Transition};
use crate::undo::{DeferredUndoScheduler, UndoHandle, UndoTiming};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const LOG_TARGET: &str = "castaway::dispatch";

/// The one state change a command makes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    PlayState(PlayState),
    /// Play state change with an undo window
    PlayStateWithUndo {
        target: PlayState,
        show_feedback: bool,
    },
    Queued(bool),
    Favorite(bool),
    /// Rewind the media and mark the episode unplayed
    ResetMedia,
}

/// Work for collaborators once the mutation is stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    Playback(PlaybackSignal),
    /// Stop playback if `MediaId` is the active session
    StopPlaybackIfActive(MediaId),
    DeleteMedia,
    Sync(Transition),
    OpenLink(url::Url),
    Share,
}

/// Description of what a menu action will do to one episode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub action: MenuAction,
    pub episode_id: EpisodeId,
    pub mutation: Option<Mutation>,
    pub effects: Vec<SideEffect>,
}

impl Command {
    const fn new(action: MenuAction, episode_id: EpisodeId) -> Self {
        Self {
            action,
            episode_id,
            mutation: None,
            effects: Vec::new(),
        }
    }

    fn mutate(mut self, mutation: Mutation) -> Self {
        self.mutation = Some(mutation);
        self
    }

    fn effect(mut self, effect: SideEffect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Applies menu actions to episodes
pub struct ActionDispatcher {
    store: Arc<dyn StateStore>,
    media_files: Arc<dyn MediaFileStore>,
    playback: Arc<dyn PlaybackControl>,
    links: Arc<dyn LinkOpener>,
    sync: SyncPropagator,
    undo: DeferredUndoScheduler,
    event_tx: broadcast::Sender<ActionEvent>,
}

impl ActionDispatcher {
    /// Create a dispatcher driving `collaborators`
    #[must_use]
    pub fn new(collaborators: Collaborators, timing: UndoTiming) -> Self {
        let (event_tx, _) = broadcast::channel(64);

        let undo = DeferredUndoScheduler::new(
            Arc::clone(&collaborators.store),
            Arc::clone(&collaborators.media_files),
            collaborators.preferences,
            collaborators.feedback,
            timing,
            event_tx.clone(),
        );

        Self {
            store: collaborators.store,
            media_files: collaborators.media_files,
            playback: collaborators.playback,
            links: collaborators.links,
            sync: SyncPropagator::new(collaborators.sync_queue),
            undo,
            event_tx,
        }
    }

    /// Subscribe to action events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ActionEvent> {
        self.event_tx.subscribe()
    }

    /// Describe what `action` would do to `episode` without doing it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MissingMedia`] for media actions on an episode
    /// without media, and [`CoreError::MissingLink`] when there is no website
    /// to visit.
    pub fn plan(action: MenuAction, episode: &Episode) -> Result<Command> {
        let command = Command::new(action, episode.id);

        let media = episode.media.as_ref();
        if action.requires_media() && media.is_none() {
            return Err(CoreError::MissingMedia {
                action,
                episode_id: episode.id,
            });
        }

        let command = match action {
            MenuAction::Skip => command.effect(SideEffect::Playback(PlaybackSignal::SkipCurrent)),
            MenuAction::RemoveFile => command.effect(SideEffect::DeleteMedia),
            MenuAction::RemoveFromInbox => command.mutate(Mutation::PlayStateWithUndo {
                target: PlayState::Unplayed,
                show_feedback: false,
            }),
            MenuAction::MarkRead => command
                .mutate(Mutation::PlayState(PlayState::Played))
                .effect(SideEffect::Sync(Transition::MarkedPlayed)),
            MenuAction::MarkUnread => command
                .mutate(Mutation::PlayState(PlayState::Unplayed))
                .effect(SideEffect::Sync(Transition::MarkedUnplayed)),
            MenuAction::AddToQueue => command.mutate(Mutation::Queued(true)),
            MenuAction::RemoveFromQueue => command.mutate(Mutation::Queued(false)),
            MenuAction::AddToFavorites => command.mutate(Mutation::Favorite(true)),
            MenuAction::RemoveFromFavorites => command.mutate(Mutation::Favorite(false)),
            MenuAction::ResetPosition => {
                let command = command.mutate(Mutation::ResetMedia);
                match media {
                    Some(media) => command.effect(SideEffect::StopPlaybackIfActive(media.id)),
                    None => command,
                }
            }
            MenuAction::VisitWebsite => {
                let url = episode
                    .link_with_fallback()
                    .ok_or(CoreError::MissingLink {
                        episode_id: episode.id,
                    })?;
                command.effect(SideEffect::OpenLink(url))
            }
            MenuAction::Share => command.effect(SideEffect::Share),
        };

        Ok(command)
    }

    /// Dispatch an action by its identifier.
    ///
    /// Returns the undo handle when the action opened an undo window.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownAction`] for unrecognized identifiers, in
    /// which case nothing is touched, plus any error from
    /// [`dispatch_action`](Self::dispatch_action).
    pub async fn dispatch(
        &self,
        action_id: &str,
        episode: &Episode,
    ) -> Result<Option<UndoHandle>> {
        let action = match action_id.parse::<MenuAction>() {
            Ok(action) => action,
            Err(e) => {
                debug!(target: LOG_TARGET, "Unknown menu action: {}", action_id);
                self.reject(action_id, episode.id, &e);
                return Err(e);
            }
        };

        self.dispatch_action(action, episode).await
    }

    /// Apply `action` to `episode`.
    ///
    /// Returns the undo handle when the action opened an undo window.
    ///
    /// # Errors
    ///
    /// Returns a precondition error from [`plan`](Self::plan) before anything
    /// is written, or the store error if the mutation fails.
    pub async fn dispatch_action(
        &self,
        action: MenuAction,
        episode: &Episode,
    ) -> Result<Option<UndoHandle>> {
        let command = match Self::plan(action, episode) {
            Ok(command) => command,
            Err(e) => {
                warn!(target: LOG_TARGET, "Refusing {} on episode {}: {}", action, episode.id, e);
                self.reject(action.as_str(), episode.id, &e);
                return Err(e);
            }
        };

        let undo = self.execute(command, episode).await?;

        info!(target: LOG_TARGET, "Applied {} to episode {}", action, episode.id);
        let _ = self.event_tx.send(ActionEvent::ActionApplied {
            action,
            episode_id: episode.id,
        });
        Ok(undo)
    }

    /// Change the play state of `episode` with an undo window.
    ///
    /// # Errors
    ///
    /// Returns an error if the play state could not be stored.
    pub async fn mark_played_with_undo(
        &self,
        episode: &Episode,
        target: PlayState,
        show_feedback: bool,
    ) -> Result<UndoHandle> {
        self.undo.schedule(episode, target, show_feedback).await
    }

    /// Wait for queued sync work to reach the sync queue
    pub async fn flush_sync(&self) {
        self.sync.flush().await;
    }

    async fn execute(&self, command: Command, episode: &Episode) -> Result<Option<UndoHandle>> {
        let episode_id = command.episode_id;
        let mut undo = None;

        if let Some(mutation) = command.mutation {
            match mutation {
                Mutation::PlayState(state) => self.store.set_play_state(episode_id, state).await?,
                Mutation::PlayStateWithUndo {
                    target,
                    show_feedback,
                } => {
                    undo = Some(self.undo.schedule(episode, target, show_feedback).await?);
                }
                Mutation::Queued(queued) => self.store.set_queued(episode_id, queued).await?,
                Mutation::Favorite(favorite) => self.store.set_favorite(episode_id, favorite).await?,
                Mutation::ResetMedia => self.store.reset_media(episode_id).await?,
            }
        }

        for effect in command.effects {
            match effect {
                SideEffect::Playback(signal) => self.playback.broadcast(signal).await,
                SideEffect::StopPlaybackIfActive(media_id) => {
                    if self.playback.currently_playing_media_id().await == Some(media_id) {
                        debug!(target: LOG_TARGET, "Media {} was playing, stopping playback", media_id);
                        self.playback.clear_currently_playing().await;
                        self.playback.broadcast(PlaybackSignal::Shutdown).await;
                    }
                }
                SideEffect::DeleteMedia => self.media_files.delete_media(episode_id).await,
                SideEffect::Sync(transition) => {
                    let _ = self.sync.propagate(episode, transition);
                }
                SideEffect::OpenLink(url) => self.links.open_in_browser(&url).await?,
                SideEffect::Share => self.links.share(episode).await,
            }
        }

        Ok(undo)
    }

    fn reject(&self, action_id: &str, episode_id: EpisodeId, reason: &CoreError) {
        let _ = self.event_tx.send(ActionEvent::ActionRejected {
            action_id: action_id.to_string(),
            episode_id,
            reason: reason.to_string(),
        });
    }
}
