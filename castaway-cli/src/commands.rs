use crate::terminal::{BrowserLinks, TerminalFeedback};
use castaway_core::{
    ActionDispatcher, ActionEvent, CastawayConfig, Collaborators, CoreError, Episode, EpisodeId,
    EpisodeStore, MenuAction, PlayState, Result, UndoHandle, UndoState, VisibilityPolicy,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const EVENT_DRAIN_TIMEOUT: Duration = Duration::from_millis(250);

/// Import episodes from a JSON array
pub async fn import(store: &EpisodeStore, file: &Path) -> Result<()> {
    let content = tokio::fs::read_to_string(file).await?;
    let episodes: Vec<Episode> = serde_json::from_str(&content)?;

    for episode in &episodes {
        store.upsert_episode(episode).await?;
    }

    info!("Imported {} episode(s) from {:?}", episodes.len(), file);
    println!("Imported {} episode(s)", episodes.len());
    Ok(())
}

/// Print the menu for one episode
pub async fn menu(store: &EpisodeStore, episode_id: EpisodeId, exclude: &[String]) -> Result<()> {
    let exclude = exclude
        .iter()
        .map(|id| id.parse::<MenuAction>())
        .collect::<Result<Vec<_>>>()?;

    let episode = store.episode(episode_id).await?;
    let menu = VisibilityPolicy::compute_excluding(&episode, &exclude);

    println!("{} [{}]", episode.title, episode.play_state);
    for (action, item) in menu.iter() {
        let marker = if item.enabled { "*" } else { " " };
        println!("{marker} {:<22} {}", action.as_str(), item.label.text());
    }
    Ok(())
}

fn dispatcher_for(
    store: &Arc<EpisodeStore>,
    config: &CastawayConfig,
    feedback: &Arc<TerminalFeedback>,
) -> ActionDispatcher {
    ActionDispatcher::new(
        Collaborators {
            store: store.clone(),
            media_files: store.clone(),
            sync_queue: store.clone(),
            playback: store.clone(),
            preferences: Arc::new(config.playback.clone()),
            feedback: feedback.clone(),
            links: Arc::new(BrowserLinks),
        },
        config.undo.timing(),
    )
}

/// Apply one menu action, then hold the undo window open if one was opened
pub async fn run(
    store: Arc<EpisodeStore>,
    config: &CastawayConfig,
    action_id: &str,
    episode_id: EpisodeId,
    undo_now: bool,
    cancel_token: CancellationToken,
) -> Result<()> {
    let episode = store.episode(episode_id).await?;
    let feedback = Arc::new(TerminalFeedback::default());
    let dispatcher = dispatcher_for(&store, config, &feedback);
    let events = tokio::spawn(log_action_events(dispatcher.subscribe()));

    let outcome = match dispatcher.dispatch(action_id, &episode).await {
        Ok(Some(handle)) => {
            hold_undo_window(&handle, &feedback, config, undo_now, cancel_token).await
        }
        Ok(None) => Ok(()),
        Err(e) => Err(e),
    };

    finish(dispatcher, events).await;
    outcome
}

/// Change the play state with an undo offer on the terminal
pub async fn mark(
    store: Arc<EpisodeStore>,
    config: &CastawayConfig,
    episode_id: EpisodeId,
    target: PlayState,
    undo_now: bool,
    cancel_token: CancellationToken,
) -> Result<()> {
    let episode = store.episode(episode_id).await?;
    let feedback = Arc::new(TerminalFeedback::default());
    let dispatcher = dispatcher_for(&store, config, &feedback);
    let events = tokio::spawn(log_action_events(dispatcher.subscribe()));

    let outcome = match dispatcher.mark_played_with_undo(&episode, target, true).await {
        Ok(handle) => {
            hold_undo_window(&handle, &feedback, config, undo_now, cancel_token).await
        }
        Err(e) => Err(e),
    };

    finish(dispatcher, events).await;
    outcome
}

/// Wait for background sync work and let the event log catch up
async fn finish(dispatcher: ActionDispatcher, events: JoinHandle<()>) {
    dispatcher.flush_sync().await;
    drop(dispatcher);
    // Undo timers may still hold the event channel for a moment
    let _ = tokio::time::timeout(EVENT_DRAIN_TIMEOUT, events).await;
}

/// Keep the process alive until the window settles so the cleanup can run
async fn hold_undo_window(
    handle: &UndoHandle,
    feedback: &TerminalFeedback,
    config: &CastawayConfig,
    undo_now: bool,
    cancel_token: CancellationToken,
) -> Result<()> {
    // Windows opened without feedback are held for the default display length
    let offer = feedback.take();
    let window = offer
        .as_ref()
        .map_or(config.undo.timing().feedback_window, |offer| offer.window);

    if undo_now {
        handle.undo().await?;
    } else {
        tokio::select! {
            () = cancel_token.cancelled() => {
                handle.undo().await?;
            }
            () = tokio::time::sleep(window) => {}
        }
    }

    match handle.settled().await {
        UndoState::Cancelled => println!("Undone, episode is {} again", handle.prior_play_state()),
        UndoState::Fired => match offer {
            Some(offer) => println!("{}", offer.message),
            None => info!("Episode {} stays {}", handle.episode_id(), handle.target_play_state()),
        },
        UndoState::Active => warn!("Undo window for episode {} still open", handle.episode_id()),
    }
    Ok(())
}

/// Print the sync queue as JSON lines
pub async fn pending(store: &EpisodeStore) -> Result<()> {
    let actions = store.pending_sync_actions().await?;
    if actions.is_empty() {
        println!("No pending episode actions");
        return Ok(());
    }

    for action in &actions {
        println!("{}", serde_json::to_string(action)?);
    }
    Ok(())
}

async fn log_action_events(mut rx: broadcast::Receiver<ActionEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => match event {
                ActionEvent::ActionApplied { action, episode_id } => {
                    info!("Applied {} to episode {}", action, episode_id);
                }
                ActionEvent::ActionRejected {
                    action_id,
                    episode_id,
                    reason,
                } => {
                    warn!("Rejected {} on episode {}: {}", action_id, episode_id, reason);
                }
                ActionEvent::UndoScheduled {
                    episode_id,
                    message,
                    target,
                } => {
                    info!("Episode {} is now {} ({})", episode_id, target, message.key());
                }
                ActionEvent::UndoActivated {
                    episode_id,
                    restored,
                } => {
                    info!("Episode {} restored to {}", episode_id, restored);
                }
                ActionEvent::UndoExpired {
                    episode_id,
                    media_deleted,
                } => {
                    info!(
                        "Undo window for episode {} closed (download removed: {})",
                        episode_id, media_deleted
                    );
                }
            },
            Err(broadcast::error::RecvError::Closed) => break,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                info!("Missed {} action events", n);
            }
        }
    }
}

/// Map an episode id argument, rejecting ids that cannot exist
pub fn episode_id(raw: i64) -> Result<EpisodeId> {
    if raw < 0 {
        return Err(CoreError::EpisodeNotFound {
            episode_id: EpisodeId(raw),
        });
    }
    Ok(EpisodeId(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use castaway_core::{Media, MediaId, StateStore, SyncActionKind, SyncConfig};

    async fn seeded_store(sync: SyncConfig) -> Arc<EpisodeStore> {
        let store = EpisodeStore::open_in_memory(sync).await.unwrap();
        let mut episode = Episode::new(EpisodeId(1), "Pilot")
            .with_media(Media::new(MediaId(1), Duration::from_secs(600)));
        episode.feed.download_url = Some("https://example.com/feed.xml".to_string());
        store.upsert_episode(&episode).await.unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_run_mark_read_reaches_sync_queue() {
        let store = seeded_store(SyncConfig {
            enabled: true,
            provider: "gpodder".to_string(),
        })
        .await;

        run(
            store.clone(),
            &CastawayConfig::default(),
            "mark-read",
            EpisodeId(1),
            false,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(store.episode(EpisodeId(1)).await.unwrap().play_state, PlayState::Played);
        let pending = store.pending_sync_actions().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].kind, SyncActionKind::Play);
        assert_eq!(pending[0].total, Some(600));
    }

    #[tokio::test]
    async fn test_run_with_immediate_undo_restores_state() {
        let store = seeded_store(SyncConfig::default()).await;

        run(
            store.clone(),
            &CastawayConfig::default(),
            "remove-from-inbox",
            EpisodeId(1),
            true,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(store.episode(EpisodeId(1)).await.unwrap().play_state, PlayState::New);
    }

    #[tokio::test]
    async fn test_run_cancelled_token_undoes() {
        let store = seeded_store(SyncConfig::default()).await;
        let token = CancellationToken::new();
        token.cancel();

        run(
            store.clone(),
            &CastawayConfig::default(),
            "remove-from-inbox",
            EpisodeId(1),
            false,
            token,
        )
        .await
        .unwrap();

        assert_eq!(store.episode(EpisodeId(1)).await.unwrap().play_state, PlayState::New);
    }

    #[tokio::test]
    async fn test_run_unknown_action() {
        let store = seeded_store(SyncConfig::default()).await;

        let err = run(
            store.clone(),
            &CastawayConfig::default(),
            "launch-rocket",
            EpisodeId(1),
            false,
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CoreError::UnknownAction { .. }));
        assert_eq!(store.episode(EpisodeId(1)).await.unwrap().play_state, PlayState::New);
    }

    #[tokio::test]
    async fn test_import_reads_json_array() {
        let store = EpisodeStore::open_in_memory(SyncConfig::default()).await.unwrap();
        let dir = std::env::temp_dir().join(format!("castaway-import-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("episodes.json");
        std::fs::write(
            &file,
            r#"[{"id": 5, "title": "Five", "play_state": "unplayed", "queued": true}]"#,
        )
        .unwrap();

        import(&store, &file).await.unwrap();

        let episode = store.episode(EpisodeId(5)).await.unwrap();
        assert_eq!(episode.title, "Five");
        assert_eq!(episode.play_state, PlayState::Unplayed);
        assert!(episode.queued);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_menu_rejects_unknown_exclusion() {
        let store = seeded_store(SyncConfig::default()).await;
        let err = menu(&store, EpisodeId(1), &["nope".to_string()]).await.unwrap_err();
        assert!(matches!(err, CoreError::UnknownAction { .. }));
    }

    #[tokio::test]
    async fn test_mark_with_immediate_undo() {
        let store = seeded_store(SyncConfig::default()).await;
        store.set_play_state(EpisodeId(1), PlayState::Unplayed).await.unwrap();

        mark(
            store.clone(),
            &CastawayConfig::default(),
            EpisodeId(1),
            PlayState::Played,
            true,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(store.episode(EpisodeId(1)).await.unwrap().play_state, PlayState::Unplayed);
    }

    #[tokio::test]
    async fn test_mark_missing_episode() {
        let store = seeded_store(SyncConfig::default()).await;
        let err = mark(
            store,
            &CastawayConfig::default(),
            EpisodeId(9),
            PlayState::Played,
            true,
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CoreError::EpisodeNotFound { .. }));
    }

    #[test]
    fn test_negative_episode_id() {
        assert!(episode_id(-1).is_err());
        assert_eq!(episode_id(4).unwrap(), EpisodeId(4));
    }
}
