//! SQLite-backed episode store.
//!
//! Implements the collaborator traits the dispatcher needs for a single-user
//! library: episode state, downloaded files, the outbound sync queue and the
//! "currently playing" pointer.

use crate::collaborators::{MediaFileStore, PlaybackControl, PlaybackSignal, StateStore, SyncQueue};
use crate::config::SyncConfig;
use crate::episode::{Episode, EpisodeId, FeedInfo, Media, MediaId, PlayState};
use crate::error::{CoreError, Result};
use crate::sync::SyncAction;
use crate::time::{duration_from_millis_i64, DurationExt};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::OptionalExtension;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_rusqlite::Connection;
use tracing::{debug, info, warn};

const LOG_TARGET: &str = "castaway::store";

const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS episodes (
    id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    guid TEXT,
    link TEXT,
    feed_local INTEGER NOT NULL DEFAULT 0,
    feed_link TEXT,
    feed_download_url TEXT,
    play_state TEXT NOT NULL,
    queued INTEGER NOT NULL DEFAULT 0,
    favorite INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS media (
    id INTEGER PRIMARY KEY,
    episode_id INTEGER NOT NULL UNIQUE,
    position_ms INTEGER NOT NULL DEFAULT 0,
    duration_ms INTEGER NOT NULL DEFAULT 0,
    download_url TEXT,
    local_path TEXT,
    FOREIGN KEY (episode_id) REFERENCES episodes(id) ON DELETE CASCADE
);

-- Episode actions waiting for the sync service
CREATE TABLE IF NOT EXISTS sync_actions (
    id INTEGER PRIMARY KEY,
    episode_id INTEGER NOT NULL,
    payload TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

-- Single row: media of the active playback session
CREATE TABLE IF NOT EXISTS playback (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    media_id INTEGER
);

CREATE INDEX IF NOT EXISTS idx_media_episode ON media(episode_id);
CREATE INDEX IF NOT EXISTS idx_sync_actions_created ON sync_actions(created_at);
";

const EPISODE_SELECT: &str = r"
    SELECT e.id, e.title, e.guid, e.link, e.feed_local, e.feed_link, e.feed_download_url,
           e.play_state, e.queued, e.favorite,
           m.id, m.position_ms, m.duration_ms, m.download_url, m.local_path,
           (SELECT media_id FROM playback WHERE id = 1)
    FROM episodes e
    LEFT JOIN media m ON m.episode_id = e.id
";

/// Episode row as read from the database
struct EpisodeRow {
    episode: Episode,
    media_id: Option<i64>,
    position_ms: i64,
    duration_ms: i64,
    download_url: Option<String>,
    local_path: Option<String>,
    playing_media_id: Option<i64>,
}

impl EpisodeRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let raw_state: String = row.get(7)?;
        let play_state = PlayState::parse(&raw_state).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                7,
                rusqlite::types::Type::Text,
                format!("unknown play state {raw_state:?}").into(),
            )
        })?;
        Ok(Self {
            episode: Episode {
                id: EpisodeId(row.get(0)?),
                title: row.get(1)?,
                guid: row.get(2)?,
                link: row.get(3)?,
                feed: FeedInfo {
                    local: row.get(4)?,
                    link: row.get(5)?,
                    download_url: row.get(6)?,
                },
                play_state,
                queued: row.get(8)?,
                favorite: row.get(9)?,
                media: None,
            },
            media_id: row.get(10)?,
            position_ms: row.get::<_, Option<i64>>(11)?.unwrap_or(0),
            duration_ms: row.get::<_, Option<i64>>(12)?.unwrap_or(0),
            download_url: row.get(13)?,
            local_path: row.get(14)?,
            playing_media_id: row.get(15)?,
        })
    }

    /// Attach media, checking the disk for the downloaded file
    fn into_episode(self) -> Episode {
        let mut episode = self.episode;
        episode.media = self.media_id.map(|id| {
            let local_path = self.local_path.map(PathBuf::from);
            Media {
                id: MediaId(id),
                file_exists: local_path.as_deref().is_some_and(Path::exists),
                position: duration_from_millis_i64(self.position_ms),
                duration: duration_from_millis_i64(self.duration_ms),
                is_playing: self.playing_media_id == Some(id),
                download_url: self.download_url,
                local_path,
            }
        });
        episode
    }
}

/// SQLite-based episode store
#[derive(Clone)]
pub struct EpisodeStore {
    conn: Connection,
    sync: SyncConfig,
}

impl EpisodeStore {
    /// Open the store at the default location
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created or opened.
    pub async fn new(sync: SyncConfig) -> Result<Self> {
        Self::open(&crate::paths::database_path(), sync).await
    }

    /// Open a store at a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub async fn open(path: &Path, sync: SyncConfig) -> Result<Self> {
        info!(target: LOG_TARGET, "Opening episode database at {:?}", path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).await?;
        Self::init(conn, sync).await
    }

    /// Open a throwaway in-memory store
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub async fn open_in_memory(sync: SyncConfig) -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn, sync).await
    }

    async fn init(conn: Connection, sync: SyncConfig) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA_SQL)?;
            // In-memory databases answer "memory" instead of "wal"
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            Ok(())
        })
        .await?;

        debug!(target: LOG_TARGET, "Episode database initialized");
        Ok(Self { conn, sync })
    }

    /// Insert or replace an episode and its media
    ///
    /// # Errors
    ///
    /// Returns an error if the episode cannot be written.
    pub async fn upsert_episode(&self, episode: &Episode) -> Result<()> {
        let episode = episode.clone();

        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    r"
                    INSERT INTO episodes (id, title, guid, link, feed_local, feed_link, feed_download_url,
                                          play_state, queued, favorite)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                    ON CONFLICT(id) DO UPDATE SET
                        title = excluded.title,
                        guid = excluded.guid,
                        link = excluded.link,
                        feed_local = excluded.feed_local,
                        feed_link = excluded.feed_link,
                        feed_download_url = excluded.feed_download_url,
                        play_state = excluded.play_state,
                        queued = excluded.queued,
                        favorite = excluded.favorite
                ",
                    rusqlite::params![
                        episode.id.0,
                        episode.title,
                        episode.guid,
                        episode.link,
                        episode.feed.local,
                        episode.feed.link,
                        episode.feed.download_url,
                        episode.play_state.as_str(),
                        episode.queued,
                        episode.favorite,
                    ],
                )?;

                tx.execute(
                    "DELETE FROM media WHERE episode_id = ?1",
                    rusqlite::params![episode.id.0],
                )?;
                if let Some(media) = &episode.media {
                    tx.execute(
                        r"
                        INSERT INTO media (id, episode_id, position_ms, duration_ms, download_url, local_path)
                        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    ",
                        rusqlite::params![
                            media.id.0,
                            episode.id.0,
                            media.position.as_millis_i64(),
                            media.duration.as_millis_i64(),
                            media.download_url,
                            media
                                .local_path
                                .as_ref()
                                .map(|p| p.to_string_lossy().into_owned()),
                        ],
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Into::into)
    }

    /// Load one episode
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EpisodeNotFound`] if no such episode exists, or an
    /// error if the query fails.
    pub async fn episode(&self, episode_id: EpisodeId) -> Result<Episode> {
        let row = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare_cached(&format!("{EPISODE_SELECT} WHERE e.id = ?1"))?;
                let row = stmt
                    .query_row(rusqlite::params![episode_id.0], EpisodeRow::from_row)
                    .optional()?;
                Ok(row)
            })
            .await?;

        row.map(EpisodeRow::into_episode)
            .ok_or(CoreError::EpisodeNotFound { episode_id })
    }

    /// Load every episode, ordered by id
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn episodes(&self) -> Result<Vec<Episode>> {
        let rows = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare_cached(&format!("{EPISODE_SELECT} ORDER BY e.id"))?;
                let rows = stmt
                    .query_map([], EpisodeRow::from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;

        Ok(rows.into_iter().map(EpisodeRow::into_episode).collect())
    }

    /// Episode actions waiting for the sync service, oldest first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a stored payload is not valid JSON.
    pub async fn pending_sync_actions(&self) -> Result<Vec<SyncAction>> {
        let payloads = self
            .conn
            .call(|conn| {
                let mut stmt =
                    conn.prepare_cached("SELECT payload FROM sync_actions ORDER BY id")?;
                let payloads = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(payloads)
            })
            .await?;

        payloads
            .iter()
            .map(|payload| serde_json::from_str(payload).map_err(Into::into))
            .collect()
    }

    /// Record which media the playback session is on
    ///
    /// # Errors
    ///
    /// Returns an error if the pointer cannot be written.
    pub async fn set_currently_playing(&self, media_id: Option<MediaId>) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    r"
                    INSERT INTO playback (id, media_id) VALUES (1, ?1)
                    ON CONFLICT(id) DO UPDATE SET media_id = excluded.media_id
                ",
                    rusqlite::params![media_id.map(|id| id.0)],
                )?;
                Ok(())
            })
            .await
            .map_err(Into::into)
    }

    /// Run one UPDATE against an episode, failing if it does not exist
    async fn update_episode(
        &self,
        episode_id: EpisodeId,
        sql: &'static str,
        value: rusqlite::types::Value,
    ) -> Result<()> {
        let updated = self
            .conn
            .call(move |conn| {
                let updated = conn.execute(sql, rusqlite::params![value, episode_id.0])?;
                Ok(updated)
            })
            .await
            .map_err(CoreError::store_write)?;

        if updated == 0 {
            return Err(CoreError::EpisodeNotFound { episode_id });
        }
        Ok(())
    }

    async fn local_path(&self, episode_id: EpisodeId) -> Result<Option<PathBuf>> {
        let path = self
            .conn
            .call(move |conn| {
                let path = conn
                    .query_row(
                        "SELECT local_path FROM media WHERE episode_id = ?1",
                        rusqlite::params![episode_id.0],
                        |row| row.get::<_, Option<String>>(0),
                    )
                    .optional()?
                    .flatten();
                Ok(path)
            })
            .await?;
        Ok(path.map(PathBuf::from))
    }

    /// Checkpoint WAL for clean shutdown
    ///
    /// # Errors
    ///
    /// Returns an error if the WAL checkpoint fails.
    pub async fn checkpoint(&self) -> Result<()> {
        self.conn
            .call(|conn| {
                conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
                Ok(())
            })
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl StateStore for EpisodeStore {
    async fn set_play_state(&self, episode_id: EpisodeId, state: PlayState) -> Result<()> {
        debug!(target: LOG_TARGET, "Episode {} play state -> {}", episode_id, state);
        self.update_episode(
            episode_id,
            "UPDATE episodes SET play_state = ?1 WHERE id = ?2",
            state.as_str().to_string().into(),
        )
        .await
    }

    async fn set_queued(&self, episode_id: EpisodeId, queued: bool) -> Result<()> {
        self.update_episode(
            episode_id,
            "UPDATE episodes SET queued = ?1 WHERE id = ?2",
            i64::from(queued).into(),
        )
        .await
    }

    async fn set_favorite(&self, episode_id: EpisodeId, favorite: bool) -> Result<()> {
        self.update_episode(
            episode_id,
            "UPDATE episodes SET favorite = ?1 WHERE id = ?2",
            i64::from(favorite).into(),
        )
        .await
    }

    async fn set_media_position(&self, episode_id: EpisodeId, position: Duration) -> Result<()> {
        self.update_episode(
            episode_id,
            "UPDATE media SET position_ms = ?1 WHERE episode_id = ?2",
            position.as_millis_i64().into(),
        )
        .await
    }

    async fn reset_media(&self, episode_id: EpisodeId) -> Result<()> {
        let updated = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let updated = tx.execute(
                    "UPDATE media SET position_ms = 0 WHERE episode_id = ?1",
                    rusqlite::params![episode_id.0],
                )?;
                if updated == 0 {
                    // Dropping the transaction rolls back
                    return Ok(0);
                }
                tx.execute(
                    "UPDATE episodes SET play_state = ?1 WHERE id = ?2",
                    rusqlite::params![PlayState::Unplayed.as_str(), episode_id.0],
                )?;
                tx.commit()?;
                Ok(updated)
            })
            .await
            .map_err(CoreError::store_write)?;

        if updated == 0 {
            return Err(CoreError::EpisodeNotFound { episode_id });
        }
        Ok(())
    }
}

#[async_trait]
impl MediaFileStore for EpisodeStore {
    async fn delete_media(&self, episode_id: EpisodeId) {
        let path = match self.local_path(episode_id).await {
            Ok(Some(path)) => path,
            Ok(None) => {
                debug!(target: LOG_TARGET, "Episode {} has no downloaded file", episode_id);
                return;
            }
            Err(e) => {
                warn!(target: LOG_TARGET, "Failed to look up download of episode {}: {}", episode_id, e);
                return;
            }
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => info!(target: LOG_TARGET, "Deleted {:?}", path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(target: LOG_TARGET, "{:?} already gone", path);
            }
            Err(e) => {
                warn!(target: LOG_TARGET, "Failed to delete {:?}: {}", path, e);
                return;
            }
        }

        let cleared = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE media SET local_path = NULL WHERE episode_id = ?1",
                    rusqlite::params![episode_id.0],
                )?;
                Ok(())
            })
            .await;
        if let Err(e) = cleared {
            warn!(target: LOG_TARGET, "Failed to clear download of episode {}: {}", episode_id, e);
        }
    }
}

#[async_trait]
impl SyncQueue for EpisodeStore {
    async fn is_active(&self) -> bool {
        self.sync.is_connected()
    }

    async fn enqueue(&self, action: SyncAction) -> Result<()> {
        let payload = serde_json::to_string(&action)?;
        let episode_id = action.episode_id;
        let now = Utc::now().timestamp();

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO sync_actions (episode_id, payload, created_at) VALUES (?1, ?2, ?3)",
                    rusqlite::params![episode_id.0, payload, now],
                )?;
                Ok(())
            })
            .await
            .map_err(CoreError::store_write)
    }
}

#[async_trait]
impl PlaybackControl for EpisodeStore {
    async fn broadcast(&self, signal: PlaybackSignal) {
        info!(target: LOG_TARGET, "Playback signal: {:?}", signal);
    }

    async fn currently_playing_media_id(&self) -> Option<MediaId> {
        let current = self
            .conn
            .call(|conn| {
                let id = conn
                    .query_row("SELECT media_id FROM playback WHERE id = 1", [], |row| {
                        row.get::<_, Option<i64>>(0)
                    })
                    .optional()?
                    .flatten();
                Ok(id)
            })
            .await;

        match current {
            Ok(id) => id.map(MediaId),
            Err(e) => {
                warn!(target: LOG_TARGET, "Failed to read playback session: {}", e);
                None
            }
        }
    }

    async fn clear_currently_playing(&self) {
        if let Err(e) = self.set_currently_playing(None).await {
            warn!(target: LOG_TARGET, "Failed to clear playback session: {}", e);
        }
    }
}
