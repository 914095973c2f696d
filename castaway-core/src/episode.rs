use crate::time::DurationExt;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Stable identifier of an episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EpisodeId(pub i64);

impl std::fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identifier of an episode's media
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaId(pub i64);

impl std::fmt::Display for MediaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Play state of an episode. Exactly one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlayState {
    /// Still in the inbox
    #[default]
    New,
    Unplayed,
    Played,
}

impl PlayState {
    /// Get the string identifier used for persistence.
    ///
    /// This identifier is stable and stored in the database, so it should not
    /// change once established.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Unplayed => "unplayed",
            Self::Played => "played",
        }
    }

    /// Parse a persisted identifier
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(Self::New),
            "unplayed" => Some(Self::Unplayed),
            "played" => Some(Self::Played),
            _ => None,
        }
    }
}

impl std::fmt::Display for PlayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Feed attributes an episode inherits
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedInfo {
    /// Local-only feeds (folders on disk) have nothing to visit or share
    #[serde(default)]
    pub local: bool,
    /// Website of the feed, used when the episode has no link of its own
    #[serde(default)]
    pub link: Option<String>,
    /// Feed URL, reported to the sync service as the podcast reference
    #[serde(default)]
    pub download_url: Option<String>,
}

/// Downloadable media attached to an episode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub id: MediaId,
    /// Whether the downloaded file is present on disk
    #[serde(default)]
    pub file_exists: bool,
    /// Elapsed playback
    #[serde(default, with = "duration_ms")]
    pub position: Duration,
    /// Total length
    #[serde(default, with = "duration_ms")]
    pub duration: Duration,
    /// Whether this media is the one currently playing
    #[serde(default)]
    pub is_playing: bool,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub local_path: Option<PathBuf>,
}

impl Media {
    /// Create media with no playback progress and no local file
    #[must_use]
    pub const fn new(id: MediaId, duration: Duration) -> Self {
        Self {
            id,
            file_exists: false,
            position: Duration::ZERO,
            duration,
            is_playing: false,
            download_url: None,
            local_path: None,
        }
    }

    /// Set the playback position
    #[must_use]
    pub const fn with_position(mut self, position: Duration) -> Self {
        self.position = position;
        self
    }

    /// Mark the downloaded file as present at `path`
    #[must_use]
    pub fn with_local_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_exists = true;
        self.local_path = Some(path.into());
        self
    }

    /// Mark the media as currently playing
    #[must_use]
    pub const fn playing(mut self) -> Self {
        self.is_playing = true;
        self
    }

    /// Total length in whole seconds, as reported to the sync service.
    #[must_use]
    pub fn duration_secs(&self) -> u32 {
        self.duration.as_secs_u32()
    }

    /// Whether playback is within `threshold` of the end.
    ///
    /// Media with an unknown (zero) duration never counts as almost ended.
    #[must_use]
    pub fn has_almost_ended(&self, threshold: Duration) -> bool {
        !self.duration.is_zero() && self.position >= self.duration.saturating_sub(threshold)
    }
}

/// A podcast episode as seen by the action coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    pub id: EpisodeId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub guid: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub feed: FeedInfo,
    #[serde(default)]
    pub play_state: PlayState,
    #[serde(default)]
    pub queued: bool,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default)]
    pub media: Option<Media>,
}

impl Episode {
    /// Create a new inbox episode without media
    pub fn new(id: EpisodeId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            guid: None,
            link: None,
            feed: FeedInfo::default(),
            play_state: PlayState::New,
            queued: false,
            favorite: false,
            media: None,
        }
    }

    /// Attach media
    #[must_use]
    pub fn with_media(mut self, media: Media) -> Self {
        self.media = Some(media);
        self
    }

    /// Set the play state
    #[must_use]
    pub const fn with_play_state(mut self, play_state: PlayState) -> Self {
        self.play_state = play_state;
        self
    }

    /// Set the episode website
    #[must_use]
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    #[must_use]
    pub const fn is_new(&self) -> bool {
        matches!(self.play_state, PlayState::New)
    }

    #[must_use]
    pub const fn is_played(&self) -> bool {
        matches!(self.play_state, PlayState::Played)
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.media.as_ref().is_some_and(|m| m.is_playing)
    }

    #[must_use]
    pub fn file_downloaded(&self) -> bool {
        self.media.as_ref().is_some_and(|m| m.file_exists)
    }

    /// The episode website, falling back to the feed website.
    ///
    /// Only absolute URLs count; anything that does not parse is treated as
    /// having no link at all.
    #[must_use]
    pub fn link_with_fallback(&self) -> Option<url::Url> {
        [self.link.as_deref(), self.feed.link.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|link| !link.is_empty())
            .find_map(|link| url::Url::parse(link).ok())
    }
}

/// Serialize durations as integer milliseconds
mod duration_ms {
    use crate::time::DurationExt;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis_u64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_play_state_round_trip_identifiers() {
        for state in [PlayState::New, PlayState::Unplayed, PlayState::Played] {
            assert_eq!(PlayState::parse(state.as_str()), Some(state));
        }
        assert_eq!(PlayState::parse("skipped"), None);
    }

    #[test]
    fn test_media_duration_secs_truncates() {
        let media = Media::new(MediaId(1), Duration::from_millis(3_600_999));
        assert_eq!(media.duration_secs(), 3600);
    }

    #[test]
    fn test_has_almost_ended() {
        let media = Media::new(MediaId(1), Duration::from_secs(600));
        let threshold = Duration::from_secs(30);

        assert!(!media.clone().with_position(Duration::from_secs(100)).has_almost_ended(threshold));
        assert!(media.clone().with_position(Duration::from_secs(570)).has_almost_ended(threshold));
        assert!(media.with_position(Duration::from_secs(600)).has_almost_ended(threshold));
    }

    #[test]
    fn test_has_almost_ended_unknown_duration() {
        let media = Media::new(MediaId(1), Duration::ZERO);
        assert!(!media.has_almost_ended(Duration::from_secs(30)));
    }

    #[test]
    fn test_link_with_fallback_prefers_episode_link() {
        let mut episode = Episode::new(EpisodeId(1), "Ep").with_link("https://example.com/ep/1");
        episode.feed.link = Some("https://example.com".to_string());

        let link = episode.link_with_fallback();
        assert_eq!(link.map(String::from), Some("https://example.com/ep/1".to_string()));
    }

    #[test]
    fn test_link_with_fallback_uses_feed_link() {
        let mut episode = Episode::new(EpisodeId(1), "Ep").with_link("   ");
        episode.feed.link = Some("https://example.com/".to_string());

        let link = episode.link_with_fallback();
        assert_eq!(link.map(String::from), Some("https://example.com/".to_string()));
    }

    #[test]
    fn test_link_with_fallback_rejects_relative_links() {
        let episode = Episode::new(EpisodeId(1), "Ep").with_link("/episodes/1");
        assert!(episode.link_with_fallback().is_none());
    }

    #[test]
    fn test_episode_deserializes_with_defaults() {
        let json = r#"{"id": 7, "media": {"id": 70, "duration": 1500}}"#;
        let episode: Episode = serde_json::from_str(json).unwrap();

        assert_eq!(episode.id, EpisodeId(7));
        assert_eq!(episode.play_state, PlayState::New);
        assert!(!episode.queued);
        let media = episode.media.unwrap();
        assert_eq!(media.duration, Duration::from_millis(1500));
        assert_eq!(media.position, Duration::ZERO);
    }
}
