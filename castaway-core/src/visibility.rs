//! Which menu actions an episode offers.

use crate::action::{MenuAction, MenuLabel};
use crate::episode::Episode;
use std::collections::BTreeMap;

/// State of one menu entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuItem {
    pub enabled: bool,
    pub label: MenuLabel,
}

/// Enabled/labeled state for every [`MenuAction`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilitySet {
    items: BTreeMap<MenuAction, MenuItem>,
}

impl VisibilitySet {
    /// Whether `action` is offered
    #[must_use]
    pub fn is_enabled(&self, action: MenuAction) -> bool {
        self.items.get(&action).is_some_and(|item| item.enabled)
    }

    /// Label for `action`
    #[must_use]
    pub fn label(&self, action: MenuAction) -> MenuLabel {
        self.items
            .get(&action)
            .map_or_else(|| action.label(), |item| item.label)
    }

    /// Enabled actions, in menu order
    pub fn enabled(&self) -> impl Iterator<Item = MenuAction> + '_ {
        self.items
            .iter()
            .filter(|(_, item)| item.enabled)
            .map(|(action, _)| *action)
    }

    /// All entries, in menu order
    pub fn iter(&self) -> impl Iterator<Item = (MenuAction, MenuItem)> + '_ {
        self.items.iter().map(|(action, item)| (*action, *item))
    }

    fn set(&mut self, action: MenuAction, enabled: bool) {
        self.items
            .entry(action)
            .and_modify(|item| item.enabled = enabled)
            .or_insert(MenuItem {
                enabled,
                label: action.label(),
            });
    }

    fn set_label(&mut self, action: MenuAction, label: MenuLabel) {
        if let Some(item) = self.items.get_mut(&action) {
            item.label = label;
        }
    }
}

/// Derives the menu for an episode from its current attributes.
///
/// Every rule is independent of the others; nothing here performs I/O.
pub struct VisibilityPolicy;

impl VisibilityPolicy {
    /// Compute the menu state for `episode`
    #[must_use]
    pub fn compute(episode: &Episode) -> VisibilitySet {
        let has_media = episode.media.is_some();
        let is_playing = episode.is_playing();
        let local_feed = episode.feed.local;

        let mut set = VisibilitySet {
            items: BTreeMap::new(),
        };

        set.set(MenuAction::Skip, is_playing);
        set.set(MenuAction::RemoveFromQueue, episode.queued);
        set.set(MenuAction::AddToQueue, !episode.queued && has_media);
        set.set(
            MenuAction::VisitWebsite,
            !local_feed && episode.link_with_fallback().is_some(),
        );
        set.set(MenuAction::Share, !local_feed);
        set.set(MenuAction::RemoveFromInbox, episode.is_new());
        set.set(MenuAction::MarkRead, !episode.is_played());
        set.set(MenuAction::MarkUnread, episode.is_played());
        set.set(
            MenuAction::ResetPosition,
            episode.media.as_ref().is_some_and(|m| !m.position.is_zero()),
        );

        if has_media {
            set.set_label(MenuAction::MarkRead, MenuLabel::MarkRead);
            set.set_label(MenuAction::MarkUnread, MenuLabel::MarkUnread);
        } else {
            set.set_label(MenuAction::MarkRead, MenuLabel::MarkReadNoMedia);
            set.set_label(MenuAction::MarkUnread, MenuLabel::MarkUnreadNoMedia);
        }

        set.set(MenuAction::AddToFavorites, !episode.favorite);
        set.set(MenuAction::RemoveFromFavorites, episode.favorite);
        set.set(MenuAction::RemoveFile, episode.file_downloaded());
        set
    }

    /// Same as [`compute`](Self::compute), then forces `exclude` disabled
    #[must_use]
    pub fn compute_excluding(episode: &Episode, exclude: &[MenuAction]) -> VisibilitySet {
        let mut set = Self::compute(episode);
        for action in exclude {
            set.set(*action, false);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::episode::{EpisodeId, Media, MediaId, PlayState};
    use std::time::Duration;

    fn episode() -> Episode {
        Episode::new(EpisodeId(1), "Episode").with_link("https://example.com/1")
    }

    fn media() -> Media {
        Media::new(MediaId(10), Duration::from_secs(1800))
    }

    #[test]
    fn test_compute_is_pure() {
        let ep = episode().with_media(media().playing());
        assert_eq!(VisibilityPolicy::compute(&ep), VisibilityPolicy::compute(&ep));
    }

    #[test]
    fn test_every_action_has_an_entry() {
        let set = VisibilityPolicy::compute(&episode());
        assert_eq!(set.iter().count(), MenuAction::ALL.len());
    }

    #[test]
    fn test_skip_requires_playing_media() {
        assert!(!VisibilityPolicy::compute(&episode()).is_enabled(MenuAction::Skip));
        assert!(!VisibilityPolicy::compute(&episode().with_media(media())).is_enabled(MenuAction::Skip));
        assert!(VisibilityPolicy::compute(&episode().with_media(media().playing()))
            .is_enabled(MenuAction::Skip));
    }

    #[test]
    fn test_queue_entries() {
        let mut ep = episode();
        let set = VisibilityPolicy::compute(&ep);
        assert!(!set.is_enabled(MenuAction::AddToQueue));
        assert!(!set.is_enabled(MenuAction::RemoveFromQueue));

        ep = ep.with_media(media());
        let set = VisibilityPolicy::compute(&ep);
        assert!(set.is_enabled(MenuAction::AddToQueue));
        assert!(!set.is_enabled(MenuAction::RemoveFromQueue));

        ep.queued = true;
        let set = VisibilityPolicy::compute(&ep);
        assert!(!set.is_enabled(MenuAction::AddToQueue));
        assert!(set.is_enabled(MenuAction::RemoveFromQueue));
    }

    #[test]
    fn test_local_feed_hides_website_and_share() {
        let mut ep = episode();
        ep.feed.local = true;
        let set = VisibilityPolicy::compute(&ep);
        assert!(!set.is_enabled(MenuAction::VisitWebsite));
        assert!(!set.is_enabled(MenuAction::Share));
    }

    #[test]
    fn test_website_requires_link() {
        let ep = Episode::new(EpisodeId(1), "No link");
        let set = VisibilityPolicy::compute(&ep);
        assert!(!set.is_enabled(MenuAction::VisitWebsite));
        assert!(set.is_enabled(MenuAction::Share));
    }

    #[test]
    fn test_play_state_entries() {
        let set = VisibilityPolicy::compute(&episode());
        assert!(set.is_enabled(MenuAction::RemoveFromInbox));
        assert!(set.is_enabled(MenuAction::MarkRead));
        assert!(!set.is_enabled(MenuAction::MarkUnread));

        let set = VisibilityPolicy::compute(&episode().with_play_state(PlayState::Unplayed));
        assert!(!set.is_enabled(MenuAction::RemoveFromInbox));
        assert!(set.is_enabled(MenuAction::MarkRead));

        let set = VisibilityPolicy::compute(&episode().with_play_state(PlayState::Played));
        assert!(!set.is_enabled(MenuAction::MarkRead));
        assert!(set.is_enabled(MenuAction::MarkUnread));
    }

    #[test]
    fn test_no_media_labels() {
        let set = VisibilityPolicy::compute(&episode());
        assert_eq!(set.label(MenuAction::MarkRead), MenuLabel::MarkReadNoMedia);
        assert_eq!(set.label(MenuAction::MarkUnread), MenuLabel::MarkUnreadNoMedia);

        let set = VisibilityPolicy::compute(&episode().with_media(media()));
        assert_eq!(set.label(MenuAction::MarkRead), MenuLabel::MarkRead);
        assert_eq!(set.label(MenuAction::MarkUnread), MenuLabel::MarkUnread);
    }

    #[test]
    fn test_reset_position_requires_progress() {
        let set = VisibilityPolicy::compute(&episode().with_media(media()));
        assert!(!set.is_enabled(MenuAction::ResetPosition));

        let ep = episode().with_media(media().with_position(Duration::from_secs(5)));
        assert!(VisibilityPolicy::compute(&ep).is_enabled(MenuAction::ResetPosition));
    }

    #[test]
    fn test_exactly_one_favorite_entry() {
        let mut ep = episode();
        for favorite in [false, true] {
            ep.favorite = favorite;
            let set = VisibilityPolicy::compute(&ep);
            assert_ne!(
                set.is_enabled(MenuAction::AddToFavorites),
                set.is_enabled(MenuAction::RemoveFromFavorites)
            );
            assert_eq!(set.is_enabled(MenuAction::RemoveFromFavorites), favorite);
        }
    }

    #[test]
    fn test_remove_file_requires_downloaded_file() {
        let set = VisibilityPolicy::compute(&episode().with_media(media()));
        assert!(!set.is_enabled(MenuAction::RemoveFile));

        let ep = episode().with_media(media().with_local_file("/tmp/ep.mp3"));
        assert!(VisibilityPolicy::compute(&ep).is_enabled(MenuAction::RemoveFile));
    }

    #[test]
    fn test_exclusions_applied_last() {
        let ep = episode().with_media(media().playing());
        let set = VisibilityPolicy::compute_excluding(&ep, &[MenuAction::Skip, MenuAction::Share]);

        assert!(!set.is_enabled(MenuAction::Skip));
        assert!(!set.is_enabled(MenuAction::Share));
        assert!(set.is_enabled(MenuAction::MarkRead));
    }
}
