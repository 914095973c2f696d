use crate::action::MenuAction;
use crate::collaborators::FeedbackMessage;
use crate::episode::{EpisodeId, PlayState};

/// Events emitted by the action dispatcher and its undo windows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionEvent {
    /// A menu action changed state or triggered its side effects
    ActionApplied {
        action: MenuAction,
        episode_id: EpisodeId,
    },
    /// A menu action was refused before touching any state
    ActionRejected {
        action_id: String,
        episode_id: EpisodeId,
        reason: String,
    },
    /// A play state change was committed with an open undo window
    UndoScheduled {
        episode_id: EpisodeId,
        message: FeedbackMessage,
        target: PlayState,
    },
    /// The user undid the change before the window closed
    UndoActivated {
        episode_id: EpisodeId,
        restored: PlayState,
    },
    /// The undo window closed without being used
    UndoExpired {
        episode_id: EpisodeId,
        media_deleted: bool,
    },
}
