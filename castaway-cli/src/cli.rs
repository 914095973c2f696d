use castaway_core::PlayState;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "castaway",
    version,
    about = "Apply episode menu actions with undo and sync propagation"
)]
pub struct Cli {
    /// Episode database to use instead of ~/.config/castaway/castaway.db
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Import episodes from a JSON array, replacing existing ones with the same id
    Import { file: PathBuf },
    /// Show which menu actions are available for an episode
    Menu {
        episode_id: i64,
        /// Hide an action regardless of state (repeatable)
        #[arg(long = "exclude", value_name = "ACTION")]
        exclude: Vec<String>,
    },
    /// Apply a menu action to an episode
    Run {
        action: String,
        episode_id: i64,
        /// Undo the change right away instead of waiting for Ctrl+C
        #[arg(long)]
        undo: bool,
    },
    /// Mark an episode played or unplayed with a visible undo offer
    Mark {
        episode_id: i64,
        #[arg(value_enum)]
        state: MarkState,
        /// Undo the change right away instead of waiting for Ctrl+C
        #[arg(long)]
        undo: bool,
    },
    /// List episode actions waiting for the sync service
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MarkState {
    Played,
    Unplayed,
}

impl From<MarkState> for PlayState {
    fn from(state: MarkState) -> Self {
        match state {
            MarkState::Played => Self::Played,
            MarkState::Unplayed => Self::Unplayed,
        }
    }
}
