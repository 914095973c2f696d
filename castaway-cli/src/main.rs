mod cli;
mod commands;
mod terminal;

use crate::cli::{Cli, Command};
use castaway_core::{CastawayConfig, CoreError, EpisodeStore};
use clap::Parser;
use std::fs::File;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log filter used when `RUST_LOG` is not set
const DEFAULT_LOG_FILTER: &str = "info";

fn main() {
    let cli = Cli::parse();

    // Check config for logging.enabled before full config load
    let file_logging_enabled = check_file_logging_enabled();
    init_tracing(file_logging_enabled);

    // Load config or create template on first run
    let config = match CastawayConfig::load_or_create() {
        Ok(config) => config,
        Err(CoreError::ConfigNotFound { path }) => {
            eprintln!("Created a default configuration at {}", path.display());
            CastawayConfig::default()
        }
        Err(CoreError::ConfigParseError(parse_error)) => {
            eprintln!(
                "Failed to parse {}:\n{parse_error}",
                CastawayConfig::config_path().display()
            );
            std::process::exit(1);
        }
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {e}");
            std::process::exit(1);
        }
    };

    // Ctrl+C activates undo while a window is open
    let cancel_token = CancellationToken::new();
    let ctrlc_token = cancel_token.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received Ctrl+C");
        ctrlc_token.cancel();
    }) {
        error!("Failed to set Ctrl+C handler: {}", e);
    }

    if let Err(e) = runtime.block_on(run(cli, config, cancel_token)) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(
    cli: Cli,
    config: CastawayConfig,
    cancel_token: CancellationToken,
) -> castaway_core::Result<()> {
    let store = match &cli.database {
        Some(path) => EpisodeStore::open(path, config.sync.clone()).await?,
        None => EpisodeStore::new(config.sync.clone()).await?,
    };
    let store = Arc::new(store);

    let result = match cli.command {
        Command::Import { file } => commands::import(&store, &file).await,
        Command::Menu {
            episode_id,
            exclude,
        } => commands::menu(&store, commands::episode_id(episode_id)?, &exclude).await,
        Command::Run {
            action,
            episode_id,
            undo,
        } => {
            commands::run(
                Arc::clone(&store),
                &config,
                &action,
                commands::episode_id(episode_id)?,
                undo,
                cancel_token,
            )
            .await
        }
        Command::Mark {
            episode_id,
            state,
            undo,
        } => {
            commands::mark(
                Arc::clone(&store),
                &config,
                commands::episode_id(episode_id)?,
                state.into(),
                undo,
                cancel_token,
            )
            .await
        }
        Command::Pending => commands::pending(&store).await,
    };

    if let Err(e) = store.checkpoint().await {
        error!("Failed to checkpoint episode database: {}", e);
    }
    result
}

/// Quick check of the config file for file logging setting.
/// This runs before tracing is initialized, so we can't log errors here.
fn check_file_logging_enabled() -> bool {
    #[derive(serde::Deserialize)]
    struct PartialConfig {
        #[serde(default)]
        logging: PartialLoggingConfig,
    }
    #[derive(serde::Deserialize, Default)]
    struct PartialLoggingConfig {
        #[serde(default)]
        enabled: bool,
    }

    let Ok(content) = std::fs::read_to_string(CastawayConfig::config_path()) else {
        return false;
    };

    toml::from_str::<PartialConfig>(&content)
        .map(|c| c.logging.enabled)
        .unwrap_or(false)
}

fn init_tracing(file_logging_enabled: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    if file_logging_enabled {
        let log_path = castaway_core::paths::log_file_path();

        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        match File::options().create(true).append(true).open(&log_path) {
            Ok(file) => {
                let file_layer = tracing_subscriber::fmt::layer()
                    .with_writer(Arc::new(file))
                    .with_ansi(false);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt_layer)
                    .with(file_layer)
                    .init();

                return;
            }
            Err(e) => {
                eprintln!("Failed to open log file at {}: {e}", log_path.display());
            }
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
