pub mod error;
pub mod google_api;
pub mod ollama;
pub mod planner;
pub mod state;
pub mod tui;
pub mod types;

use std::fs::OpenOptions;

use crate::error::ConfigError;

/// Route `log` output to `~/.obsidian-planner/planner.log`.
///
/// The terminal belongs to the chat shell, so nothing is written to stderr.
/// `RUST_LOG` overrides the default `info` level.
pub fn init_logging() -> Result<(), ConfigError> {
    let path = state::log_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .format_timestamp_millis()
        .init();

    log::info!("Logging to {}", path.display());
    Ok(())
}
