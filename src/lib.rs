pub mod bracket_index;
pub mod config;
pub mod engine;
pub mod error;
pub mod notify;
pub mod store;
pub mod types;
mod bracket;
mod correction;
mod progression;

pub use bracket_index::BracketIndex;
pub use config::EngineConfig;
pub use engine::BracketEngine;
pub use error::{BracketError, Result};
pub use notify::{Notification, NotificationKind, NotificationPort, TracingNotifier};
pub use store::{MatchStore, MemoryMatchStore};
pub use types::{
    Match, MatchId, MatchPatch, MatchState, PlayerId, Slot, Tournament, TournamentId,
    TournamentPatch,
};

use std::fs;
use std::path::Path;

use tracing_subscriber::EnvFilter;

/// Initialize tracing with file + stderr-style output for host
/// applications that do not bring their own subscriber. Keep the returned
/// guard alive for the lifetime of the process or buffered log lines are
/// dropped.
pub fn init_tracing(logs_dir: &Path) -> tracing_appender::non_blocking::WorkerGuard {
    fs::create_dir_all(logs_dir).ok();
    let file_appender = tracing_appender::rolling::daily(logs_dir, "bracket_engine.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();
    guard
}
